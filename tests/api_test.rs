//! HTTP API served on an ephemeral port with in-process services

use std::sync::Arc;

use async_trait::async_trait;
use loilibre::api::build_router;
use loilibre::conversation_log::ConversationLogger;
use loilibre::llm::CompletionRequest;
use loilibre::llm::StreamingResponse;
use loilibre::llm::TextGenerator;
use loilibre::models::Passage;
use loilibre::models::PassageMeta;
use loilibre::rag::ChatService;
use loilibre::rag::VectorRetriever;
use loilibre::AppConfig;
use loilibre::LoiLibreError;
use loilibre::Result;
use futures::StreamExt;
use serde_json::json;
use serde_json::Value;

struct FixedRetriever(Vec<Passage>);

#[async_trait]
impl VectorRetriever for FixedRetriever {
    async fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<Passage>> {
        Ok(self.0.iter().take(top_k).cloned().collect())
    }
}

struct FixedGenerator;

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok("Quel est le délai ?\nlangue: français".to_string())
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<StreamingResponse> {
        Ok(StreamingResponse::from_chunks(vec![
            Ok("Quatorze ".to_string()),
            Ok("jours.".to_string()),
        ]))
    }
}

/// First chunk then an upstream that never finishes
struct HangingGenerator;

#[async_trait]
impl TextGenerator for HangingGenerator {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok("Quel est le délai ?\nlangue: français".to_string())
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<StreamingResponse> {
        let chunks = futures::stream::iter(vec![Ok::<_, LoiLibreError>("Quatorze ".to_string())])
            .chain(futures::stream::pending());
        Ok(StreamingResponse::new(Box::pin(chunks)))
    }
}

struct BrokenGenerator;

#[async_trait]
impl TextGenerator for BrokenGenerator {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok("pas de langue".to_string())
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<StreamingResponse> {
        Err(LoiLibreError::LlmError("unreachable".to_string()))
    }
}

fn passage() -> Passage {
    Passage {
        content: "Article L221-18".to_string(),
        score: 0.9,
        meta: PassageMeta {
            source: "codeconso".to_string(),
            report_type: "article".to_string(),
            short_name: "Code de la consommation".to_string(),
            page_number: Some(3),
            ..PassageMeta::default()
        },
    }
}

async fn spawn_api(generator: Arc<dyn TextGenerator>, logger: Option<ConversationLogger>) -> String {
    let service = ChatService::from_services(
        &AppConfig::default(),
        Arc::new(FixedRetriever(vec![passage()])),
        generator,
    )
    .with_logger(logger);
    spawn_service(service).await.0
}

async fn spawn_service(service: ChatService) -> (String, Arc<ChatService>) {
    let config = AppConfig::default();
    let service = Arc::new(service);
    let app = build_router(service.clone(), &config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), service)
}

#[tokio::test]
async fn test_health() {
    let base = spawn_api(Arc::new(FixedGenerator), None).await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_chat_streams_snapshot_events() {
    let base = spawn_api(Arc::new(FixedGenerator), None).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/chat"))
        .json(&json!({"user_id": "u1", "query": "délai ?"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let text = response.text().await.unwrap();

    let snapshots: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    assert_eq!(text.matches("event: snapshot").count(), 2);
    assert_eq!(snapshots.len(), 2);
    let last = &snapshots[1];
    assert_eq!(last["messages"][2]["content"], "Quatorze jours.");
    assert_eq!(last["pairs"][0][1], "Quatorze jours.");
    assert!(last["sources"]
        .as_str()
        .unwrap()
        .contains("Doc 1 - Code de la consommation - Page 3"));
}

#[tokio::test]
async fn test_chat_rejects_empty_query() {
    let base = spawn_api(Arc::new(FixedGenerator), None).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/chat"))
        .json(&json!({"user_id": "u1", "query": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_reformulation_is_bad_gateway() {
    let base = spawn_api(Arc::new(BrokenGenerator), None).await;
    let response = reqwest::Client::new()
        .post(format!("{base}/retrieve"))
        .json(&json!({"query": "délai ?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_retrieve_returns_selected_passages() {
    let base = spawn_api(Arc::new(FixedGenerator), None).await;
    let body: Value = reqwest::Client::new()
        .post(format!("{base}/retrieve"))
        .json(&json!({"query": "délai ?", "threshold": 0.5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["reformulation"]["language"], "français");
    assert_eq!(body["data"]["passages"][0]["content"], "Article L221-18");
}

#[tokio::test]
async fn test_feedback_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_api(
        Arc::new(FixedGenerator),
        Some(ConversationLogger::new(dir.path())),
    )
    .await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/feedback"))
        .json(&json!({"user_id": "u1", "feedback": "Très clair"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["saved"], true);

    let body: Value = client
        .post(format!("{base}/feedback"))
        .json(&json!({"user_id": "u1", "feedback": "."}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["saved"], false);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_path_like_user_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let base = spawn_api(Arc::new(FixedGenerator), Some(ConversationLogger::new(&logs))).await;
    let client = reqwest::Client::new();

    for user_id in ["../escaped", "/tmp/escaped"] {
        let response = client
            .post(format!("{base}/feedback"))
            .json(&json!({"user_id": user_id, "feedback": "hello there"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = client
            .post(format!("{base}/chat"))
            .json(&json!({"user_id": user_id, "query": "délai ?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    let written: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(written.is_empty(), "unexpected files: {written:?}");
}

#[tokio::test]
async fn test_open_answer_stream_holds_admission_permit() {
    let service = ChatService::from_services(
        &AppConfig::default(),
        Arc::new(FixedRetriever(vec![passage()])),
        Arc::new(HangingGenerator),
    )
    .with_logger(None);
    let (base, service) = spawn_service(service).await;
    let capacity = service.available_permits();

    let mut response = reqwest::Client::new()
        .post(format!("{base}/chat"))
        .json(&json!({"user_id": "u1", "query": "délai ?"}))
        .send()
        .await
        .unwrap();
    let first = response.chunk().await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: snapshot"));

    // the response head went out long ago; the chat permit is still taken
    assert_eq!(service.available_permits(), capacity - 1);
    drop(response);
}
