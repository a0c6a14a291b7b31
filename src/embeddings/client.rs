//! Embedding API clients for various providers

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::EmbeddingsConfig;
use crate::embeddings::Embedder;
use crate::errors::LoiLibreError;
use crate::errors::Result;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// `OpenAI` embeddings API
    OpenAI,
    /// Ollama local embeddings
    Ollama,
}

impl FromStr for EmbeddingProvider {
    type Err = LoiLibreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(LoiLibreError::ConfigError(format!(
                "Unknown embedding provider: {other}"
            ))),
        }
    }
}

/// Client for generating query embeddings from a remote provider
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        provider: EmbeddingProvider,
        model: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LoiLibreError::HttpError(e.to_string()))?;

        Ok(Self {
            provider,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create a client from the `[embeddings]` section
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        Self::new(
            config.provider.parse()?,
            config.model.clone(),
            config.endpoint.clone(),
            config.api_key.clone(),
        )
    }

    pub const fn provider(&self) -> EmbeddingProvider {
        self.provider
    }

    /// Embed a single text
    ///
    /// # Errors
    /// - `HttpError` when the provider cannot be reached
    /// - `EmbeddingError` for error statuses and unexpected response bodies
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        match self.provider {
            EmbeddingProvider::OpenAI => self.embed_openai(text).await,
            EmbeddingProvider::Ollama => self.embed_ollama(text).await,
        }
    }

    /// `POST /embeddings` with `{input, model}`, answer in `data[0].embedding`
    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Body<'a> {
            input: &'a str,
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct Reply {
            data: Vec<Item>,
        }

        #[derive(Deserialize)]
        struct Item {
            embedding: Vec<f32>,
        }

        if self.api_key.is_none() {
            return Err(LoiLibreError::ConfigError(
                "embeddings.api_key is required for the openai provider".to_string(),
            ));
        }

        let body = Body {
            input: text,
            model: &self.model,
        };
        let reply: Reply = self.post_json("embeddings", &body).await?;
        reply
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| LoiLibreError::EmbeddingError("empty embedding list".to_string()))
    }

    /// `POST /api/embeddings` with `{model, prompt}`, answer in `embedding`
    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Body<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct Reply {
            embedding: Vec<f32>,
        }

        let body = Body {
            model: &self.model,
            prompt: text,
        };
        let reply: Reply = self.post_json("api/embeddings", &body).await?;
        Ok(reply.embedding)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.endpoint);
        debug!("Embedding query through {:?}: {}", self.provider, url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| LoiLibreError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LoiLibreError::EmbeddingError(format!(
                "{:?} embeddings returned {status}: {detail}",
                self.provider
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LoiLibreError::EmbeddingError(format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate(text).await
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::Json;
    use axum::Router;

    use super::*;

    async fn spawn_ollama_stub() -> String {
        let app = Router::new().route(
            "/api/embeddings",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "multi-qa");
                Json(serde_json::json!({ "embedding": [0.25, 0.5, 1.0] }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::OpenAI);
        assert_eq!("ollama".parse::<EmbeddingProvider>().unwrap(), EmbeddingProvider::Ollama);
        assert!("faiss".parse::<EmbeddingProvider>().is_err());
    }

    #[tokio::test]
    async fn test_ollama_embedding() {
        let endpoint = spawn_ollama_stub().await;
        let client = EmbeddingClient::new(
            EmbeddingProvider::Ollama,
            "multi-qa".to_string(),
            format!("{endpoint}/"),
            None,
        )
        .unwrap();

        let embedding = client.generate("Mort sur la route").await.unwrap();
        assert_eq!(embedding, vec![0.25, 0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_openai_requires_api_key() {
        let client = EmbeddingClient::new(
            EmbeddingProvider::OpenAI,
            "text-embedding-ada-002".to_string(),
            "http://127.0.0.1:9".to_string(),
            None,
        )
        .unwrap();

        let err = client.generate("Bonjour").await.unwrap_err();
        assert!(matches!(err, LoiLibreError::ConfigError(_)));
    }

    #[tokio::test]
    #[ignore = "Requires API key"]
    async fn test_openai_embedding() {
        let client = EmbeddingClient::new(
            EmbeddingProvider::OpenAI,
            "text-embedding-ada-002".to_string(),
            "https://api.openai.com/v1".to_string(),
            std::env::var("OPENAI_API_KEY").ok(),
        )
        .unwrap();

        let embedding = client.generate("Hello, world!").await.unwrap();
        assert_eq!(embedding.len(), 1536);
    }
}
