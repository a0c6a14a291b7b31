//! Complete chat pipeline: Reformulate -> Retrieve -> Rank -> Assemble -> Stream

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tracing::debug;
use tracing::info;

use crate::config::AppConfig;
use crate::config::RetrievalBackend;
use crate::conversation_log::timestamp;
use crate::conversation_log::validate_user_id;
use crate::conversation_log::AnswerRecord;
use crate::conversation_log::ConversationLogger;
use crate::embeddings::EmbeddingClient;
use crate::errors::LoiLibreError;
use crate::errors::Result;
use crate::llm::CompletionRequest;
use crate::llm::LlmClient;
use crate::llm::TextGenerator;
use crate::llm::TokenStream;
use crate::llm::END_OF_TURN;
use crate::models::ensure_system_prompt;
use crate::models::make_pairs;
use crate::models::Message;
use crate::models::Passage;
use crate::models::Role;
use crate::rag::context::PromptAssembler;
use crate::rag::prompts::NO_PASSAGES_ANSWER;
use crate::rag::prompts::NO_PASSAGES_SOURCES;
use crate::rag::prompts::SYSTEM_PROMPT;
use crate::rag::ranker::PassageRanker;
use crate::rag::ranker::SourceFilter;
use crate::rag::reformulator::QueryReformulator;
use crate::rag::reformulator::Reformulation;
use crate::rag::retriever::EmbeddingIndexRetriever;
use crate::rag::retriever::HttpRetriever;
use crate::rag::retriever::VectorRetriever;

/// One chat invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub query: String,
    /// Conversation so far; a missing system message is added
    #[serde(default)]
    pub history: Vec<Message>,
    /// Source selector, resolved through `retrieval.sources`
    #[serde(default = "default_report_type")]
    pub report_type: String,
    /// Overrides `retrieval.threshold`
    #[serde(default)]
    pub threshold: Option<f32>,
}

fn default_report_type() -> String {
    "all".to_string()
}

impl ChatRequest {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            history: Vec::new(),
            report_type: default_report_type(),
            threshold: None,
        }
    }
}

/// UI state after one received chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSnapshot {
    /// (user, assistant) display pairs
    pub pairs: Vec<(String, String)>,
    /// Full message history including the in-progress answer
    pub messages: Vec<Message>,
    /// Citation HTML, or the no-result text
    pub sources: String,
}

impl ChatSnapshot {
    fn new(messages: &[Message], sources: &str) -> Self {
        Self {
            pairs: make_pairs(messages),
            messages: messages.to_vec(),
            sources: sources.to_string(),
        }
    }

    /// Content of the last assistant message
    pub fn answer(&self) -> &str {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map_or("", |m| m.content.as_str())
    }
}

/// Lazy, finite, non-restartable sequence of snapshots
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatSnapshot>> + Send>>;

/// Retrieval outcome before prompt assembly
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub reformulation: Reformulation,
    pub passages: Vec<Passage>,
}

/// Per-request generation settings taken from configuration
#[derive(Debug, Clone)]
struct ChatSettings {
    max_k: usize,
    threshold: f32,
    answer_max_tokens: u32,
    temperature: f32,
    sources: HashMap<String, String>,
}

/// Chat service wiring the retriever and generator together
pub struct ChatService {
    retriever: Arc<dyn VectorRetriever>,
    generator: Arc<dyn TextGenerator>,
    reformulator: QueryReformulator,
    ranker: PassageRanker,
    assembler: PromptAssembler,
    logger: Option<ConversationLogger>,
    admission: Arc<Semaphore>,
    settings: ChatSettings,
}

impl ChatService {
    /// Create the service and its HTTP collaborators from configuration
    ///
    /// # Errors
    /// - Index loading errors (missing file, inconsistent dimensions)
    /// - HTTP client configuration errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let retriever: Arc<dyn VectorRetriever> = match config.retrieval.backend {
            RetrievalBackend::Index => {
                let embedder = Arc::new(EmbeddingClient::from_config(&config.embeddings)?);
                Arc::new(EmbeddingIndexRetriever::from_config(
                    &config.retrieval,
                    embedder,
                )?)
            }
            RetrievalBackend::Http => {
                let endpoint = config.retrieval.endpoint.as_deref().ok_or_else(|| {
                    LoiLibreError::ConfigError("retrieval.endpoint is not set".to_string())
                })?;
                Arc::new(HttpRetriever::new(endpoint)?)
            }
        };
        let generator = Arc::new(LlmClient::new(&config.llm)?);

        Ok(Self::from_services(config, retriever, generator))
    }

    /// Create from existing services
    #[must_use]
    pub fn from_services(
        config: &AppConfig,
        retriever: Arc<dyn VectorRetriever>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            reformulator: QueryReformulator::new(
                generator.clone(),
                config.llm.reformulation_max_tokens,
            ),
            retriever,
            generator,
            ranker: PassageRanker::from_config(&config.retrieval),
            assembler: PromptAssembler::new(),
            logger: ConversationLogger::from_config(&config.conversation_log),
            admission: Arc::new(Semaphore::new(config.server.max_concurrent_requests)),
            settings: ChatSettings {
                max_k: config.retrieval.max_k,
                threshold: config.retrieval.threshold,
                answer_max_tokens: config.llm.answer_max_tokens,
                temperature: config.llm.temperature,
                sources: config.retrieval.sources.clone(),
            },
        }
    }

    /// Replace the conversation logger
    #[must_use]
    pub fn with_logger(mut self, logger: Option<ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> Option<&ConversationLogger> {
        self.logger.as_ref()
    }

    /// Number of chat requests that can still be admitted
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// Reformulate, retrieve and rank without generating an answer
    ///
    /// # Errors
    /// - `InvalidInput` for an empty query
    /// - `MalformedReformulation` when the reformulation response has the wrong shape
    /// - `RetrievalUnavailable` when the index cannot be queried
    pub async fn retrieve(
        &self,
        query: &str,
        report_type: &str,
        threshold: Option<f32>,
    ) -> Result<RetrievalOutcome> {
        debug!("Step 1: Reformulating query");
        let reformulation = self.reformulator.reformulate(query).await?;
        debug!(
            "Reformulated query: {:?} (language: {})",
            reformulation.query, reformulation.language
        );

        debug!("Step 2: Retrieving passages");
        let raw = self
            .retriever
            .retrieve(&reformulation.query, self.settings.max_k)
            .await?;
        debug!("Retrieved {} raw passages", raw.len());

        debug!("Step 3: Ranking passages");
        let filter = SourceFilter::resolve(report_type, &self.settings.sources);
        let threshold = threshold.unwrap_or(self.settings.threshold);
        let passages = self.ranker.rank(raw, threshold, &filter);
        debug!(
            "Selected {} passages (threshold {}, filter {:?})",
            passages.len(),
            threshold,
            filter
        );

        Ok(RetrievalOutcome {
            reformulation,
            passages,
        })
    }

    /// Run one chat turn and return the stream of UI snapshots.
    ///
    /// Failures before generation starts are returned directly; an upstream
    /// failure during generation is yielded as `GenerationStreamInterrupted`
    /// and ends the stream. One admission permit is held until the stream is
    /// exhausted or dropped.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
        let (_, snapshots) = self.chat_with_sources(request).await?;
        Ok(snapshots)
    }

    /// Like [`ChatService::chat`], also returning the passages the answer is
    /// grounded on
    pub async fn chat_with_sources(
        &self,
        request: ChatRequest,
    ) -> Result<(Vec<Passage>, ChatStream)> {
        validate_user_id(&request.user_id)?;

        let permit = self
            .admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| LoiLibreError::LlmError(format!("admission closed: {e}")))?;

        info!("Processing chat query from {}: {}", request.user_id, request.query);

        let mut history = request.history;
        ensure_system_prompt(&mut history, SYSTEM_PROMPT);

        let outcome = self
            .retrieve(&request.query, &request.report_type, request.threshold)
            .await?;

        debug!("Step 4: Assembling prompt");
        let assembled = self.assembler.assemble(
            &history,
            &request.query,
            &outcome.reformulation,
            &outcome.passages,
        );

        let Some(sources) = assembled.sources.clone() else {
            info!("No relevant passages, answering without generation");
            let mut messages = assembled.messages;
            messages.push(Message::assistant(NO_PASSAGES_ANSWER));
            let snapshot = ChatSnapshot::new(&messages, NO_PASSAGES_SOURCES);
            let snapshots: ChatStream = Box::pin(futures::stream::once(async move {
                Ok::<_, LoiLibreError>(snapshot)
            }));
            return Ok((outcome.passages, snapshots));
        };

        debug!("Step 5: Streaming answer");
        let generation = CompletionRequest::new(
            assembled.completion_prompt(),
            self.settings.temperature,
            self.settings.answer_max_tokens,
        )
        .with_stop([END_OF_TURN]);
        let tokens = self.generator.stream(generation).await?.into_stream();

        // the sources message only lives in the prompt, not in the history
        let mut messages = assembled.messages;
        messages.pop();
        messages.push(Message::assistant(""));

        let system_message = messages
            .first()
            .cloned()
            .unwrap_or_else(|| Message::system(SYSTEM_PROMPT));
        let pending_log = self.logger.clone().map(|logger| {
            let record = AnswerRecord {
                user_id: request.user_id.clone(),
                prompt: request.query.clone(),
                retrieved: outcome.passages.clone(),
                report_type: request.report_type.clone(),
                prompt_eng: system_message,
                answer: String::new(),
                time: timestamp(),
            };
            (logger, record)
        });

        let state = AnswerStream {
            tokens,
            messages,
            answer: String::new(),
            sources: sources.html,
            finished: false,
            pending_log,
            _permit: permit,
        };

        let snapshots: ChatStream =
            Box::pin(futures::stream::unfold(state, AnswerStream::next_snapshot));
        Ok((outcome.passages, snapshots))
    }
}

/// State threaded through the snapshot stream
struct AnswerStream {
    tokens: TokenStream,
    messages: Vec<Message>,
    answer: String,
    sources: String,
    finished: bool,
    pending_log: Option<(ConversationLogger, AnswerRecord)>,
    _permit: OwnedSemaphorePermit,
}

impl AnswerStream {
    async fn next_snapshot(mut self) -> Option<(Result<ChatSnapshot>, Self)> {
        if self.finished {
            return None;
        }
        loop {
            match self.tokens.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() || chunk == END_OF_TURN {
                        continue;
                    }
                    self.answer.push_str(&chunk);
                    if let Some(last) = self.messages.last_mut() {
                        last.content.clone_from(&self.answer);
                    }
                    let snapshot = ChatSnapshot::new(&self.messages, &self.sources);
                    return Some((Ok(snapshot), self));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    let err = LoiLibreError::GenerationStreamInterrupted {
                        partial: self.answer.clone(),
                        reason: e.to_string(),
                    };
                    return Some((Err(err), self));
                }
                None => {
                    self.finished = true;
                    info!("Answer complete ({} chars)", self.answer.chars().count());
                    if let Some((logger, mut record)) = self.pending_log.take() {
                        record.answer = self.answer.clone();
                        logger.spawn_answer_log(record);
                    }
                    return None;
                }
            }
        }
    }
}
