//! Text generation service boundary
//!
//! The pipeline talks to the generation service through [`TextGenerator`],
//! either for a single completion (query reformulation) or for an incremental
//! token stream (answers).

pub mod client;
pub mod prompts;
pub mod streaming;

use async_trait::async_trait;
pub use client::LlmClient;
pub use prompts::to_completion;
pub use prompts::PromptTemplate;
pub use prompts::END_OF_TURN;
use serde::Serialize;
pub use streaming::StreamingResponse;
pub use streaming::TokenStream;

use crate::errors::Result;

/// Completion request sent to the generation service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
            stop: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

/// Generation capability injected into the pipeline
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single completion string
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Incremental token stream; dropping it abandons the upstream call
    async fn stream(&self, request: CompletionRequest) -> Result<StreamingResponse>;
}
