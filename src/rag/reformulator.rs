//! Rewrites a conversational query into a standalone search query

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::errors::LoiLibreError;
use crate::errors::Result;
use crate::llm::CompletionRequest;
use crate::llm::TextGenerator;
use crate::rag::prompts::build_reformulation_prompt;
use crate::rag::prompts::REFORMULATION_STOP;

/// Labels accepted in front of the detected language
const LANGUAGE_LABELS: [&str; 3] = ["langue", "langage", "language"];

/// Standalone query plus the language the user wrote in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reformulation {
    pub query: String,
    pub language: String,
}

/// Parse a `"<query>\n<label>: <language>"` completion.
///
/// Lines after the second are ignored.
pub fn parse_reformulation(raw: &str) -> Result<Reformulation> {
    let malformed = || LoiLibreError::MalformedReformulation(raw.to_string());

    let trimmed = raw.trim();
    let (query, rest) = trimmed.split_once('\n').ok_or_else(malformed)?;
    let language_line = rest.lines().next().ok_or_else(malformed)?;
    let (label, language) = language_line.split_once(':').ok_or_else(malformed)?;

    let label = label.trim().to_lowercase();
    if !LANGUAGE_LABELS.contains(&label.as_str()) {
        return Err(malformed());
    }

    let query = query.trim();
    let language = language.trim();
    if query.is_empty() || language.is_empty() {
        return Err(malformed());
    }

    Ok(Reformulation {
        query: query.to_string(),
        language: language.to_string(),
    })
}

/// Calls the generation service with the fixed reformulation prompt
pub struct QueryReformulator {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
}

impl QueryReformulator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Reformulate `query`; a response without the expected shape is an error
    pub async fn reformulate(&self, query: &str) -> Result<Reformulation> {
        if query.trim().is_empty() {
            return Err(LoiLibreError::InvalidInput("query must not be empty".to_string()));
        }

        let request = CompletionRequest::new(build_reformulation_prompt(query), 0.0, self.max_tokens)
            .with_stop(REFORMULATION_STOP);
        let raw = self.generator.complete(request).await?;
        debug!("Reformulation response: {:?}", raw);

        parse_reformulation(&raw)
    }
}
