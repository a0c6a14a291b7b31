//! Client for OpenAI-compatible `/completions` endpoints

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::config::LlmConfig;
use crate::errors::LoiLibreError;
use crate::errors::Result;
use crate::llm::streaming::SseDecoder;
use crate::llm::streaming::SseEvent;
use crate::llm::CompletionRequest;
use crate::llm::StreamingResponse;
use crate::llm::TextGenerator;

#[derive(Serialize)]
struct CompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [String],
    stream: bool,
}

fn no_stop(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.text)
    }
}

/// HTTP client for the text-generation service
#[derive(Clone)]
pub struct LlmClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_version: Option<String>,
    /// Whole-request limit for `complete`, idle limit between stream reads
    timeout: Duration,
    client: Client,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        // no client-wide timeout: it would also bound reading a long answer stream
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| LoiLibreError::HttpError(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            timeout,
            client,
        })
    }

    /// Completion URL; Azure deployments carry the model in the path
    fn completions_url(&self) -> String {
        match &self.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/completions?api-version={}",
                self.endpoint, self.model, version
            ),
            None => format!("{}/completions", self.endpoint),
        }
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> RequestBuilder {
        let body = CompletionBody {
            model: self.api_version.is_none().then_some(self.model.as_str()),
            prompt: &request.prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: &request.stop,
            stream,
        };

        let mut builder = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = if self.api_version.is_some() {
                builder.header("api-key", key)
            } else {
                builder.bearer_auth(key)
            };
        }
        builder
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let builder = self.build_request(request, stream);
        let sent = if stream {
            // only waiting for the headers is bounded; the body is read with an idle limit
            tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| {
                    LoiLibreError::HttpError(format!(
                        "no response from completion API within {:?}",
                        self.timeout
                    ))
                })?
        } else {
            builder.timeout(self.timeout).send().await
        };
        let response = sent.map_err(|e| LoiLibreError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LoiLibreError::LlmError(format!(
                "Completion API error ({status}): {error_text}"
            )));
        }
        Ok(response)
    }
}

/// Extract the text of one streamed completion chunk
fn chunk_text(data: &str) -> Result<Option<String>> {
    let chunk: CompletionResponse = serde_json::from_str(data)
        .map_err(|e| LoiLibreError::LlmError(format!("Invalid stream chunk: {e}")))?;
    Ok(chunk.into_text())
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!(
            "Calling completion API: {} (max_tokens={})",
            self.completions_url(),
            request.max_tokens
        );
        let response = self.send(&request, false).await?;

        let result: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LoiLibreError::LlmError(format!("Failed to parse response: {e}")))?;

        result
            .into_text()
            .ok_or_else(|| LoiLibreError::LlmError("No completion in response".to_string()))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamingResponse> {
        debug!("Opening completion stream: {}", self.completions_url());
        let response = self.send(&request, true).await?;

        struct State<S> {
            body: S,
            idle: Duration,
            decoder: SseDecoder,
            pending: VecDeque<SseEvent>,
            done: bool,
        }

        let state = State {
            body: Box::pin(response.bytes_stream()),
            idle: self.timeout,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    match event {
                        SseEvent::Done => return None,
                        SseEvent::Data(data) => match chunk_text(&data) {
                            Ok(Some(text)) => return Some((Ok(text), state)),
                            Ok(None) => continue,
                            Err(e) => {
                                state.done = true;
                                state.pending.clear();
                                return Some((Err(e), state));
                            }
                        },
                    }
                }
                if state.done {
                    return None;
                }
                let Ok(next) = tokio::time::timeout(state.idle, state.body.next()).await else {
                    state.done = true;
                    let err = LoiLibreError::HttpError(format!(
                        "completion stream idle for more than {:?}",
                        state.idle
                    ));
                    return Some((Err(err), state));
                };
                match next {
                    Some(Ok(bytes)) => {
                        let events = state.decoder.push(&bytes);
                        state.pending.extend(events);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LoiLibreError::HttpError(e.to_string())), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(event) = state.decoder.finish() {
                            state.pending.push_back(event);
                        } else {
                            warn!("Completion stream closed without [DONE]");
                        }
                    }
                }
            }
        });

        Ok(StreamingResponse::new(Box::pin(stream)))
    }
}
