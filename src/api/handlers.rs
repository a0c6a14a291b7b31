//! API request handlers

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use futures::Stream;
use futures::StreamExt;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::api::types::*;
use crate::conversation_log::validate_user_id;
use crate::errors::LoiLibreError;
use crate::rag::ChatRequest;
use crate::rag::ChatService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
}

/// Pipeline error rendered as an `ApiResponse` with a matching status
pub struct ApiError(LoiLibreError);

impl From<LoiLibreError> for ApiError {
    fn from(err: LoiLibreError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            LoiLibreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LoiLibreError::MalformedReformulation(_)
            | LoiLibreError::RetrievalUnavailable(_)
            | LoiLibreError::LlmError(_)
            | LoiLibreError::EmbeddingError(_)
            | LoiLibreError::HttpError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Rejected request: {}", self.0);
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

/// Health check handler
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Stream answer snapshots as Server-Sent Events.
///
/// Every snapshot is a `snapshot` event; a failure during generation is sent
/// as a final `error` event.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    info!("POST /api/chat from {}", request.user_id);

    let snapshots = state.chat_service.chat(request).await?;
    let events = snapshots.map(|item| match item {
        Ok(snapshot) => Event::default().event("snapshot").json_data(&snapshot),
        Err(e) => {
            warn!("Chat stream ended with error: {}", e);
            Ok(Event::default().event("error").data(e.to_string()))
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Reformulate, retrieve and rank without generating an answer
pub async fn retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<ApiResponse<RetrieveResponse>>, ApiError> {
    info!("POST /api/retrieve: {}", request.query);

    let outcome = state
        .chat_service
        .retrieve(&request.query, &request.report_type, request.threshold)
        .await?;

    Ok(Json(ApiResponse::success(RetrieveResponse {
        reformulation: outcome.reformulation,
        passages: outcome.passages,
    })))
}

/// Store user feedback next to the conversation logs
pub async fn feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<ApiResponse<FeedbackResponse>>, ApiError> {
    info!("POST /api/feedback from {}", request.user_id);
    validate_user_id(&request.user_id)?;

    let saved = match state.chat_service.logger() {
        Some(logger) => {
            logger
                .save_feedback(&request.user_id, &request.feedback)
                .await?
        }
        None => false,
    };

    Ok(Json(ApiResponse::success(FeedbackResponse { saved })))
}
