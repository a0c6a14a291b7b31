//! API route definitions

use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers::AppState;
use super::handlers::{
    self,
};

/// Create RESTful API router
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Answering
        .route("/chat", post(handlers::chat))
        .route("/retrieve", post(handlers::retrieve))
        // Conversation log
        .route("/feedback", post(handlers::feedback))
        .with_state(state)
}
