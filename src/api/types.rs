//! API request and response types

use serde::Deserialize;
use serde::Serialize;

use crate::models::Passage;
use crate::rag::Reformulation;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Retrieval-only request
#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default)]
    pub threshold: Option<f32>,
}

fn default_report_type() -> String {
    "all".to_string()
}

/// Passages selected for a query
#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub reformulation: Reformulation,
    pub passages: Vec<Passage>,
}

/// User feedback on an answer
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    /// `false` when the feedback was too short to be kept
    pub saved: bool,
}
