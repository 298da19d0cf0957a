//! Response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

/// Body of every 200 webhook response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Always `success`
    pub status: String,
    pub message: String,
    pub delivery_id: String,
}

impl WebhookResponse {
    pub fn success(message: impl Into<String>, delivery_id: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            delivery_id: delivery_id.into(),
        }
    }
}

/// Body of every non-200 webhook response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `bad_request`, `unauthorized`, `payload_too_large` or
    /// `internal_server_error`
    pub error: String,
    pub message: String,
    pub delivery_id: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub deduplication_cache_size: usize,
    pub installation_cache_size: usize,
}
