//! Error types for the HTTP service

use crate::responses::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: malformed requests and payloads
/// - `401 Unauthorized`: bad signature or unauthorized repository
/// - `413 Payload Too Large`: body over the configured cap
/// - `500 Internal Server Error`: lookup or session creation failures
///
/// GitHub does not retry on its own, so no `Retry-After` is sent. Messages
/// are fixed strings; underlying causes are only logged.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error("{message}")]
    BadRequest {
        message: String,
        delivery_id: String,
    },

    #[error("{message}")]
    Unauthorized {
        message: String,
        delivery_id: String,
    },

    #[error("{message}")]
    PayloadTooLarge {
        message: String,
        delivery_id: String,
    },

    #[error("{message}")]
    Internal {
        message: String,
        delivery_id: String,
    },
}

impl WebhookHandlerError {
    pub fn bad_request(message: impl Into<String>, delivery_id: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            delivery_id: delivery_id.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>, delivery_id: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            delivery_id: delivery_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>, delivery_id: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            delivery_id: delivery_id.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable `error` field of the response body
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Internal { .. } => "internal_server_error",
        }
    }

    pub fn delivery_id(&self) -> &str {
        match self {
            Self::BadRequest { delivery_id, .. }
            | Self::Unauthorized { delivery_id, .. }
            | Self::PayloadTooLarge { delivery_id, .. }
            | Self::Internal { delivery_id, .. } => delivery_id,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(delivery_id = %self.delivery_id(), error = %self, "Webhook request failed");
        } else {
            warn!(
                delivery_id = %self.delivery_id(),
                status = status.as_u16(),
                error = %self,
                "Webhook request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.error_kind().to_string(),
            message: self.to_string(),
            delivery_id: self.delivery_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to initialize {component}: {message}")]
    Startup { component: String, message: String },
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
            Self::Startup { .. } => 4,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Failed to read secret file {path}: {message}")]
    SecretFile { path: String, message: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
