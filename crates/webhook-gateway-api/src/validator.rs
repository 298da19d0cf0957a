//! HTTP-level validation of incoming webhook requests.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderMap, Method},
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use webhook_gateway_core::webhook::{
    WebhookHeaders, DELIVERY_HEADER, EVENT_HEADER, HOOK_ID_HEADER, SIGNATURE_HEADER,
};

/// Only accepted `Content-Type`
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request-level rejections, checked before the signature
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid HTTP method, must be POST")]
    InvalidMethod,

    #[error("Invalid Content-Type, must be application/json")]
    InvalidContentType,

    #[error("Missing required webhook headers")]
    MissingHeaders,

    #[error("Webhook payload exceeds {} limit", format_size(.max_size))]
    PayloadTooLarge { max_size: usize },

    #[error("Failed to read request body")]
    Body { message: String },
}

impl RequestError {
    /// Label for `webhook_events_rejected_total`
    pub fn metric_reason(&self) -> &'static str {
        match self {
            Self::InvalidMethod => "invalid_method",
            Self::InvalidContentType => "invalid_content_type",
            Self::MissingHeaders => "missing_headers",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Body { .. } => "validation_error",
        }
    }
}

/// Validate method, content type and GitHub headers, then read the body
/// under a `max_size` cap.
///
/// A body of exactly `max_size` bytes is accepted. Reading stops at the
/// first chunk past the cap, so oversized payloads are never buffered in
/// full.
pub async fn validate_webhook_request(
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    max_size: usize,
) -> Result<(WebhookHeaders, Bytes), RequestError> {
    if method != Method::POST {
        return Err(RequestError::InvalidMethod);
    }

    let content_type = header_str(headers, CONTENT_TYPE.as_str());
    if content_type != JSON_CONTENT_TYPE {
        return Err(RequestError::InvalidContentType);
    }

    let webhook_headers = WebhookHeaders {
        signature: header_str(headers, SIGNATURE_HEADER).to_string(),
        event_type: header_str(headers, EVENT_HEADER).to_string(),
        delivery_id: header_str(headers, DELIVERY_HEADER).to_string(),
        hook_id: Some(header_str(headers, HOOK_ID_HEADER))
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        content_type: content_type.to_string(),
    };

    if webhook_headers.signature.is_empty()
        || webhook_headers.event_type.is_empty()
        || webhook_headers.delivery_id.is_empty()
    {
        return Err(RequestError::MissingHeaders);
    }

    let body = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                RequestError::PayloadTooLarge { max_size }
            } else {
                RequestError::Body {
                    message: e.to_string(),
                }
            }
        })?
        .to_bytes();

    Ok((webhook_headers, body))
}

/// Header value as text; missing or non-UTF-8 values read as empty
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn format_size(bytes: &usize) -> String {
    const MIB: usize = 1024 * 1024;
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
