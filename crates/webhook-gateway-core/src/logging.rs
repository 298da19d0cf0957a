//! Structured milestone events for the webhook pipeline.
//!
//! Each function emits one `tracing` event carrying an `event` name and
//! `component = "webhook"` so that JSON log output can be filtered per
//! milestone. The subscriber (and therefore the output format) is chosen by
//! the service binary.
//!
//! Signatures and tokens are never logged. Of a comment body only the
//! first [`MAX_COMMAND_CHARS`] characters of the command after the keyword
//! are logged.

use tracing::{error, info, warn};

const COMPONENT: &str = "webhook";

/// Longest command excerpt written to the log, in characters
pub const MAX_COMMAND_CHARS: usize = 80;

pub fn webhook_received(delivery_id: &str, event_type: &str, payload_size: usize) {
    info!(
        event = "webhook_received",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        payload_size,
        "Webhook received"
    );
}

pub fn signature_verified(delivery_id: &str, event_type: &str) {
    info!(
        event = "signature_verified",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        "Webhook signature verified"
    );
}

pub fn signature_invalid(delivery_id: &str, event_type: &str, reason: &str) {
    warn!(
        event = "signature_invalid",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        reason = %reason,
        "Webhook signature rejected"
    );
}

pub fn authorization_checked(
    delivery_id: &str,
    repository: &str,
    authorized: bool,
    installation_id: i64,
) {
    info!(
        event = "authorization_checked",
        component = COMPONENT,
        delivery_id = %delivery_id,
        repository = %repository,
        authorized,
        installation_id,
        "Installation authorization checked"
    );
}

/// `command` is the text after the keyword, already trimmed.
pub fn keyword_detected(delivery_id: &str, keyword: &str, command: &str) {
    info!(
        event = "keyword_detected",
        component = COMPONENT,
        delivery_id = %delivery_id,
        keyword = %keyword,
        command = %command_excerpt(command),
        "Activation keyword detected"
    );
}

pub fn duplicate_detected(delivery_id: &str, event_type: &str) {
    info!(
        event = "duplicate_detected",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        "Duplicate delivery ignored"
    );
}

pub fn session_created(
    delivery_id: &str,
    session_id: &str,
    event_type: &str,
    repository: &str,
    github_url: &str,
) {
    info!(
        event = "session_created",
        component = COMPONENT,
        delivery_id = %delivery_id,
        session_id = %session_id,
        event_type = %event_type,
        repository = %repository,
        github_url = %github_url,
        "Agentic session created"
    );
}

pub fn session_creation_failed(delivery_id: &str, event_type: &str, reason: &str, error: &str) {
    error!(
        event = "session_creation_failed",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        reason = %reason,
        error = %error,
        "Agentic session creation failed"
    );
}

/// `comment_type` is `confirmation` or `error`.
pub fn github_comment_posted(
    delivery_id: &str,
    comment_type: &str,
    github_url: &str,
    success: bool,
) {
    info!(
        event = "github_comment_posted",
        component = COMPONENT,
        delivery_id = %delivery_id,
        comment_type = %comment_type,
        github_url = %github_url,
        success,
        "GitHub comment posted"
    );
}

/// Final record for one request. `status` is `success`, `rejected` or
/// `failed`.
pub fn webhook_processed(
    delivery_id: &str,
    event_type: &str,
    repository: &str,
    github_user: &str,
    status: &str,
    duration_ms: u64,
) {
    info!(
        event = "webhook_processed",
        component = COMPONENT,
        delivery_id = %delivery_id,
        event_type = %event_type,
        repository = %repository,
        github_user = %github_user,
        status = %status,
        duration_ms,
        "Webhook processed"
    );
}

/// Error raised by a named pipeline stage
pub fn error(
    delivery_id: &str,
    component: &str,
    message: &str,
    err: Option<&dyn std::error::Error>,
) {
    match err {
        Some(err) => error!(
            event = "error",
            component = %component,
            delivery_id = %delivery_id,
            error = %err,
            "{message}"
        ),
        None => error!(
            event = "error",
            component = %component,
            delivery_id = %delivery_id,
            "{message}"
        ),
    }
}

/// First [`MAX_COMMAND_CHARS`] characters of `command`, with `...` appended
/// when anything was cut
pub fn command_excerpt(command: &str) -> String {
    match command.char_indices().nth(MAX_COMMAND_CHARS) {
        Some((cut, _)) => format!("{}...", &command[..cut]),
        None => command.to_string(),
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
