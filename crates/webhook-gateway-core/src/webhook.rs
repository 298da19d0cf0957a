//! Webhook request metadata.

/// `X-Hub-Signature-256`
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// `X-GitHub-Event`
pub const EVENT_HEADER: &str = "x-github-event";

/// `X-GitHub-Delivery`
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// `X-GitHub-Hook-ID`
pub const HOOK_ID_HEADER: &str = "x-github-hook-id";

/// Delivery id reported when a request carries none
pub const UNKNOWN_DELIVERY_ID: &str = "unknown";

/// Default cap on the webhook body size (10 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// GitHub-specific headers, extracted once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub signature: String,   // X-Hub-Signature-256
    pub event_type: String,  // X-GitHub-Event
    pub delivery_id: String, // X-GitHub-Delivery
    pub hook_id: Option<String>,
    pub content_type: String,
}
