//! Webhook processing pipeline.
//!
//! A delivery moves through validation, signature verification,
//! de-duplication and event routing. Activating `issue_comment` events then
//! go through keyword detection, installation and namespace authorization,
//! session creation and comment feedback. Every stage can end the request
//! early with its own status code, metric and log event.

use crate::config::SecretString;
use crate::errors::WebhookHandlerError;
use crate::metrics::WebhookMetrics;
use crate::responses::WebhookResponse;
use crate::validator::{header_str, validate_webhook_request, RequestError};
use axum::{
    body::Body,
    http::{HeaderMap, Method},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use webhook_gateway_core::{
    events::{is_supported_event_type, parse_issue_comment, EventKind, EventParseError},
    installation::InstallationError,
    logging,
    namespace::NamespaceError,
    signature::verify_signature,
    webhook::{DELIVERY_HEADER, EVENT_HEADER, UNKNOWN_DELIVERY_ID},
    DeduplicationCache, InstallationId, InstallationVerifier, IssueCommenter, KeywordDetector,
    NamespaceResolver, SessionContext, SessionCreator,
};

/// `X-GitHub-Event` value GitHub sends when a hook is first configured
pub const PING_EVENT: &str = "ping";

pub const DUPLICATE_MESSAGE: &str = "Webhook already processed (duplicate delivery ID)";
pub const SESSION_CREATED_MESSAGE: &str = "Webhook processed successfully, session created";
pub const NOT_AUTHORIZED_MESSAGE: &str = "Repository not authorized - GitHub App not installed";

/// Collaborators for [`WebhookHandler`], wired at startup
pub struct WebhookHandlerComponents {
    pub secret: SecretString,
    pub max_body_size: usize,
    pub dedup: Arc<DeduplicationCache>,
    pub installations: Arc<InstallationVerifier>,
    pub keywords: KeywordDetector,
    pub namespaces: NamespaceResolver,
    pub sessions: SessionCreator,
    pub commenter: Arc<dyn IssueCommenter>,
    pub metrics: Arc<WebhookMetrics>,
}

/// Runs the webhook pipeline for one request at a time; shared across
/// requests behind an `Arc`.
pub struct WebhookHandler {
    secret: SecretString,
    max_body_size: usize,
    dedup: Arc<DeduplicationCache>,
    installations: Arc<InstallationVerifier>,
    keywords: KeywordDetector,
    namespaces: NamespaceResolver,
    sessions: SessionCreator,
    commenter: Arc<dyn IssueCommenter>,
    metrics: Arc<WebhookMetrics>,
}

/// What is known about a request when it completes
struct RequestTrace {
    started: Instant,
    delivery_id: String,
    event_type: String,
    repository: String,
    github_user: String,
}

impl RequestTrace {
    fn start(headers: &HeaderMap) -> Self {
        let delivery_id = header_str(headers, DELIVERY_HEADER);
        Self {
            started: Instant::now(),
            delivery_id: if delivery_id.is_empty() {
                UNKNOWN_DELIVERY_ID.to_string()
            } else {
                delivery_id.to_string()
            },
            event_type: header_str(headers, EVENT_HEADER).to_string(),
            repository: String::new(),
            github_user: String::new(),
        }
    }
}

impl WebhookHandler {
    pub fn new(components: WebhookHandlerComponents) -> Self {
        Self {
            secret: components.secret,
            max_body_size: components.max_body_size,
            dedup: components.dedup,
            installations: components.installations,
            keywords: components.keywords,
            namespaces: components.namespaces,
            sessions: components.sessions,
            commenter: components.commenter,
            metrics: components.metrics,
        }
    }

    pub fn deduplication_cache(&self) -> &Arc<DeduplicationCache> {
        &self.dedup
    }

    pub fn installation_verifier(&self) -> &Arc<InstallationVerifier> {
        &self.installations
    }

    pub fn metrics(&self) -> &Arc<WebhookMetrics> {
        &self.metrics
    }

    /// Process one webhook request.
    ///
    /// Cache gauges, the duration histogram and the `webhook_processed` log
    /// event are recorded for every outcome.
    #[instrument(
        skip_all,
        fields(
            delivery_id = %header_str(headers, DELIVERY_HEADER),
            event_type = %header_str(headers, EVENT_HEADER),
        )
    )]
    pub async fn handle(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<WebhookResponse, WebhookHandlerError> {
        let mut trace = RequestTrace::start(headers);
        let result = self.process(method, headers, body, &mut trace).await;
        self.finish(&trace, &result);
        result
    }

    async fn process(
        &self,
        method: &Method,
        headers: &HeaderMap,
        body: Body,
        trace: &mut RequestTrace,
    ) -> Result<WebhookResponse, WebhookHandlerError> {
        let (webhook, payload) =
            validate_webhook_request(method, headers, body, self.max_body_size)
                .await
                .map_err(|e| self.reject_request(e, &trace.delivery_id))?;

        let delivery_id = webhook.delivery_id.as_str();
        let event_type = webhook.event_type.as_str();
        let event_label = metric_event_label(event_type);

        logging::webhook_received(delivery_id, event_type, payload.len());
        self.metrics.record_received(event_label);
        self.metrics.observe_payload_size(event_label, payload.len());

        if let Err(e) = verify_signature(
            &webhook.signature,
            &payload,
            self.secret.expose().as_bytes(),
        ) {
            logging::signature_invalid(delivery_id, event_type, &e.to_string());
            self.metrics.record_rejected("invalid_signature");
            return Err(WebhookHandlerError::unauthorized(
                "Invalid webhook signature",
                delivery_id,
            ));
        }

        logging::signature_verified(delivery_id, event_type);
        self.metrics.record_accepted(event_label);

        if !self.dedup.add(delivery_id) {
            logging::duplicate_detected(delivery_id, event_type);
            self.metrics.record_duplicate();
            return Ok(WebhookResponse::success(DUPLICATE_MESSAGE, delivery_id));
        }

        match EventKind::from_header(event_type) {
            Some(EventKind::IssueComment) => {
                self.handle_issue_comment(&payload, delivery_id, trace).await
            }
            Some(EventKind::PullRequest) => Ok(WebhookResponse::success(
                "pull_request events not yet supported",
                delivery_id,
            )),
            Some(EventKind::WorkflowRun) => Ok(WebhookResponse::success(
                "workflow_run events not yet supported",
                delivery_id,
            )),
            None if event_type == PING_EVENT => Ok(WebhookResponse::success(
                "Event type acknowledged but not processed",
                delivery_id,
            )),
            None => {
                debug!(delivery_id, event_type, "Unsupported event type");
                Ok(WebhookResponse::success(
                    "Event type not supported",
                    delivery_id,
                ))
            }
        }
    }

    async fn handle_issue_comment(
        &self,
        payload: &[u8],
        delivery_id: &str,
        trace: &mut RequestTrace,
    ) -> Result<WebhookResponse, WebhookHandlerError> {
        let event = match parse_issue_comment(payload, delivery_id) {
            Ok(event) => event,
            Err(EventParseError::IgnoredAction { action, .. }) => {
                debug!(delivery_id, action = %action, "Ignoring issue_comment action");
                return Ok(WebhookResponse::success(
                    format!("issue_comment action '{action}' ignored"),
                    delivery_id,
                ));
            }
            Err(e) => {
                logging::error(
                    delivery_id,
                    "parser",
                    "Failed to parse issue_comment payload",
                    Some(&e),
                );
                self.metrics.record_rejected("invalid_payload");
                return Err(WebhookHandlerError::bad_request(
                    "Invalid issue_comment payload",
                    delivery_id,
                ));
            }
        };

        let context = event.context;
        trace.repository = context.repository.clone();
        trace.github_user = context.triggered_by.clone();

        if !self.keywords.detect(&context.comment_body) {
            debug!(delivery_id, "No keyword detected in comment");
            return Ok(WebhookResponse::success(
                format!("No {} keyword detected", self.keywords.keyword()),
                delivery_id,
            ));
        }

        logging::keyword_detected(
            delivery_id,
            self.keywords.keyword(),
            &self.keywords.extract_command(&context.comment_body),
        );

        let installation_id = match self.installations.verify(&context.repository).await {
            Ok(id) => id,
            Err(InstallationError::NotAuthorized { .. }) => {
                logging::authorization_checked(delivery_id, &context.repository, false, 0);
                return Err(self
                    .reject_not_authorized(&context, event.installation_id, delivery_id)
                    .await);
            }
            Err(e @ InstallationError::Registry(_)) => {
                return Err(self.authorization_lookup_failed(&context, &e, delivery_id));
            }
        };

        logging::authorization_checked(
            delivery_id,
            &context.repository,
            true,
            installation_id.as_i64(),
        );

        let namespace = match self
            .namespaces
            .resolve(installation_id, &context.repository)
            .await
        {
            Ok(namespace) => namespace,
            Err(NamespaceError::NotAuthorized { .. }) => {
                return Err(self
                    .reject_not_authorized(&context, Some(installation_id), delivery_id)
                    .await);
            }
            Err(e @ NamespaceError::Ambiguous { .. }) => {
                logging::error(
                    delivery_id,
                    "namespace_resolver",
                    "Repository is claimed by more than one namespace",
                    Some(&e),
                );
                self.metrics
                    .record_failed(&context.event_type, "namespace_ambiguous");
                self.post_error(
                    installation_id,
                    &context,
                    "invalid_configuration",
                    "This repository is configured for more than one project.",
                    delivery_id,
                )
                .await;
                return Err(WebhookHandlerError::internal(
                    "Repository configuration is ambiguous",
                    delivery_id,
                ));
            }
            Err(e @ NamespaceError::Store(_)) => {
                return Err(self.authorization_lookup_failed(&context, &e, delivery_id));
            }
        };

        match self.sessions.create(&context, &namespace, delivery_id).await {
            Ok(session_id) => {
                self.metrics
                    .record_session_created(&context.event_type, &context.trigger_reason);
                if let Err(e) = self
                    .commenter
                    .post_confirmation(
                        installation_id,
                        &context.repository,
                        context.subject.number(),
                        &session_id,
                        delivery_id,
                    )
                    .await
                {
                    logging::error(
                        delivery_id,
                        "github_commenter",
                        "Failed to post confirmation comment",
                        Some(&e),
                    );
                }
                Ok(WebhookResponse::success(SESSION_CREATED_MESSAGE, delivery_id))
            }
            Err(e) if e.is_already_exists() => {
                info!(
                    delivery_id,
                    namespace = %namespace,
                    "Session for this delivery already exists"
                );
                Ok(WebhookResponse::success(
                    "Session already exists for this delivery",
                    delivery_id,
                ))
            }
            Err(e) => {
                self.metrics
                    .record_failed(&context.event_type, "session_creation_failed");
                self.post_error(
                    installation_id,
                    &context,
                    "session_creation_failed",
                    &e.to_string(),
                    delivery_id,
                )
                .await;
                Err(WebhookHandlerError::internal(
                    "Failed to create session",
                    delivery_id,
                ))
            }
        }
    }

    fn reject_request(&self, err: RequestError, delivery_id: &str) -> WebhookHandlerError {
        self.metrics.record_rejected(err.metric_reason());
        match err {
            RequestError::PayloadTooLarge { .. } => WebhookHandlerError::PayloadTooLarge {
                message: err.to_string(),
                delivery_id: delivery_id.to_string(),
            },
            RequestError::Body { ref message } => {
                debug!(delivery_id, error = %message, "Failed to read webhook body");
                WebhookHandlerError::bad_request(err.to_string(), delivery_id)
            }
            _ => WebhookHandlerError::bad_request(err.to_string(), delivery_id),
        }
    }

    /// 401 with a `not_authorized` comment.
    ///
    /// The comment is only posted when an installation id is known, since
    /// the GitHub API cannot be called without one.
    async fn reject_not_authorized(
        &self,
        context: &SessionContext,
        installation_id: Option<InstallationId>,
        delivery_id: &str,
    ) -> WebhookHandlerError {
        self.metrics.record_rejected("not_authorized");

        match installation_id {
            Some(installation_id) => {
                self.post_error(
                    installation_id,
                    context,
                    "not_authorized",
                    NOT_AUTHORIZED_MESSAGE,
                    delivery_id,
                )
                .await;
            }
            None => debug!(
                delivery_id,
                repository = %context.repository,
                "No installation id in payload, skipping not_authorized comment"
            ),
        }

        WebhookHandlerError::unauthorized(NOT_AUTHORIZED_MESSAGE, delivery_id)
    }

    fn authorization_lookup_failed(
        &self,
        context: &SessionContext,
        err: &dyn std::error::Error,
        delivery_id: &str,
    ) -> WebhookHandlerError {
        logging::error(
            delivery_id,
            "authorization",
            "Authorization lookup failed",
            Some(err),
        );
        self.metrics
            .record_failed(&context.event_type, "authorization_lookup_failed");
        WebhookHandlerError::internal("Failed to verify repository authorization", delivery_id)
    }

    async fn post_error(
        &self,
        installation_id: InstallationId,
        context: &SessionContext,
        error_kind: &str,
        message: &str,
        delivery_id: &str,
    ) {
        if let Err(e) = self
            .commenter
            .post_error(
                installation_id,
                &context.repository,
                context.subject.number(),
                error_kind,
                message,
                delivery_id,
            )
            .await
        {
            logging::error(
                delivery_id,
                "github_commenter",
                "Failed to post error comment",
                Some(&e),
            );
        }
    }

    fn finish(
        &self,
        trace: &RequestTrace,
        result: &Result<WebhookResponse, WebhookHandlerError>,
    ) {
        let elapsed = trace.started.elapsed();
        self.metrics
            .set_cache_sizes(self.dedup.size(), self.installations.cache_size());
        self.metrics
            .observe_duration(metric_event_label(&trace.event_type), elapsed);

        let status = match result {
            Ok(_) => "success",
            Err(e) if e.status_code().is_server_error() => "failed",
            Err(_) => "rejected",
        };
        logging::webhook_processed(
            &trace.delivery_id,
            &trace.event_type,
            &trace.repository,
            &trace.github_user,
            status,
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        );
    }
}

/// `event_type` label value. Header values are unauthenticated until the
/// signature is checked, so unknown events share one label.
fn metric_event_label(event_type: &str) -> &str {
    if is_supported_event_type(event_type) || event_type == PING_EVENT {
        event_type
    } else {
        "other"
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
