//! Session resource model and creation.
//!
//! A [`SessionContext`] is assembled from one webhook payload. The
//! [`SessionCreator`] turns it into an [`AgenticSession`] resource with a
//! deterministic name and creates it synchronously through the
//! [`ResourceStore`]. Lifecycle after creation belongs to the operator.

use crate::logging;
use crate::naming::{label_value, repository_label, session_name};
use crate::store::{ResourceStore, StoreError};
use crate::SessionSubject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// API group/version of the session resource
pub const SESSION_API_VERSION: &str = "vteam.ambient-code/v1alpha1";

/// Kind of the session resource
pub const SESSION_KIND: &str = "AgenticSession";

/// Upper bound on the synchronous create call
pub const DEFAULT_SESSION_CREATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Run time limit written into every session spec, in seconds
pub const SESSION_RUN_TIMEOUT_SECONDS: u32 = 300;

/// Value of the `source` label and of [`SessionContext::source`]
pub const WEBHOOK_SOURCE: &str = "webhook";

/// Label and annotation keys written onto every session.
///
/// Label values are sanitized; the exact repository name and delivery id
/// are kept in annotations under [`keys::REPOSITORY_FULL_NAME`] and
/// [`keys::DELIVERY_ID`].
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const REPOSITORY: &str = "github.com/repo";
    pub const EVENT: &str = "github.com/event";
    pub const DELIVERY_ID: &str = "webhook/delivery-id";
    pub const PR_NUMBER: &str = "github.com/pr-number";
    pub const ISSUE_NUMBER: &str = "github.com/issue-number";

    pub const REPOSITORY_FULL_NAME: &str = "webhook/repository";
    pub const GITHUB_URL: &str = "webhook/github-url";
    pub const TRIGGERED_BY: &str = "webhook/triggered-by";
    pub const TRIGGER_REASON: &str = "webhook/trigger-reason";
}

// ============================================================================
// Session context
// ============================================================================

/// Everything the pipeline needs to know about one triggering event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Always [`WEBHOOK_SOURCE`] for this pipeline
    pub source: String,

    /// GitHub event name, e.g. `issue_comment`
    pub event_type: String,

    pub delivery_id: String,

    /// Repository full name, `owner/repo`
    pub repository: String,

    /// Browser URL of the PR or issue
    pub github_url: String,

    pub subject: SessionSubject,

    /// Login of the user who triggered the event
    pub triggered_by: String,

    /// Why the session is being created, e.g. `keyword_detected`
    pub trigger_reason: String,

    /// Original comment text
    pub comment_body: String,
}

impl SessionContext {
    pub fn pr_number(&self) -> Option<u64> {
        self.subject.pr_number()
    }

    pub fn issue_number(&self) -> Option<u64> {
        self.subject.issue_number()
    }
}

// ============================================================================
// Session resource
// ============================================================================

/// The `AgenticSession` custom resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgenticSession {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: AgenticSessionSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgenticSessionStatus>,
}

/// Resource metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

/// Owner of a resource, collected together with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerReference {
    /// Reference to the namespace `name` with the given `uid`
    pub fn namespace(name: &str, uid: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Namespace".to_string(),
            name: name.to_string(),
            uid: uid.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgenticSessionSpec {
    pub display_name: String,
    pub project: String,
    pub initial_prompt: String,
    pub llm_settings: LlmSettings,

    /// Session timeout in seconds
    pub timeout: u32,

    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
}

/// Model settings for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "sonnet".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgenticSessionStatus {
    pub phase: String,
}

// ============================================================================
// Session creation
// ============================================================================

/// Session creation failures
#[derive(Debug, thiserror::Error)]
pub enum SessionCreationError {
    /// The store rejected or failed the create call
    #[error("failed to create agentic session: {0}")]
    ClusterApi(#[from] StoreError),

    /// The create call did not finish within the configured bound
    #[error("session creation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The store accepted the session but returned it without a name
    #[error("created session but could not extract name")]
    MissingName,
}

impl SessionCreationError {
    /// Short machine-readable reason for logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ClusterApi(StoreError::AlreadyExists { .. }) => "already_exists",
            Self::ClusterApi(_) => "kubernetes_api_error",
            Self::Timeout { .. } => "timeout",
            Self::MissingName => "missing_session_id",
        }
    }

    /// Whether the failure is the store reporting that the session exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::ClusterApi(StoreError::AlreadyExists { .. }))
    }
}

/// Builds session resources and creates them through a [`ResourceStore`]
pub struct SessionCreator {
    store: Arc<dyn ResourceStore>,
    timeout: Duration,
}

impl SessionCreator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_SESSION_CREATION_TIMEOUT,
        }
    }

    /// Override the bound on the synchronous create call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the resource for `context` without creating it
    pub fn build_session(
        &self,
        context: &SessionContext,
        namespace: &str,
        delivery_id: &str,
    ) -> AgenticSession {
        let name = session_name(&context.repository, context.subject, delivery_id);

        let mut labels = BTreeMap::from([
            (keys::SOURCE.to_string(), WEBHOOK_SOURCE.to_string()),
            (
                keys::REPOSITORY.to_string(),
                repository_label(&context.repository),
            ),
            (keys::EVENT.to_string(), label_value(&context.event_type)),
            (keys::DELIVERY_ID.to_string(), label_value(delivery_id)),
        ]);
        match context.subject {
            SessionSubject::PullRequest(n) => {
                labels.insert(keys::PR_NUMBER.to_string(), n.to_string());
            }
            SessionSubject::Issue(n) => {
                labels.insert(keys::ISSUE_NUMBER.to_string(), n.to_string());
            }
        }

        let annotations = BTreeMap::from([
            (
                keys::REPOSITORY_FULL_NAME.to_string(),
                context.repository.clone(),
            ),
            (keys::DELIVERY_ID.to_string(), delivery_id.to_string()),
            (keys::GITHUB_URL.to_string(), context.github_url.clone()),
            (keys::TRIGGERED_BY.to_string(), context.triggered_by.clone()),
            (keys::TRIGGER_REASON.to_string(), context.trigger_reason.clone()),
        ]);

        let environment_variables = BTreeMap::from([
            ("WEBHOOK_DELIVERY_ID".to_string(), delivery_id.to_string()),
            ("GITHUB_REPOSITORY".to_string(), context.repository.clone()),
            ("GITHUB_EVENT_TYPE".to_string(), context.event_type.clone()),
        ]);

        AgenticSession {
            api_version: SESSION_API_VERSION.to_string(),
            kind: SESSION_KIND.to_string(),
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace.to_string()),
                labels,
                annotations,
                owner_references: Vec::new(),
            },
            spec: AgenticSessionSpec {
                display_name: format!("Webhook: {}", context.trigger_reason),
                project: namespace.to_string(),
                initial_prompt: build_initial_prompt(context),
                llm_settings: LlmSettings::default(),
                timeout: SESSION_RUN_TIMEOUT_SECONDS,
                environment_variables,
            },
            status: Some(AgenticSessionStatus {
                phase: "Pending".to_string(),
            }),
        }
    }

    /// Create the session for `context` in `namespace` and return its name.
    ///
    /// Makes exactly one create call, bounded by the configured timeout.
    /// Retrying is left to the webhook sender; the deterministic name makes
    /// a retried create collide with the existing resource.
    #[instrument(skip(self, context), fields(repository = %context.repository))]
    pub async fn create(
        &self,
        context: &SessionContext,
        namespace: &str,
        delivery_id: &str,
    ) -> Result<String, SessionCreationError> {
        let mut session = self.build_session(context, namespace, delivery_id);
        if let Some(owner) = self.namespace_owner(namespace, delivery_id).await {
            session.metadata.owner_references.push(owner);
        }
        debug!(
            delivery_id = %delivery_id,
            session_name = ?session.metadata.name,
            namespace = %namespace,
            "Creating agentic session"
        );

        let result = tokio::time::timeout(
            self.timeout,
            self.store.create_session(namespace, &session),
        )
        .await;

        let created = match result {
            Ok(Ok(created)) => created,
            Ok(Err(e)) => {
                let err = SessionCreationError::ClusterApi(e);
                logging::session_creation_failed(
                    delivery_id,
                    &context.event_type,
                    err.reason(),
                    &err.to_string(),
                );
                return Err(err);
            }
            Err(_) => {
                let err = SessionCreationError::Timeout {
                    seconds: self.timeout.as_secs(),
                };
                logging::session_creation_failed(
                    delivery_id,
                    &context.event_type,
                    err.reason(),
                    &err.to_string(),
                );
                return Err(err);
            }
        };

        let Some(session_id) = created.metadata.name.filter(|name| !name.is_empty()) else {
            let err = SessionCreationError::MissingName;
            logging::session_creation_failed(
                delivery_id,
                &context.event_type,
                err.reason(),
                "Created session but could not extract name",
            );
            return Err(err);
        };

        logging::session_created(
            delivery_id,
            &session_id,
            &context.event_type,
            &context.repository,
            &context.github_url,
        );
        Ok(session_id)
    }

    /// Owner reference to `namespace` so the session is removed with it.
    ///
    /// Failing to look the namespace up is logged and the session is
    /// created without an owner.
    async fn namespace_owner(
        &self,
        namespace: &str,
        delivery_id: &str,
    ) -> Option<OwnerReference> {
        let lookup = self.store.namespace_uid(namespace);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Some(uid))) => Some(OwnerReference::namespace(namespace, uid)),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                logging::error(
                    delivery_id,
                    "session_creator",
                    "Failed to get namespace for owner reference",
                    Some(&e),
                );
                None
            }
            Err(_) => {
                logging::error(
                    delivery_id,
                    "session_creator",
                    "Timed out getting namespace for owner reference",
                    None,
                );
                None
            }
        }
    }
}

/// Render the first prompt the session receives
pub fn build_initial_prompt(context: &SessionContext) -> String {
    match (context.event_type.as_str(), context.subject) {
        ("issue_comment", SessionSubject::PullRequest(number)) => format!(
            "You have been requested to help with a GitHub pull request.\n\n\
             **Repository**: {}\n\
             **Pull Request**: #{}\n\
             **URL**: {}\n\
             **Requested by**: @{}\n\n\
             **User Comment**:\n{}\n\n\
             Please analyze the pull request and provide a helpful response based on the user's request.",
            context.repository,
            number,
            context.github_url,
            context.triggered_by,
            context.comment_body,
        ),
        ("issue_comment", SessionSubject::Issue(number)) => format!(
            "You have been requested to help with a GitHub issue.\n\n\
             **Repository**: {}\n\
             **Issue**: #{}\n\
             **URL**: {}\n\
             **Requested by**: @{}\n\n\
             **User Comment**:\n{}\n\n\
             Please help address the user's request regarding this issue.",
            context.repository,
            number,
            context.github_url,
            context.triggered_by,
            context.comment_body,
        ),
        _ => format!(
            "Webhook event received from GitHub.\n\n\
             **Repository**: {}\n\
             **Event Type**: {}\n\
             **URL**: {}\n",
            context.repository, context.event_type, context.github_url,
        ),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
