//! GitHub event payloads and parsing.
//!
//! Only `issue_comment` drives session creation today. `pull_request` and
//! `workflow_run` are recognised so they can be acknowledged distinctly.

use crate::session::{SessionContext, WEBHOOK_SOURCE};
use crate::{InstallationId, SessionSubject};
use serde::Deserialize;

/// GitHub event types the gateway recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IssueComment,
    PullRequest,
    WorkflowRun,
}

impl EventKind {
    /// Recognise an `X-GitHub-Event` value
    pub fn from_header(event_type: &str) -> Option<Self> {
        match event_type {
            "issue_comment" => Some(Self::IssueComment),
            "pull_request" => Some(Self::PullRequest),
            "workflow_run" => Some(Self::WorkflowRun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
            Self::WorkflowRun => "workflow_run",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `event_type` is one of the recognised events
pub fn is_supported_event_type(event_type: &str) -> bool {
    EventKind::from_header(event_type).is_some()
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentPayload {
    /// `created`, `edited` or `deleted`
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
    pub repository: Repository,

    #[serde(default)]
    pub sender: Option<User>,

    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub state: String,

    pub html_url: String,

    /// Present only when the issue is a pull request
    #[serde(default)]
    pub pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: i64,

    #[serde(default)]
    pub body: String,

    pub user: User,

    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,

    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,

    #[serde(default)]
    pub id: i64,

    /// `User`, `Bot` or `Organization`
    #[serde(default, rename = "type")]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRef {
    pub id: i64,
}

// ============================================================================
// Parsing
// ============================================================================

/// Errors turning a payload into a [`SessionContext`]
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("failed to parse {event_type} payload: {source}")]
    Malformed {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The action is valid GitHub input that the gateway does not act on
    #[error("ignoring {event_type} action: {action}")]
    IgnoredAction {
        event_type: &'static str,
        action: String,
    },
}

/// A parsed `issue_comment` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub context: SessionContext,

    /// Installation that delivered the webhook, when GitHub includes it.
    /// Not proof of authorization; only used to address feedback comments.
    pub installation_id: Option<InstallationId>,
}

/// Parse an `issue_comment` payload.
///
/// Only `created` comments are accepted. A `pull_request` key on the issue
/// marks a PR conversation comment.
pub fn parse_issue_comment(
    payload: &[u8],
    delivery_id: &str,
) -> Result<IssueCommentEvent, EventParseError> {
    let event: IssueCommentPayload =
        serde_json::from_slice(payload).map_err(|source| EventParseError::Malformed {
            event_type: EventKind::IssueComment.as_str(),
            source,
        })?;

    if event.action != "created" {
        return Err(EventParseError::IgnoredAction {
            event_type: EventKind::IssueComment.as_str(),
            action: event.action,
        });
    }

    let subject = if event.issue.pull_request.is_some() {
        SessionSubject::PullRequest(event.issue.number)
    } else {
        SessionSubject::Issue(event.issue.number)
    };

    let installation_id = event
        .installation
        .and_then(|installation| InstallationId::new(installation.id).ok());

    let context = SessionContext {
        source: WEBHOOK_SOURCE.to_string(),
        event_type: EventKind::IssueComment.as_str().to_string(),
        delivery_id: delivery_id.to_string(),
        repository: event.repository.full_name,
        github_url: event.issue.html_url,
        subject,
        triggered_by: event.comment.user.login,
        trigger_reason: "keyword_detected".to_string(),
        comment_body: event.comment.body,
    };

    Ok(IssueCommentEvent {
        context,
        installation_id,
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
