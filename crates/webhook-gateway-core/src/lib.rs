//! # Webhook-Gateway Core
//!
//! Domain logic for turning GitHub webhook deliveries into agentic work
//! sessions.
//!
//! The crate contains every stage of the ingestion pipeline except the HTTP
//! transport itself:
//! - HMAC-SHA256 signature verification
//! - delivery de-duplication and installation caching
//! - activation keyword detection
//! - tenant namespace resolution
//! - deterministic session naming and creation
//! - GitHub comment feedback
//!
//! ## Architecture
//!
//! Business logic depends only on trait abstractions ([`ResourceStore`],
//! [`InstallationRegistry`], [`TokenManager`], [`IssueCommenter`]). Concrete
//! infrastructure is injected at startup by the service binary.
//!
//! ## Usage
//!
//! ```rust
//! use webhook_gateway_core::{naming::session_name, SessionSubject};
//!
//! let name = session_name("acme/backend", SessionSubject::PullRequest(42), "delivery-1");
//! assert!(name.starts_with("webhook-acme-backend-pr42-"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// GitHub App installation identifier
///
/// Valid installation ids are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(i64);

impl InstallationId {
    /// Create an installation id, rejecting zero and negative values
    pub fn new(id: i64) -> Result<Self, ParseError> {
        if id <= 0 {
            return Err(ParseError::InvalidFormat {
                expected: "positive installation id".to_string(),
                actual: id.to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Get the raw numeric value
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstallationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<i64>().map_err(|_| ParseError::InvalidFormat {
            expected: "integer installation id".to_string(),
            actual: s.to_string(),
        })?;
        Self::new(value)
    }
}

/// The PR or issue a webhook event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSubject {
    PullRequest(u64),
    Issue(u64),
}

impl SessionSubject {
    /// PR number, if the subject is a pull request
    pub fn pr_number(&self) -> Option<u64> {
        match self {
            Self::PullRequest(n) => Some(*n),
            Self::Issue(_) => None,
        }
    }

    /// Issue number, if the subject is a standalone issue
    pub fn issue_number(&self) -> Option<u64> {
        match self {
            Self::PullRequest(_) => None,
            Self::Issue(n) => Some(*n),
        }
    }

    /// The number used by the GitHub issues API for either kind
    pub fn number(&self) -> u64 {
        match self {
            Self::PullRequest(n) | Self::Issue(n) => *n,
        }
    }
}

/// Split an `owner/repo` full name into its two parts
///
/// Returns `None` unless there is exactly one `/` separating two
/// non-empty segments.
pub fn split_repository(full_name: &str) -> Option<(&str, &str)> {
    let (owner, repo) = full_name.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// TTL cache and cancellable background sweeper shared by both caches
pub mod cache;

/// Delivery-id de-duplication
pub mod dedup;

/// GitHub webhook payload types and parsers
pub mod events;

/// GitHub comment feedback and installation tokens
pub mod github;

/// GitHub App installation verification
pub mod installation;

/// Activation keyword detection
pub mod keywords;

/// Structured pipeline log events
pub mod logging;

/// Tenant namespace resolution
pub mod namespace;

/// Deterministic session naming
pub mod naming;

/// Session resource model and creation
pub mod session;

/// HMAC-SHA256 webhook signature verification
pub mod signature;

/// Cluster resource store abstraction
pub mod store;

/// Webhook HTTP header model
pub mod webhook;

pub use dedup::DeduplicationCache;
pub use github::{GitHubCommenter, IssueCommenter, TokenManager};
pub use installation::{InstallationRegistry, InstallationVerifier};
pub use keywords::KeywordDetector;
pub use namespace::NamespaceResolver;
pub use session::{SessionContext, SessionCreator};
pub use store::ResourceStore;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
