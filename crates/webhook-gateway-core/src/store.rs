//! Cluster resource store abstraction.
//!
//! The pipeline writes session resources and reads tenant authorization
//! records through [`ResourceStore`]. The service binary supplies a
//! Kubernetes REST implementation; tests supply in-memory ones.

use crate::session::AgenticSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tenant authorization record, one per namespace.
///
/// Maps a GitHub App installation and an allow-list of repositories to the
/// namespace that may receive sessions for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub namespace: String,

    #[serde(default)]
    pub github_installation: Option<GitHubInstallationBinding>,
}

/// GitHub installation section of [`ProjectSettings`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubInstallationBinding {
    #[serde(rename = "installationID")]
    pub installation_id: i64,

    #[serde(default)]
    pub repositories: Vec<String>,
}

/// Errors returned by [`ResourceStore`] implementations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A resource with the same name already exists (HTTP 409)
    #[error("resource '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("access to the cluster API was denied")]
    Forbidden,

    #[error("cluster API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("cluster API request failed: {message}")]
    Transport { message: String },

    #[error("cluster API response could not be decoded: {message}")]
    InvalidResponse { message: String },
}

impl StoreError {
    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Transport { .. } => true,
            Self::AlreadyExists { .. }
            | Self::NotFound { .. }
            | Self::Forbidden
            | Self::InvalidResponse { .. } => false,
        }
    }
}

/// Access to cluster-stored resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create a session resource in `namespace` and return the stored object.
    ///
    /// Implementations must fail with [`StoreError::AlreadyExists`] when a
    /// session of the same name exists, rather than overwriting it.
    async fn create_session(
        &self,
        namespace: &str,
        session: &AgenticSession,
    ) -> Result<AgenticSession, StoreError>;

    /// List tenant authorization records across all namespaces
    async fn list_project_settings(&self) -> Result<Vec<ProjectSettings>, StoreError>;

    /// UID of `namespace`, used to make it the owner of new sessions.
    ///
    /// `None` means the store cannot tell; sessions are then created
    /// without an owner reference.
    async fn namespace_uid(&self, _namespace: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}
