//! GitHub App installation verification.
//!
//! A repository is authorized when the GitHub App is installed for it. The
//! source of truth is an [`InstallationRegistry`]; results are cached per
//! repository for an hour. A cache miss always means "ask the registry",
//! never "unauthorized".

use crate::cache::{Sweep, Sweeper, TtlCache};
use crate::store::StoreError;
use crate::InstallationId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default lifetime of a cached verification
pub const DEFAULT_INSTALLATION_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default interval between sweeps of expired verifications
pub const DEFAULT_INSTALLATION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// One GitHub App installation known to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    pub installation_id: i64,

    #[serde(default)]
    pub github_user_id: String,

    /// Repositories (`owner/repo`) the installation grants access to
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl InstallationRecord {
    /// Whether this record lists `repository`. GitHub names compare
    /// case-insensitively.
    pub fn covers(&self, repository: &str) -> bool {
        self.repositories
            .iter()
            .any(|r| r.eq_ignore_ascii_case(repository))
    }
}

/// Source of truth for installations
#[async_trait]
pub trait InstallationRegistry: Send + Sync {
    async fn list_installations(&self) -> Result<Vec<InstallationRecord>, StoreError>;
}

/// How a registry record authorizes a repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationPolicy {
    /// The record must list the repository explicitly
    #[default]
    RepositoryScoped,

    /// Any valid installation authorizes every repository.
    ///
    /// Only for single-tenant deployments; tenant isolation then rests
    /// entirely on namespace resolution.
    AnyInstallation,
}

#[derive(Debug, thiserror::Error)]
pub enum InstallationError {
    #[error("repository '{repository}' not authorized - GitHub App not installed")]
    NotAuthorized { repository: String },

    #[error("failed to read installation registry: {0}")]
    Registry(#[from] StoreError),
}

/// Cached repository-to-installation authorization
pub struct InstallationVerifier {
    registry: Arc<dyn InstallationRegistry>,
    policy: InstallationPolicy,
    cache: TtlCache<InstallationId>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl InstallationVerifier {
    /// Create a verifier without a background sweeper
    pub fn new(
        registry: Arc<dyn InstallationRegistry>,
        policy: InstallationPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            policy,
            cache: TtlCache::new(ttl),
            sweeper: Mutex::new(None),
        }
    }

    /// Create a verifier and start its sweeper on the current tokio runtime
    pub fn with_sweeper(
        registry: Arc<dyn InstallationRegistry>,
        policy: InstallationPolicy,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let verifier = Arc::new(Self::new(registry, policy, ttl));
        let sweeper = Sweeper::spawn("installation", Arc::downgrade(&verifier), sweep_interval);
        *verifier
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sweeper);
        verifier
    }

    pub fn policy(&self) -> InstallationPolicy {
        self.policy
    }

    /// Return the installation authorizing `repository`.
    ///
    /// Results are cached per repository regardless of case.
    #[instrument(skip(self))]
    pub async fn verify(&self, repository: &str) -> Result<InstallationId, InstallationError> {
        let key = cache_key(repository);
        if let Some(id) = self.cache.get(&key) {
            debug!(repository, installation_id = %id, "Installation cache hit");
            return Ok(id);
        }

        let records = self.registry.list_installations().await?;
        let Some(id) = self.select(&records, repository) else {
            return Err(InstallationError::NotAuthorized {
                repository: repository.to_string(),
            });
        };

        self.cache.insert(key, id);
        Ok(id)
    }

    fn select(&self, records: &[InstallationRecord], repository: &str) -> Option<InstallationId> {
        records
            .iter()
            .filter(|record| match self.policy {
                InstallationPolicy::RepositoryScoped => record.covers(repository),
                InstallationPolicy::AnyInstallation => true,
            })
            .find_map(|record| match InstallationId::new(record.installation_id) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(
                        installation_id = record.installation_id,
                        "Skipping installation record with invalid id"
                    );
                    None
                }
            })
    }

    /// Forget the cached result for `repository`
    pub fn invalidate(&self, repository: &str) {
        self.cache.remove(&cache_key(repository));
    }

    /// Number of cached verifications
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Stop the background sweeper, if one is running
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
    }
}

impl Sweep for InstallationVerifier {
    fn sweep(&self) -> usize {
        self.cache.purge_expired()
    }
}

fn cache_key(repository: &str) -> String {
    repository.to_ascii_lowercase()
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
