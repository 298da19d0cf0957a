//! Tenant namespace resolution.
//!
//! Each tenant namespace carries a [`ProjectSettings`] record binding a
//! GitHub installation and an allow-list of repositories. A webhook may only
//! create sessions in the single namespace whose record matches both.

use crate::store::{ProjectSettings, ResourceStore, StoreError};
use crate::InstallationId;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("repository {repository} not authorized for installation {installation_id} (no matching ProjectSettings)")]
    NotAuthorized {
        repository: String,
        installation_id: InstallationId,
    },

    /// More than one namespace claims the same installation and repository
    #[error("repository {repository} is claimed by multiple namespaces: {}", namespaces.join(", "))]
    Ambiguous {
        repository: String,
        namespaces: Vec<String>,
    },

    #[error("failed to list ProjectSettings: {0}")]
    Store(#[from] StoreError),
}

/// Maps an (installation, repository) pair to its tenant namespace
pub struct NamespaceResolver {
    store: Arc<dyn ResourceStore>,
}

impl NamespaceResolver {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        installation_id: InstallationId,
        repository: &str,
    ) -> Result<String, NamespaceError> {
        let settings = self.store.list_project_settings().await?;

        let mut namespaces: Vec<String> = settings
            .iter()
            .filter(|s| matches_binding(s, installation_id, repository))
            .map(|s| s.namespace.clone())
            .collect();
        namespaces.sort();
        namespaces.dedup();

        match namespaces.len() {
            0 => Err(NamespaceError::NotAuthorized {
                repository: repository.to_string(),
                installation_id,
            }),
            1 => {
                let namespace = namespaces.remove(0);
                debug!(namespace = %namespace, "Resolved tenant namespace");
                Ok(namespace)
            }
            _ => Err(NamespaceError::Ambiguous {
                repository: repository.to_string(),
                namespaces,
            }),
        }
    }
}

fn matches_binding(
    settings: &ProjectSettings,
    installation_id: InstallationId,
    repository: &str,
) -> bool {
    settings.github_installation.as_ref().is_some_and(|binding| {
        binding.installation_id == installation_id.as_i64()
            && binding
                .repositories
                .iter()
                .any(|r| r.eq_ignore_ascii_case(repository))
    })
}

#[cfg(test)]
#[path = "namespace_tests.rs"]
mod tests;
