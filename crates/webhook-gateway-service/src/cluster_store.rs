//! Kubernetes REST implementation of the cluster collaborators.
//!
//! Talks to the API server directly with a service account bearer token:
//! - `AgenticSession` creation and `ProjectSettings` listing for
//!   [`ResourceStore`]
//! - the installations ConfigMap for [`InstallationRegistry`]

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use webhook_gateway_api::config::ClusterConfig;
use webhook_gateway_core::{
    installation::{InstallationRecord, InstallationRegistry},
    session::{AgenticSession, ObjectMeta, SESSION_API_VERSION},
    store::{GitHubInstallationBinding, ProjectSettings, ResourceStore, StoreError},
};
use zeroize::Zeroizing;

/// Cluster access over the Kubernetes REST API
pub struct KubernetesStore {
    client: reqwest::Client,
    api_url: String,
    token_file: PathBuf,
    installations_namespace: String,
    installations_config_map: String,
}

/// List response whose items are decoded one at a time
#[derive(Deserialize)]
struct RawObjectList {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ProjectSettingsObject {
    #[serde(default)]
    metadata: ObjectMeta,

    #[serde(default)]
    spec: Option<ProjectSettingsSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSettingsSpec {
    #[serde(default)]
    github_installation: Option<GitHubInstallationBinding>,
}

#[derive(Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct NamespaceObject {
    #[serde(default)]
    metadata: NamespaceMeta,
}

#[derive(Default, Deserialize)]
struct NamespaceMeta {
    #[serde(default)]
    uid: Option<String>,
}

#[derive(Deserialize)]
struct CreatedObject {
    #[serde(default)]
    metadata: ObjectMeta,
}

impl KubernetesStore {
    /// Build a client for `config`.
    ///
    /// A configured CA bundle that does not exist is skipped with a warning
    /// so that the same defaults work outside a cluster.
    pub fn new(config: &ClusterConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());

        if let Some(ca_path) = &config.ca_bundle_file {
            match std::fs::read(ca_path) {
                Ok(pem) => {
                    let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                        StoreError::Transport {
                            message: format!("invalid CA bundle {}: {e}", ca_path.display()),
                        }
                    })?;
                    builder = builder.add_root_certificate(certificate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        path = %ca_path.display(),
                        "Cluster CA bundle not found, using system roots"
                    );
                }
                Err(e) => {
                    return Err(StoreError::Transport {
                        message: format!("failed to read CA bundle {}: {e}", ca_path.display()),
                    })
                }
            }
        }

        let client = builder.build().map_err(|e| StoreError::Transport {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token_file: config.token_file.clone(),
            installations_namespace: config.installations_namespace.clone(),
            installations_config_map: config.installations_config_map.clone(),
        })
    }

    /// Service account tokens rotate, so the file is read per request
    async fn bearer_token(&self) -> Result<Zeroizing<String>, StoreError> {
        read_token(&self.token_file).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, StoreError> {
        let token = self.bearer_token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, resource).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ResourceStore for KubernetesStore {
    #[instrument(skip(self, session), fields(name = ?session.metadata.name))]
    async fn create_session(
        &self,
        namespace: &str,
        session: &AgenticSession,
    ) -> Result<AgenticSession, StoreError> {
        let token = self.bearer_token().await?;
        let url = format!(
            "{}/apis/{}/namespaces/{}/agenticsessions",
            self.api_url, SESSION_API_VERSION, namespace
        );
        let name = session.metadata.name.clone().unwrap_or_default();

        let response = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .json(session)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::AlreadyExists { name });
        }
        let response = check_status(response, &format!("agenticsessions/{name}")).await?;

        let created: CreatedObject =
            response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let mut stored = session.clone();
        stored.metadata = created.metadata;
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn list_project_settings(&self) -> Result<Vec<ProjectSettings>, StoreError> {
        let path = format!("/apis/{SESSION_API_VERSION}/projectsettings");
        let list: RawObjectList = self.get_json(&path, "projectsettings").await?;

        Ok(parse_project_settings(list.items))
    }

    #[instrument(skip(self))]
    async fn namespace_uid(&self, namespace: &str) -> Result<Option<String>, StoreError> {
        let path = format!("/api/v1/namespaces/{namespace}");
        let object: NamespaceObject = self
            .get_json(&path, &format!("namespaces/{namespace}"))
            .await?;

        Ok(object.metadata.uid.filter(|uid| !uid.is_empty()))
    }
}

#[async_trait]
impl InstallationRegistry for KubernetesStore {
    #[instrument(skip(self))]
    async fn list_installations(&self) -> Result<Vec<InstallationRecord>, StoreError> {
        let path = format!(
            "/api/v1/namespaces/{}/configmaps/{}",
            self.installations_namespace, self.installations_config_map
        );
        let config_map: ConfigMap = self
            .get_json(&path, &format!("configmaps/{}", self.installations_config_map))
            .await?;

        Ok(parse_installations(&config_map.data))
    }
}

/// Decode ProjectSettings items one by one.
///
/// A record that does not decode only loses its own tenant; the rest of
/// the list still authorizes.
fn parse_project_settings(items: Vec<serde_json::Value>) -> Vec<ProjectSettings> {
    items
        .into_iter()
        .filter_map(|item| {
            let owner = item
                .pointer("/metadata/namespace")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let object = match serde_json::from_value::<ProjectSettingsObject>(item) {
                Ok(object) => object,
                Err(e) => {
                    warn!(
                        namespace = %owner,
                        error = %e,
                        "Skipping malformed ProjectSettings"
                    );
                    return None;
                }
            };
            let Some(namespace) = object.metadata.namespace else {
                debug!("Skipping ProjectSettings without a namespace");
                return None;
            };
            Some(ProjectSettings {
                namespace,
                github_installation: object.spec.and_then(|spec| spec.github_installation),
            })
        })
        .collect()
}

/// Decode the ConfigMap values, skipping entries that are not valid
/// installation records
fn parse_installations(data: &BTreeMap<String, String>) -> Vec<InstallationRecord> {
    data.iter()
        .filter_map(
            |(key, value)| match serde_json::from_str::<InstallationRecord>(value) {
                Ok(record) if record.installation_id > 0 => Some(record),
                Ok(_) => {
                    debug!(key = %key, "Skipping installation entry without a valid id");
                    None
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Skipping malformed installation entry");
                    None
                }
            },
        )
        .collect()
}

async fn read_token(path: &Path) -> Result<Zeroizing<String>, StoreError> {
    let raw = Zeroizing::new(tokio::fs::read_to_string(path).await.map_err(|e| {
        StoreError::Transport {
            message: format!("failed to read service account token {}: {e}", path.display()),
        }
    })?);
    Ok(Zeroizing::new(raw.trim().to_string()))
}

async fn check_status(
    response: reqwest::Response,
    resource: &str,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(StoreError::Forbidden),
        404 => Err(StoreError::NotFound {
            resource: resource.to_string(),
        }),
        code => {
            let message = response.text().await.unwrap_or_default();
            Err(StoreError::Api {
                status: code,
                message,
            })
        }
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Transport {
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "cluster_store_tests.rs"]
mod tests;
