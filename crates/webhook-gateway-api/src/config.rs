//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use webhook_gateway_core::installation::{
    InstallationPolicy, DEFAULT_INSTALLATION_CACHE_TTL, DEFAULT_INSTALLATION_SWEEP_INTERVAL,
};
use webhook_gateway_core::{
    dedup::{DEFAULT_DEDUP_SWEEP_INTERVAL, DEFAULT_DEDUP_TTL},
    github::{DEFAULT_COMMENT_TIMEOUT, DEFAULT_GITHUB_API_URL, DEFAULT_USER_AGENT},
    keywords::DEFAULT_KEYWORD,
    session::DEFAULT_SESSION_CREATION_TIMEOUT,
    webhook::DEFAULT_MAX_PAYLOAD_SIZE,
};
use zeroize::Zeroizing;

/// Legacy environment variable carrying the webhook secret
pub const WEBHOOK_SECRET_ENV: &str = "WEBHOOK_SECRET";

// ============================================================================
// Secrets
// ============================================================================

/// String secret that is wiped on drop and redacted in `Debug`
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// Service configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook pipeline settings
    pub webhooks: WebhookConfig,

    /// GitHub API settings for feedback comments
    pub github: GitHubConfig,

    /// Cluster API settings
    pub cluster: ClusterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    ///
    /// Run after [`WebhookConfig::load_secret`] so that file and environment
    /// sources have been applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must not be 0".to_string(),
            });
        }

        if !self.webhooks.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhooks.endpoint_path must start with '/', got '{}'",
                    self.webhooks.endpoint_path
                ),
            });
        }

        if self.webhooks.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "webhooks.max_body_size must be greater than 0".to_string(),
            });
        }

        if self.webhooks.keyword.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "webhooks.keyword must not be empty".to_string(),
            });
        }

        match &self.webhooks.secret {
            None => {
                return Err(ConfigError::Missing {
                    key: "webhooks.secret".to_string(),
                })
            }
            Some(secret) if secret.is_empty() => {
                return Err(ConfigError::Invalid {
                    message: "webhooks.secret must not be empty".to_string(),
                })
            }
            Some(_) => {}
        }

        if self.webhooks.session_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "webhooks.session_timeout_seconds must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
            enable_compression: true,
        }
    }
}

/// Webhook pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Shared HMAC secret configured on the GitHub App
    pub secret: Option<SecretString>,

    /// File holding the secret, e.g. a mounted Kubernetes secret
    pub secret_file: Option<PathBuf>,

    /// Mention that activates a session
    pub keyword: String,

    pub dedup_ttl_seconds: u64,
    pub dedup_sweep_interval_seconds: u64,

    pub installation_policy: InstallationPolicy,
    pub installation_cache_ttl_seconds: u64,
    pub installation_sweep_interval_seconds: u64,

    /// Bound on the synchronous session create call
    pub session_timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhook".to_string(),
            max_body_size: DEFAULT_MAX_PAYLOAD_SIZE,
            secret: None,
            secret_file: None,
            keyword: DEFAULT_KEYWORD.to_string(),
            dedup_ttl_seconds: DEFAULT_DEDUP_TTL.as_secs(),
            dedup_sweep_interval_seconds: DEFAULT_DEDUP_SWEEP_INTERVAL.as_secs(),
            installation_policy: InstallationPolicy::default(),
            installation_cache_ttl_seconds: DEFAULT_INSTALLATION_CACHE_TTL.as_secs(),
            installation_sweep_interval_seconds: DEFAULT_INSTALLATION_SWEEP_INTERVAL.as_secs(),
            session_timeout_seconds: DEFAULT_SESSION_CREATION_TIMEOUT.as_secs(),
        }
    }
}

impl WebhookConfig {
    /// Fill in `secret` from the secret file or the `WEBHOOK_SECRET`
    /// environment variable when it is not set directly.
    pub fn load_secret(&mut self) -> Result<(), ConfigError> {
        self.load_secret_with(|key| std::env::var(key).ok())
    }

    /// [`Self::load_secret`] with an explicit environment lookup
    pub fn load_secret_with<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.secret.as_ref().is_some_and(|s| !s.is_empty()) {
            return Ok(());
        }

        if let Some(path) = &self.secret_file {
            self.secret = Some(read_secret_file(path)?);
            return Ok(());
        }

        if let Some(value) = env(WEBHOOK_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.secret = Some(SecretString::new(value));
        }
        Ok(())
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }

    pub fn dedup_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.dedup_sweep_interval_seconds.max(1))
    }

    pub fn installation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.installation_cache_ttl_seconds)
    }

    pub fn installation_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.installation_sweep_interval_seconds.max(1))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_seconds)
    }
}

/// Read a secret from `path`, trimming surrounding whitespace
pub fn read_secret_file(path: &Path) -> Result<SecretString, ConfigError> {
    let raw = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
        ConfigError::SecretFile {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?);
    Ok(SecretString::new(raw.trim()))
}

/// GitHub API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL
    pub api_url: String,

    pub user_agent: String,

    /// Timeout for one comment request in seconds
    pub request_timeout_seconds: u64,

    /// Installation token used for feedback comments
    pub token: Option<SecretString>,

    /// File holding the installation token
    pub token_file: Option<PathBuf>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_seconds: DEFAULT_COMMENT_TIMEOUT.as_secs(),
            token: None,
            token_file: None,
        }
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Token from `token`, else from `token_file`. `None` disables comments
    /// in practice: every post fails with a token error that is only logged.
    pub fn resolve_token(&self) -> Result<Option<SecretString>, ConfigError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Some(token.clone()));
        }
        self.token_file
            .as_deref()
            .map(read_secret_file)
            .transpose()
    }
}

/// Cluster API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubernetes API server URL
    pub api_url: String,

    /// Service account bearer token file
    pub token_file: PathBuf,

    /// PEM bundle used to verify the API server certificate
    pub ca_bundle_file: Option<PathBuf>,

    /// Namespace holding the installations ConfigMap
    pub installations_namespace: String,

    /// Name of the installations ConfigMap
    pub installations_config_map: String,

    pub request_timeout_seconds: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://kubernetes.default.svc".to_string(),
            token_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            ca_bundle_file: Some(PathBuf::from(
                "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt",
            )),
            installations_namespace: "ambient-code".to_string(),
            installations_config_map: "github-app-installations".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl ClusterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
