//! # Webhook-Gateway Service
//!
//! Binary entry point for the Webhook-Gateway HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Wires the Kubernetes store, GitHub commenter and caches
//! - Starts the HTTP server from webhook-gateway-api

mod cluster_store;

use cluster_store::KubernetesStore;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_gateway_api::{
    config::LoggingConfig, start_server, AppState, ConfigError, ServiceConfig, ServiceError,
    WebhookHandler, WebhookHandlerComponents, WebhookMetrics,
};
use webhook_gateway_core::{
    github::StaticTokenManager, installation::InstallationPolicy, DeduplicationCache,
    GitHubCommenter, InstallationVerifier, KeywordDetector, NamespaceResolver, SessionCreator,
};

#[tokio::main]
async fn main() {
    let service_config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    init_tracing(&service_config.logging);
    info!("Starting Webhook-Gateway Service");

    if let Err(e) = run(service_config).await {
        error!(error = %e, "Service stopped with an error");
        std::process::exit(e.exit_code());
    }
}

/// Load configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. /etc/webhook-gateway/service.yaml
///  2. ./config/service.yaml
///  3. the path in `WG_CONFIG_FILE`
///  4. environment variables prefixed `WG__`, e.g. `WG__SERVER__PORT=9090`
///
/// Every field has a default, so only the webhook secret must be supplied.
/// It may also come from `webhooks.secret_file` or `WEBHOOK_SECRET`.
fn load_configuration() -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/webhook-gateway/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("WG_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    let mut service_config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix("WG").separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    service_config.webhooks.load_secret()?;
    service_config.validate()?;
    Ok(service_config)
}

/// `RUST_LOG` wins over `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: ServiceConfig) -> Result<(), ServiceError> {
    let webhooks = &config.webhooks;

    let secret = webhooks
        .secret
        .clone()
        .ok_or_else(|| ConfigError::Missing {
            key: "webhooks.secret".to_string(),
        })?;
    let keywords = KeywordDetector::new(&webhooks.keyword).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    let metrics = WebhookMetrics::new()
        .and_then(WebhookMetrics::with_process_metrics)
        .map_err(|e| startup_error("metrics", e))?;

    let store =
        Arc::new(KubernetesStore::new(&config.cluster).map_err(|e| startup_error("cluster", e))?);

    let token = config.github.resolve_token()?;
    if token.is_none() {
        warn!("No GitHub token configured; feedback comments will fail and only be logged");
    }
    let token_manager = Arc::new(StaticTokenManager::new(
        token.as_ref().map(|t| t.expose()).unwrap_or_default(),
    ));
    let commenter = GitHubCommenter::new(
        token_manager,
        &config.github.api_url,
        &config.github.user_agent,
        config.github.request_timeout(),
    )
    .map_err(|e| startup_error("github", e))?;

    if webhooks.installation_policy == InstallationPolicy::AnyInstallation {
        warn!(
            "installation_policy is any_installation: any GitHub App installation authorizes \
             every repository. Tenant isolation relies on ProjectSettings alone."
        );
    }

    let dedup =
        DeduplicationCache::with_sweeper(webhooks.dedup_ttl(), webhooks.dedup_sweep_interval());
    let installations = InstallationVerifier::with_sweeper(
        store.clone(),
        webhooks.installation_policy,
        webhooks.installation_cache_ttl(),
        webhooks.installation_sweep_interval(),
    );

    let handler = WebhookHandler::new(WebhookHandlerComponents {
        secret,
        max_body_size: webhooks.max_body_size,
        dedup: dedup.clone(),
        installations: installations.clone(),
        keywords,
        namespaces: NamespaceResolver::new(store.clone()),
        sessions: SessionCreator::new(store).with_timeout(webhooks.session_timeout()),
        commenter: Arc::new(commenter),
        metrics: Arc::new(metrics),
    });

    info!(
        host = %config.server.host,
        port = config.server.port,
        endpoint = %config.webhooks.endpoint_path,
        "Starting HTTP server"
    );

    let result = start_server(AppState::new(config, Arc::new(handler))).await;

    dedup.shutdown().await;
    installations.shutdown().await;
    info!("Background sweepers stopped");

    result
}

fn startup_error(component: &str, e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Startup {
        component: component.to_string(),
        message: e.to_string(),
    }
}
