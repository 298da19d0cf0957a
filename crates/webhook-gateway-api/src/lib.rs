//! # Webhook-Gateway HTTP Service
//!
//! HTTP server that receives GitHub webhooks and turns activating comments
//! into agentic sessions.
//!
//! This service provides:
//! - The GitHub webhook endpoint (`POST /webhook` by default)
//! - Health and readiness endpoints
//! - A Prometheus metrics endpoint

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

pub mod config;
pub mod errors;
pub mod handler;
pub mod metrics;
pub mod responses;
pub mod validator;

pub use config::{SecretString, ServiceConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use handler::{WebhookHandler, WebhookHandlerComponents};
pub use metrics::WebhookMetrics;
pub use responses::{ErrorResponse, HealthResponse, ReadinessResponse, WebhookResponse};

/// Header carrying the per-request correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Webhook pipeline
    pub handler: Arc<WebhookHandler>,
}

impl AppState {
    pub fn new(config: ServiceConfig, handler: Arc<WebhookHandler>) -> Self {
        Self {
            config: Arc::new(config),
            handler,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
///
/// The webhook route accepts every method so that non-POST requests get the
/// pipeline's own 400 response rather than a bare 405.
pub fn create_router(state: AppState) -> Router {
    let webhook_routes =
        Router::new().route(&state.config.webhooks.endpoint_path, any(handle_webhook));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(middleware::from_fn(request_logging_middleware));

    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if state.config.server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server and run until SIGINT or SIGTERM.
///
/// In-flight requests get `server.shutdown_timeout_seconds` to finish after
/// the signal; whatever is still running then is dropped.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: format!("{host}:{port}"),
            message: e.to_string(),
        })?;

    info!(address = %format!("{host}:{port}"), "Starting HTTP server");

    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Initiating graceful shutdown"
            );
            let _ = signalled_tx.send(true);
        })
        .into_future();

    let drain_deadline = async move {
        let signalled = signalled_rx.wait_for(|signalled| *signalled).await.is_ok();
        if !signalled {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle GitHub webhook requests
async fn handle_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    state
        .handler
        .handle(&method, &headers, body)
        .await
        .map(Json)
}

/// Liveness check
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check for Kubernetes
#[instrument(skip_all)]
async fn handle_readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: true,
        timestamp: chrono::Utc::now(),
        deduplication_cache_size: state.handler.deduplication_cache().size(),
        installation_cache_size: state.handler.installation_verifier().cache_size(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.handler.metrics().encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Echoes the caller's `x-correlation-id` or generates one, and logs the
/// completed request at a level that follows the status code.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
