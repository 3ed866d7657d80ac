//! Auth Gateway
//!
//! Single-binary service that:
//! 1. Loads the token encryption key and OAuth client settings
//! 2. Redeems Google authorization codes (PKCE) or, in mock mode, returns
//!    fixed development tokens
//! 3. Encrypts every access and refresh token before it reaches storage
//! 4. Refreshes integration tokens on request

mod auth;
mod config;
mod error;
mod integrations;
mod metrics;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use credential_store::{CredentialVault, FileCredentialStore};
use google_oauth::{CodeExchanger, exchanger_from_config};
use metrics_exporter_prometheus::PrometheusHandle;
use token_cipher::{EncryptionKey, TokenCipher};
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, OAuthConfig};

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub vault: CredentialVault,
    pub exchanger: Arc<dyn CodeExchanger>,
    pub oauth: Arc<OAuthConfig>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` caps concurrently handled requests.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/auth/google", post(auth::profile_login))
        .route("/auth/google/authorize", get(auth::authorize))
        .route("/auth/google/callback", post(auth::login_callback))
        .route(
            "/integrations/google/calendar/callback",
            post(integrations::calendar_callback),
        )
        .route(
            "/integrations/{client_id}/{agent_id}/{kind}/refresh",
            post(integrations::refresh),
        )
        .route_layer(middleware::from_fn(track_request))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting auth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // A bad key is fatal here rather than on the first request.
    let key_hex = config
        .storage
        .encryption_key
        .as_ref()
        .context("token encryption key missing")?;
    let key = EncryptionKey::from_hex(key_hex.expose()).context("invalid token encryption key")?;
    let cipher = Arc::new(TokenCipher::new(&key).context("invalid token encryption key")?);

    let exchanger =
        exchanger_from_config(config.exchanger_config()).context("failed to build exchanger")?;

    let store = FileCredentialStore::load(config.storage.credentials_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to load credentials from {}",
                config.storage.credentials_path.display()
            )
        })?;

    info!(
        listen_addr = %config.server.listen_addr,
        oauth_mode = exchanger.mode().as_str(),
        key_bits = cipher.key_size().bits(),
        credentials_path = %config.storage.credentials_path.display(),
        "configuration loaded"
    );

    let state = AppState {
        vault: CredentialVault::new(cipher, Arc::new(store)),
        exchanger,
        oauth: Arc::new(config.oauth.clone()),
        prometheus,
        started_at: Instant::now(),
    };

    let app = build_router(state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Tag each request with an id, log its outcome and record it in Prometheus
/// under the matched route template.
async fn track_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        route = %route
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let status = response.status().as_u16();
    let elapsed = started.elapsed();

    metrics::record_request(&route, status, elapsed.as_secs_f64());
    span.in_scope(|| {
        info!(
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "request completed"
        )
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Health endpoint: 200 with the oauth mode and credential count, 503 when
/// the credential store cannot be read.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let mode = state.exchanger.mode().as_str();

    let (status_code, body) = match state.vault.store().keys().await {
        Ok(keys) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "oauth_mode": mode,
                "credentials": keys.len(),
                "uptime_seconds": uptime,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "credential store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "degraded",
                    "oauth_mode": mode,
                    "uptime_seconds": uptime,
                }),
            )
        }
    };

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
