//! Nest Heating Boost
//!
//! Single-binary web service that:
//! 1. Walks the browser through Google's Device Access consent flow
//! 2. Keeps the refresh token in a signed cookie, not on the server
//! 3. Lists thermostats and starts timed heating boosts
//! 4. Restores the previous setpoint afterwards unless it was changed meanwhile

mod config;
mod error;
mod html;
mod metrics;
mod routes;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use boost::Orchestrator;
use cookie_state::CookieCodec;
use metrics_exporter_prometheus::PrometheusHandle;
use nest_auth::TokenClient;
use nest_device::SdmClient;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Time allowed for in-flight requests after a shutdown signal.
/// Running boosts are not waited for.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Values handlers need from the config, fixed at startup.
#[derive(Debug)]
struct Settings {
    project_id: String,
    client_id: String,
    authorize_base_url: String,
    redirect_url: Option<String>,
    secure_cookies: bool,
}

/// Counters reported on /health
#[derive(Debug, Clone)]
struct ServiceStats {
    started_at: Instant,
    boosts_started: Arc<AtomicU64>,
}

impl ServiceStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            boosts_started: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    codec: Arc<CookieCodec>,
    tokens: Arc<TokenClient>,
    devices: Arc<SdmClient>,
    orchestrator: Orchestrator,
    stats: ServiceStats,
    prometheus: PrometheusHandle,
}

impl AppState {
    fn from_config(config: &Config, prometheus: PrometheusHandle) -> Result<Self> {
        let client_secret = config
            .nest
            .client_secret
            .clone()
            .context("client secret not resolved")?;
        let hash_key = config
            .cookies
            .hash_key
            .as_ref()
            .context("hash key not resolved")?;
        let codec = CookieCodec::new(
            hash_key.expose().as_bytes(),
            config
                .cookies
                .block_key
                .as_ref()
                .map(|k| k.expose().as_bytes()),
        )
        .context("invalid cookie keys")?;
        if !codec.encrypts() {
            warn!("BLOCK_KEY not set; session cookies are signed but not encrypted");
        }

        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenClient::new(
            http.clone(),
            &config.nest.token_endpoint,
            &config.nest.client_id,
            client_secret,
        ));
        let devices = Arc::new(SdmClient::new(
            http,
            &config.nest.api_base_url,
            &config.nest.project_id,
        ));
        let orchestrator = Orchestrator::new(tokens.clone(), devices.clone());

        Ok(Self {
            settings: Arc::new(Settings {
                project_id: config.nest.project_id.clone(),
                client_id: config.nest.client_id.clone(),
                authorize_base_url: config.nest.authorize_base_url.clone(),
                redirect_url: config.server.redirect_url.clone(),
                secure_cookies: config.secure_cookies(),
            }),
            codec: Arc::new(codec),
            tokens,
            devices,
            orchestrator,
            stats: ServiceStats::new(),
            prometheus,
        })
    }
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` caps concurrently handled requests.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(routes::home))
        .route("/authorize", get(routes::authorize))
        .route("/code", get(routes::code))
        .route("/boost", post(routes::boost))
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/metrics", get(routes::metrics))
        .layer(axum::middleware::from_fn(metrics::track_requests))
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

    info!("starting nest-heating-boost");

    // Install before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

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

    info!(
        listen_addr = %config.server.listen_addr,
        project_id = %config.nest.project_id,
        secure_cookies = config.secure_cookies(),
        encrypted_cookies = config.cookies.block_key.is_some(),
        "configuration loaded"
    );

    let listen_addr = config.server.listen_addr;
    let app_state = AppState::from_config(&config, prometheus_handle)?;
    let app = build_router(app_state, config.server.max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start.
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

    info!("shutdown complete; running boosts are abandoned");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
