//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, server startup,
//! Kubernetes client and reconciler context.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::query::JqEvaluator;
use crate::secrets::KubeSecretStore;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Everything the watch loop needs
#[derive(Debug)]
pub struct InitializationResult {
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub server_handle: JoinHandle<()>,
    /// Cancelled on SIGINT/SIGTERM
    pub shutdown: CancellationToken,
}

/// Set up tracing from `RUST_LOG` (default `http_resource_controller=info`)
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("http_resource_controller=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_logs() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when metrics cannot be registered, the HTTP server does not come
/// up, or no Kubernetes client can be built.
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Must run before any TLS connection is made
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    init_tracing(&config);
    info!("Starting HTTP Resource Controller v{}", env!("CARGO_PKG_VERSION"));
    if !provider_installed {
        debug!("rustls crypto provider was already installed");
    }

    observability::register_metrics()?;

    let shutdown = CancellationToken::new();
    let server_state = Arc::new(ServerState::default());

    let server_handle = {
        let state = Arc::clone(&server_state);
        let shutdown = shutdown.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle).await?;

    spawn_signal_handler(shutdown.clone(), Arc::clone(&server_state));

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        config,
        Arc::new(KubeSecretStore::new(client)),
        Arc::new(JqEvaluator),
        shutdown.clone(),
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        reconciler,
        server_state,
        server_handle,
        shutdown,
    })
}

/// Cancel `shutdown` and drop readiness on SIGINT/SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken, server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        server_state.is_ready.store(false, Ordering::Relaxed);
        shutdown.cancel();
    });
}

/// Wait for the HTTP server to bind its listener
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
