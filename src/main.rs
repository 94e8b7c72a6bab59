//! # HTTP Resource Controller
//!
//! A Kubernetes controller that manages external resources through plain HTTP
//! calls.
//!
//! ## Overview
//!
//! 1. **Watching resources** - `Request` and `DisposableRequest` in all namespaces
//! 2. **Rendering requests** - URLs, bodies and headers come from query expressions
//!    over the spec and the last recorded response
//! 3. **Reconciling** - observe, then create, update or remove the external resource
//! 4. **Protecting secrets** - `{{name:namespace:key}}` placeholders are resolved
//!    only on the wire, and configured response fields are moved into Kubernetes
//!    Secrets before the response is recorded in status
//!
//! Metrics and probes are served on `METRICS_PORT` (`/metrics`, `/healthz`, `/readyz`).

use anyhow::Result;
use http_resource_controller::config::ControllerConfig;
use http_resource_controller::runtime::{initialize, run_watch_loop};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::from_env();
    let init = initialize(config).await?;

    run_watch_loop(init.reconciler, init.server_state).await;

    init.shutdown.cancel();
    if let Err(e) = init.server_handle.await {
        warn!("HTTP server task ended abnormally: {}", e);
    }
    info!("HTTP Resource Controller stopped");
    Ok(())
}
