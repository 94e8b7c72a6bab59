//! # Watch Loop
//!
//! Runs one kube-runtime `Controller` per managed kind until shutdown.

use crate::controller::reconciler::{reconcile_disposable, reconcile_request, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{DisposableRequest, Request};
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use kube::api::Api;
use kube::Resource;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the `Request` and `DisposableRequest` controllers
///
/// Marks the server ready once both are watching and returns after a
/// shutdown signal, when in-flight reconciliations have finished.
pub async fn run_watch_loop(reconciler: Arc<Reconciler>, server_state: Arc<ServerState>) {
    let requests: Api<Request> = Api::all(reconciler.client.clone());
    let disposables: Api<DisposableRequest> = Api::all(reconciler.client.clone());
    let concurrency =
        u16::try_from(reconciler.config.max_concurrent_reconciliations).unwrap_or(u16::MAX);

    let watch_span = tracing::span!(tracing::Level::INFO, "controller.watch", operation = "watch_loop");
    info!(concurrency, "Starting controller watch loop...");

    let request_controller = Controller::new(requests, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(
            reconcile_request,
            handle_reconciliation_error::<Request>,
            Arc::clone(&reconciler),
        )
        .for_each(|result| {
            log_result(Request::kind(&()).as_ref(), result.map(|(obj, _)| obj.name));
            futures::future::ready(())
        });

    let disposable_controller =
        Controller::new(disposables, watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .run(
                reconcile_disposable,
                handle_reconciliation_error::<DisposableRequest>,
                Arc::clone(&reconciler),
            )
            .for_each(|result| {
                log_result(DisposableRequest::kind(&()).as_ref(), result.map(|(obj, _)| obj.name));
                futures::future::ready(())
            });

    server_state.is_ready.store(true, Ordering::Relaxed);
    async {
        futures::join!(request_controller, disposable_controller);
    }
    .instrument(watch_span)
    .await;

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controller stopped gracefully");
}

fn log_result<E: std::fmt::Display>(kind: &str, result: Result<String, E>) {
    match result {
        Ok(name) => debug!(resource.kind = kind, resource.name = %name, "watch.event.success"),
        Err(e) => warn!(resource.kind = kind, "Controller stream error: {e}"),
    }
}
