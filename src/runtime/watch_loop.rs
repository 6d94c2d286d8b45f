//! # Watch Loop
//!
//! Watches the selected secrets and triggers reconciliation when they change.
//! The label selector and a single configured namespace are pushed down to
//! the API server; everything else is filtered in the reconciler.

use crate::controller::filter::SecretFilter;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal arrives.
///
/// The controller stream is restarted if it ends for any other reason.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    restart_delay: Duration,
) -> Result<(), anyhow::Error> {
    let (trigger, shutdown) = ShutdownSignal::channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
        trigger.send_replace(true);
    });

    loop {
        // Check if we should shut down before starting/restarting watch
        if shutdown.is_requested() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let secrets = secrets_api(&client, &reconciler.filter);
        let watch_config = watcher_config(&reconciler.filter);
        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");

        info!("Starting controller watch loop...");
        Controller::new(secrets, watch_config)
            .graceful_shutdown_on(shutdown.clone().requested())
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(|result| {
                match result {
                    Ok((object, action)) => {
                        debug!(object = %object, ?action, "watch.event.reconciled");
                    }
                    Err(e) => warn!(error = %e, "watch.event.failed"),
                }
                futures::future::ready(())
            })
            .instrument(watch_span)
            .await;

        if shutdown.is_requested() {
            break;
        }
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::select! {
            () = tokio::time::sleep(restart_delay) => {}
            () = shutdown.clone().requested() => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Shutdown flag shared by the signal handler and every controller run.
#[derive(Debug, Clone)]
struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    fn channel() -> (watch::Sender<bool>, Self) {
        let (sender, receiver) = watch::channel(false);
        (sender, Self { receiver })
    }

    fn is_requested(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes once shutdown is requested, or right away if it already was.
    async fn requested(mut self) {
        // A dropped sender means nobody can ask for shutdown any more; stop as well
        let _ = self.receiver.wait_for(|requested| *requested).await;
    }
}

fn secrets_api(client: &Client, filter: &SecretFilter) -> Api<Secret> {
    match filter.single_namespace() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

fn watcher_config(filter: &SecretFilter) -> watcher::Config {
    let config = watcher::Config::default();
    match filter.label_selector() {
        Some(selector) => config.labels(selector),
        None => config,
    }
}

/// SIGTERM from the kubelet or SIGINT from a terminal.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = terminate.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM, only handling SIGINT");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_reaches_running_and_later_waiters() {
        let (trigger, shutdown) = ShutdownSignal::channel();
        let running = tokio::spawn(shutdown.clone().requested());
        assert!(!shutdown.is_requested());

        trigger.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_requested());

        // A controller started after the signal stops immediately
        tokio::time::timeout(Duration::from_secs(1), shutdown.clone().requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsignalled_shutdown_stays_pending() {
        let (_trigger, shutdown) = ShutdownSignal::channel();
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.clone().requested()).await;
        assert!(waited.is_err());
        assert!(!shutdown.is_requested());
    }
}
