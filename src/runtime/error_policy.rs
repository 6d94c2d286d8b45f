//! # Error Policy
//!
//! Requeue failed reconciles with per-secret Fibonacci backoff.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Backoff state is kept per secret so one failing secret does not slow the others.
pub fn handle_reconciliation_error(
    obj: Arc<Secret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::error_span!(
        "controller.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
    );
    let _error_guard = error_span.enter();

    error!(error = %error, "Reconciliation failed");

    let (backoff_seconds, error_count) = ctx.next_backoff(&format!("{namespace}/{name}"));
    let next_retry = i64::try_from(backoff_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|delay| chrono::Utc::now().checked_add_signed(delay))
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();
    info!(
        backoff_seconds,
        error_count,
        next_retry = %next_retry,
        "Retrying with Fibonacci backoff"
    );

    Action::requeue(Duration::from_secs(backoff_seconds))
}
