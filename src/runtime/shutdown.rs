//! # Shutdown
//!
//! Releases this instance's finalizers on every matching secret so that a
//! stopped consumer never blocks deletions.

use crate::controller::reconciler::{Reconciler, StoreError};
use tracing::{debug, error, info, warn};

/// Summary of a finalizer release sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub released: usize,
    pub failed: usize,
}

/// Decrement this instance's finalizer on all matching secrets.
///
/// Failures are logged per secret and do not stop the sweep. Does nothing
/// when deletion watch is disabled, since no finalizer was ever added.
pub async fn release_finalizers(ctx: &Reconciler) -> Result<ReleaseSummary, StoreError> {
    let mut summary = ReleaseSummary::default();
    if !ctx.deletion_watch {
        return Ok(summary);
    }

    info!(prefix = %ctx.finalizer.prefix(), "Releasing finalizers before shutdown");
    let records = ctx
        .store
        .list(ctx.filter.single_namespace(), ctx.filter.label_selector())
        .await?;

    for record in records.iter().filter(|record| ctx.filter.matches(record)) {
        if !ctx.finalizer.is_registered(&record.finalizers) {
            continue;
        }
        let finalizers = ctx.finalizer.decrement(&record.finalizers);
        match ctx.store.patch_finalizers(record, finalizers).await {
            Ok(()) => {
                debug!(secret = %record.key(), "Released finalizer");
                summary.released += 1;
            }
            Err(e) => {
                warn!(secret = %record.key(), error = %e, "Failed to release finalizer");
                summary.failed += 1;
            }
        }
    }

    if summary.failed > 0 {
        error!(
            released = summary.released,
            failed = summary.failed,
            "Some finalizers could not be released"
        );
    } else {
        info!(released = summary.released, "Finalizers released");
    }
    Ok(summary)
}
