//! # Reconciliation Logic
//!
//! Per-secret state machine:
//!
//! | State                          | Action                                           |
//! |--------------------------------|--------------------------------------------------|
//! | absent                         | nothing                                          |
//! | active, deletion watch on      | register finalizer, then add content             |
//! | active, deletion watch off     | add content                                      |
//! | deleting, deletion watch off   | nothing (no finalizer was ever added)            |
//! | deleting, deletion watch on    | remove content, then retire the finalizer        |
//!
//! Adding and removing both run extract, read, merge or subtract, write and
//! notify in sequence. Retryable failures propagate to the error policy;
//! everything else is logged and the pass completes.

use super::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::controller::file::{Change, WriteOutcome};
use crate::controller::filter::EventKind;
use crate::controller::record::ObjectRecord;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Entry point for the controller: filters the event, reconciles, and clears
/// the backoff of the secret on success. Errors go to the error policy.
pub async fn reconcile(secret: Arc<Secret>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let record = ObjectRecord::from(secret.as_ref());
    let kind = if record.deleting {
        EventKind::Delete
    } else {
        EventKind::Update
    };
    if !ctx.filter.should_process(kind, &record) {
        return Ok(Action::await_change());
    }

    ctx.reconcile_secret(&record.namespace, &record.name).await?;
    ctx.reset_backoff(&record.key());
    Ok(Action::await_change())
}

impl Reconciler {
    /// One reconcile pass for the secret `namespace/name`, read fresh from the store.
    pub async fn reconcile_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!("reconcile", namespace = %namespace, name = %name);
        self.reconcile_inner(namespace, name).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let Some(record) = self.store.fetch(namespace, name).await? else {
            debug!("Secret not found, nothing to do");
            return Ok(ReconcileOutcome::Absent);
        };

        if record.deleting {
            if !self.deletion_watch {
                debug!("Ignoring deletion, deletion watch is disabled");
                return Ok(ReconcileOutcome::DeletionIgnored);
            }
            return self.clean_up(&record).await;
        }

        if self.deletion_watch {
            self.register_finalizer(&record).await?;
        }

        info!("Adding content for secret");
        match self.run(&record, Change::Add).await {
            Ok(outcome) => Ok(ReconcileOutcome::Applied(outcome)),
            Err(e) => self.abandon_or_retry(e),
        }
    }

    async fn clean_up(&self, record: &ObjectRecord) -> Result<ReconcileOutcome, ReconcilerError> {
        info!("Removing content for secret");
        let outcome = match self.run(record, Change::Remove).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                // Retrying cannot help, so holding the finalizer would only block deletion
                error!(error = %e, "Content removal failed permanently, releasing finalizer anyway");
                WriteOutcome::Unchanged
            }
        };
        self.retire_finalizer(record).await?;
        Ok(ReconcileOutcome::Cleaned(outcome))
    }

    /// Extract, merge or subtract, write, then notify.
    async fn run(&self, record: &ObjectRecord, change: Change) -> Result<WriteOutcome, ReconcilerError> {
        let content = self.extractor.extract(record)?;
        let path = self.materializer.resolve_target(record)?;

        let lock = self.path_lock(&path);
        let applied = {
            let _guard = lock.lock().await;
            self.materializer.apply(&path, change, &content)
        };
        self.release_path_lock(&path, lock);
        let outcome = applied?;
        debug!(path = %path.display(), ?outcome, ?change, "Target updated");

        self.notify(record).await?;
        Ok(outcome)
    }

    /// Terminal callback failures are logged; the files are already correct.
    async fn notify(&self, record: &ObjectRecord) -> Result<(), ReconcilerError> {
        match self.notifier.notify(record).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => Err(e.into()),
            Err(e) => {
                error!(error = %e, "Callback failed permanently, not retrying");
                Ok(())
            }
        }
    }

    async fn register_finalizer(&self, record: &ObjectRecord) -> Result<(), ReconcilerError> {
        if let Some(finalizers) = self.finalizer.ensure(&record.finalizers) {
            info!(prefix = %self.finalizer.prefix(), "Adding finalizer");
            self.store.patch_finalizers(record, finalizers).await?;
        }
        Ok(())
    }

    async fn retire_finalizer(&self, record: &ObjectRecord) -> Result<(), ReconcilerError> {
        if !self.finalizer.is_registered(&record.finalizers) {
            debug!("No finalizer of this instance present");
            return Ok(());
        }
        info!(prefix = %self.finalizer.prefix(), "Removing finalizer");
        let finalizers = self.finalizer.decrement(&record.finalizers);
        self.store.patch_finalizers(record, finalizers).await?;
        Ok(())
    }

    fn abandon_or_retry(&self, e: ReconcilerError) -> Result<ReconcileOutcome, ReconcilerError> {
        if e.is_retryable() {
            warn!(error = %e, "Reconcile failed, will retry");
            return Err(e);
        }
        error!(error = %e, "Reconcile failed permanently, not retrying");
        Ok(ReconcileOutcome::Abandoned(e.to_string()))
    }
}
