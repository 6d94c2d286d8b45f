//! # Types
//!
//! Core types for the reconciler.

use super::store::{SecretStore, StoreError};
use crate::config::{Config, ConfigError};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::callback::{CallbackError, CallbackNotifier};
use crate::controller::content::{ContentExtractor, ExtractError};
use crate::controller::file::{FileError, FileMaterializer, WriteOutcome};
use crate::controller::filter::SecretFilter;
use crate::controller::finalizer::FinalizerCoordinator;
use crate::controller::template::TemplateError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to extract content: {0}")]
    Extract(#[from] ExtractError),

    #[error("failed to resolve target path: {0}")]
    TargetPath(#[from] TemplateError),

    #[error("failed to update content: {0}")]
    File(#[from] FileError),

    #[error("failed to run callback: {0}")]
    Callback(#[from] CallbackError),

    #[error("failed to access secret: {0}")]
    Store(#[from] StoreError),
}

impl ReconcilerError {
    /// Whether another attempt could succeed. Non-retryable failures are
    /// logged and the reconcile completes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Extract(e) => e.is_retryable(),
            Self::TargetPath(_) => true,
            Self::File(e) => e.is_retryable(),
            Self::Callback(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
        }
    }
}

/// What one reconcile pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The secret no longer exists
    Absent,
    /// The secret is being deleted but deletion watch is off
    DeletionIgnored,
    /// Content was merged into the target
    Applied(WriteOutcome),
    /// Content was removed from the target and the finalizer retired
    Cleaned(WriteOutcome),
    /// A non-retryable failure was logged; nothing more will be attempted
    Abandoned(String),
}

/// Backoff state for a specific secret
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconcile context. Built once at startup from the validated
/// configuration and handed to every reconcile.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn SecretStore>,
    pub filter: SecretFilter,
    pub extractor: ContentExtractor,
    pub materializer: FileMaterializer,
    pub notifier: CallbackNotifier,
    pub finalizer: FinalizerCoordinator,
    pub deletion_watch: bool,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    // Backoff state per secret (namespace/name), updated by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    // One lock per target path; secrets sharing a file take turns
    pub path_locks: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("filter", &self.filter)
            .field("materializer", &self.materializer)
            .field("finalizer", &self.finalizer)
            .field("deletion_watch", &self.deletion_watch)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(config: &Config, store: Arc<dyn SecretStore>) -> Result<Self, ConfigError> {
        let secrets = &config.secrets;
        let extractor = ContentExtractor::new(
            &secrets.content_selector,
            &secrets.property_pattern,
            secrets.key_transform()?,
        )?;

        let finalizer = match config.controller.finalizer_prefix.trim() {
            "" => FinalizerCoordinator::for_instance(&config.controller.pod_name),
            prefix => FinalizerCoordinator::new(prefix),
        };

        Ok(Self {
            store,
            filter: SecretFilter::from_config(secrets)?,
            extractor,
            materializer: FileMaterializer::from_config(secrets)?,
            notifier: CallbackNotifier::new(&config.callback)?,
            finalizer,
            deletion_watch: secrets.deletion_watch,
            backoff_min_secs: config.controller.backoff_min_secs,
            backoff_max_secs: config.controller.backoff_max_secs,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            path_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Get or create the lock guarding one target path
    pub fn path_lock(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .path_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Hand back a lock from [`Self::path_lock`]; the entry is dropped once no
    /// other reconcile holds or waits on it.
    pub fn release_path_lock(&self, path: &Path, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self
            .path_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(path).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(path);
        }
    }

    /// Next retry delay for a failed secret, in seconds, and its error count.
    pub fn next_backoff(&self, key: &str) -> (u64, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    }

    pub fn reset_backoff(&self, key: &str) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states.remove(key);
    }
}
