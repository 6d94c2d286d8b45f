//! # Reconciler
//!
//! Keeps target files in step with the secrets selected by this instance.
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the secret fresh from the store
//! 2. Register (or retire) this instance's finalizer when deletion watch is on
//! 3. Extract the secret's content and resolve its target path
//! 4. Merge the content into, or subtract it from, what is on disk
//! 5. Notify the callback receiver

pub mod reconcile;
pub mod store;
pub mod types;

// Re-export public API
pub use reconcile::reconcile;
pub use store::{KubeSecretStore, SecretStore, StoreError};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
