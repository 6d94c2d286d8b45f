//! # Secret File Provider
//!
//! Projects the content of selected Kubernetes secrets into files and keeps
//! them in sync.
//!
//! ## Overview
//!
//! 1. **Watches secrets** selected by label or name, optionally per namespace
//! 2. **Extracts content** with an optional content selector and key transform
//! 3. **Merges it into target files**, one YAML document or one file per key
//! 4. **Notifies a callback** after every change
//! 5. **Cleans up on deletion** when deletion watch is on, guarded by a finalizer

use anyhow::Result;
use secret_file_provider::runtime::{initialization::initialize, shutdown, watch_loop};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    watch_loop::run_watch_loop(
        init.client.clone(),
        init.reconciler.clone(),
        init.config.controller.watch_restart_delay_duration(),
    )
    .await?;

    if let Err(e) = shutdown::release_finalizers(&init.reconciler).await {
        error!(error = %e, "Failed to list secrets for finalizer release");
    }
    Ok(())
}
