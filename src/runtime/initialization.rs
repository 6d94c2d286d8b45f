//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, configuration and
//! Kubernetes client setup.

use crate::config::Config;
use crate::controller::reconciler::{KubeSecretStore, Reconciler};
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the watch loop needs.
pub struct InitializationResult {
    pub client: Client,
    pub config: Config,
    pub reconciler: Arc<Reconciler>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// Configuration errors are returned here and end the process; nothing
/// after startup is allowed to do that.
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let config = Config::from_env();
    observability::init_tracing(&config.controller)?;

    info!("Starting Secret File Provider v{}", env!("CARGO_PKG_VERSION"));
    config.validate().context("Invalid configuration")?;
    info!(
        file_name_pattern = %config.secrets.file_name_pattern,
        per_key_files = config.secrets.per_key_files,
        deletion_watch = config.secrets.deletion_watch,
        callback = !config.callback.url.is_empty(),
        "Configuration loaded"
    );

    let client = connect(&config).await?;
    let store = Arc::new(KubeSecretStore::new(client.clone()));
    let reconciler = Arc::new(
        Reconciler::new(&config, store).context("Failed to build reconciler")?,
    );
    info!(finalizer_prefix = %reconciler.finalizer.prefix(), "Controller initialized");

    Ok(InitializationResult {
        client,
        config,
        reconciler,
    })
}

/// Sidecar networking may come up after the process, so client creation is retried.
async fn connect(config: &Config) -> Result<Client> {
    let attempts = config.controller.kube_connect_attempts.max(1);
    let delay = config.controller.kube_connect_retry_delay();

    let mut attempt = 1;
    loop {
        match Client::try_default().await {
            Ok(client) => return Ok(client),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "Failed to create Kubernetes client, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create Kubernetes client after {attempts} attempts")
                });
            }
        }
    }
}
