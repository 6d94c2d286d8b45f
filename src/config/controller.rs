//! # Controller Configuration
//!
//! Process-level settings: logging, backoff and instance identity.

use super::Env;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE); `RUST_LOG` takes precedence
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Fibonacci backoff starting value (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// Attempts to build the Kubernetes client before giving up
    pub kube_connect_attempts: u32,
    /// Delay before the watch stream is restarted after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Name of this instance, usually the pod name; scopes the finalizer
    pub pod_name: String,
    /// Overrides the derived finalizer prefix when non-empty
    pub finalizer_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::load(&Env::empty())
    }
}

impl ControllerConfig {
    pub(crate) fn load(env: &Env<'_>) -> Self {
        use crate::constants::*;
        Self {
            log_level: env.str_or("LOG_LEVEL", "INFO"),
            log_format: env.str_or("LOG_FORMAT", "json"),
            backoff_min_secs: env.or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env.or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            kube_connect_attempts: env
                .or_default("KUBE_CONNECT_ATTEMPTS", DEFAULT_KUBE_CONNECT_ATTEMPTS),
            watch_restart_delay_secs: env.or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            pod_name: env.str_or("POD_NAME", ""),
            finalizer_prefix: env.str_or("FINALIZER_PREFIX", ""),
        }
    }

    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    pub fn kube_connect_retry_delay(&self) -> Duration {
        Duration::from_secs(crate::constants::KUBE_CONNECT_RETRY_DELAY_SECS)
    }
}
