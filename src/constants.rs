//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Base of the finalizer prefix; the instance name and a trailing `-` follow.
pub const DEFAULT_FINALIZER_BASE: &str = "secret-file-provider.io/";

/// Prefix used when no instance name is known
pub const DEFAULT_FINALIZER_PREFIX: &str = "secret-file-provider.io/finalizer-";

/// Kubernetes limit for a finalizer name
pub const MAX_FINALIZER_LENGTH: usize = 63;

/// Characters reserved for the counter suffix of a finalizer tag
pub const FINALIZER_COUNTER_WIDTH: usize = 3;

/// Default HTTP method for the callback
pub const DEFAULT_CALLBACK_METHOD: &str = "GET";

/// Default content type of the callback request body
pub const DEFAULT_CALLBACK_CONTENT_TYPE: &str = "application/json";

/// Default callback request timeout (seconds)
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 10;

/// Default backoff minimum for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default backoff maximum for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default number of attempts to build the Kubernetes client at startup
pub const DEFAULT_KUBE_CONNECT_ATTEMPTS: u32 = 30;

/// Delay between Kubernetes client connection attempts (seconds)
pub const KUBE_CONNECT_RETRY_DELAY_SECS: u64 = 1;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 1;

/// File mode for materialized files
pub const TARGET_FILE_MODE: u32 = 0o644;
