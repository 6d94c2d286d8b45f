//! # Runtime
//!
//! Process lifecycle: startup, the watch loop, retry policy and shutdown.
//!
//! - `initialization`: TLS, logging, configuration and client setup
//! - `watch_loop`: drives the controller over the selected secrets
//! - `error_policy`: per-secret Fibonacci backoff after failed reconciles
//! - `shutdown`: releases this instance's finalizers before exit

pub mod error_policy;
pub mod initialization;
pub mod shutdown;
pub mod watch_loop;
