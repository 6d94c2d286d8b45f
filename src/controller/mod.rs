//! # Controller
//!
//! Core controller modules for the secret file provider.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `callback`: HTTP notification after content changes
//! - `content`: content trees, extraction, merge and key transforms
//! - `file`: projection of content trees onto the file system
//! - `filter`: event filtering by selector, namespace and event kind
//! - `finalizer`: reference-counted finalizer tags
//! - `labels`: label selector parsing and matching
//! - `record`: local snapshot of a watched secret
//! - `reconciler`: the per-secret state machine
//! - `template`: text templates rendered against a secret

pub mod backoff;
pub mod callback;
pub mod content;
pub mod file;
pub mod filter;
pub mod finalizer;
pub mod labels;
pub mod record;
pub mod reconciler;
pub mod template;
