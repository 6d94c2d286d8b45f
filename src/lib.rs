//! Secret File Provider Library
//!
//! A sidecar controller that watches Kubernetes secrets and projects their
//! content into files on a shared volume, optionally notifying a local
//! process over HTTP after every change.
//!
//! The reconcile path is independent of the cluster: it reads secrets through
//! [`controller::reconciler::SecretStore`], so it can be exercised with an
//! in-memory store.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod runtime;
