//! Common test utilities for integration tests
//!
//! Provides an in-memory `SecretStore` standing in for the cluster, a mock
//! callback receiver, and configuration and secret fixtures.

#![allow(dead_code, reason = "each test binary uses a different subset")]

pub mod receiver;

use async_trait::async_trait;
use secret_file_provider::config::Config;
use secret_file_provider::controller::labels::LabelSelector;
use secret_file_provider::controller::reconciler::{Reconciler, SecretStore, StoreError};
use secret_file_provider::controller::record::ObjectRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FINALIZER_PREFIX: &str = "test.io/finalizer-";

/// Secrets kept in memory. Behaves like the API server where it matters:
/// a deleting secret disappears once its last finalizer is removed.
#[derive(Debug, Default)]
pub struct FakeSecretStore {
    secrets: Mutex<HashMap<String, ObjectRecord>>,
    patches: AtomicUsize,
}

impl FakeSecretStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, record: ObjectRecord) {
        self.secrets.lock().unwrap().insert(record.key(), record);
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<ObjectRecord> {
        self.secrets
            .lock()
            .unwrap()
            .get(&format!("{namespace}/{name}"))
            .cloned()
    }

    /// Simulates `kubectl delete`: sets the deletion timestamp, or removes
    /// the secret right away when nothing holds it.
    pub fn delete(&self, namespace: &str, name: &str) {
        let mut secrets = self.secrets.lock().unwrap();
        let key = format!("{namespace}/{name}");
        let Some(record) = secrets.get_mut(&key) else {
            return;
        };
        if record.finalizers.is_empty() {
            secrets.remove(&key);
        } else {
            record.deleting = true;
        }
    }

    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectRecord>, StoreError> {
        Ok(self.get(namespace, name))
    }

    async fn patch_finalizers(
        &self,
        record: &ObjectRecord,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        let mut secrets = self.secrets.lock().unwrap();
        let key = record.key();
        let Some(stored) = secrets.get_mut(&key) else {
            return Ok(());
        };
        stored.finalizers = finalizers;
        if stored.deleting && stored.finalizers.is_empty() {
            secrets.remove(&key);
        }
        Ok(())
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ObjectRecord>, StoreError> {
        let selector: Option<LabelSelector> = label_selector.map(|s| s.parse().unwrap());
        let secrets = self.secrets.lock().unwrap();
        let mut records: Vec<ObjectRecord> = secrets
            .values()
            .filter(|r| namespace.is_none_or(|ns| r.namespace == ns))
            .filter(|r| selector.as_ref().is_none_or(|s| s.matches(&r.labels)))
            .cloned()
            .collect();
        records.sort_by_key(ObjectRecord::key);
        Ok(records)
    }
}

/// Configuration from literal environment pairs, validated like at startup.
pub fn config(pairs: &[(&str, &str)]) -> Config {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let config = Config::from_lookup(|key| env.get(key).cloned());
    config.validate().unwrap();
    config
}

pub fn reconciler(pairs: &[(&str, &str)], store: &Arc<FakeSecretStore>) -> Reconciler {
    let mut with_prefix = vec![("FINALIZER_PREFIX", FINALIZER_PREFIX)];
    with_prefix.extend_from_slice(pairs);
    let store: Arc<dyn SecretStore> = store.clone();
    Reconciler::new(&config(&with_prefix), store).unwrap()
}

pub fn secret(name: &str) -> ObjectRecord {
    ObjectRecord::new("default", name)
}
