//! # Object Record
//!
//! Local mirror of a watched `Secret`, taken once per reconcile.

use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;

/// Snapshot of a secret as seen by one reconcile pass.
///
/// Never mutated locally except through the finalizer protocol, which produces
/// a new finalizer list that is patched back to the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectRecord {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, Vec<u8>>,
    /// Set when the API server has marked the object for deletion
    pub deleting: bool,
    pub finalizers: Vec<String>,
    /// Observed resource version, sent along with patches for optimistic locking
    pub resource_version: Option<String>,
}

impl ObjectRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_finalizer(mut self, finalizer: impl Into<String>) -> Self {
        self.finalizers.push(finalizer.into());
        self
    }

    #[must_use]
    pub fn marked_for_deletion(mut self) -> Self {
        self.deleting = true;
        self
    }

    /// `namespace/name`, used for logging and per-object bookkeeping
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Text view of the data as templates see it. Invalid UTF-8 is replaced,
    /// not rejected; files are written from `data` itself.
    pub fn string_data(&self) -> BTreeMap<String, String> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect()
    }
}

impl From<&Secret> for ObjectRecord {
    fn from(secret: &Secret) -> Self {
        let meta = &secret.metadata;
        let mut data: BTreeMap<String, Vec<u8>> = secret
            .data
            .as_ref()
            .map(|d| d.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect())
            .unwrap_or_default();

        // The API server folds stringData into data on write; objects built
        // locally may still carry it.
        if let Some(string_data) = &secret.string_data {
            for (k, v) in string_data {
                data.insert(k.clone(), v.clone().into_bytes());
            }
        }

        Self {
            namespace: meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
            name: meta.name.clone().unwrap_or_default(),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            data,
            deleting: meta.deletion_timestamp.is_some(),
            finalizers: meta.finalizers.clone().unwrap_or_default(),
            resource_version: meta.resource_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use k8s_openapi::ByteString;

    fn deletion_time() -> Time {
        serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap()
    }

    #[test]
    fn test_from_secret_copies_metadata_and_data() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                namespace: Some("apps".to_string()),
                labels: Some(BTreeMap::from([("company".to_string(), "acme".to_string())])),
                finalizers: Some(vec!["x/1".to_string()]),
                deletion_timestamp: Some(deletion_time()),
                resource_version: Some("42".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(b"hunter2".to_vec()),
            )])),
            string_data: Some(BTreeMap::from([("user".to_string(), "admin".to_string())])),
            ..Secret::default()
        };

        let record = ObjectRecord::from(&secret);
        assert_eq!(record.key(), "apps/db");
        assert_eq!(record.labels["company"], "acme");
        assert_eq!(record.data["password"], b"hunter2");
        assert_eq!(record.data["user"], b"admin");
        assert!(record.deleting);
        assert_eq!(record.finalizers, vec!["x/1".to_string()]);
        assert_eq!(record.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn test_string_data_is_lossy() {
        let record = ObjectRecord::new("ns", "n").with_data("bin", vec![0xff, b'a']);
        assert_eq!(record.string_data()["bin"], "\u{fffd}a");
    }
}
