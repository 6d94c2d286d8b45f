//! # Secret Store
//!
//! Access to the secrets a reconcile reads and the finalizer list it patches.
//! The reconciler only talks to this trait, so tests swap in an in-memory store.

use crate::controller::record::ObjectRecord;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Another writer changed the object between our read and our patch
    #[error("conflict while updating secret {0}")]
    Conflict(String),
}

impl StoreError {
    /// API failures and conflicts are transient from the reconciler's point of view.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Current state of one secret; `None` when it no longer exists.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectRecord>, StoreError>;

    /// Replace the finalizer list. The record's resource version guards against
    /// lost updates. A secret that is already gone is not an error.
    async fn patch_finalizers(
        &self,
        record: &ObjectRecord,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Secrets in `namespace` (all namespaces when `None`) matching the label selector.
    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ObjectRecord>, StoreError>;
}

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<ObjectRecord>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?;
        Ok(secret.as_ref().map(ObjectRecord::from))
    }

    async fn patch_finalizers(
        &self,
        record: &ObjectRecord,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &record.namespace);
        let mut metadata = json!({ "finalizers": finalizers });
        if let Some(resource_version) = &record.resource_version {
            metadata["resourceVersion"] = json!(resource_version);
        }
        let patch = json!({ "metadata": metadata });

        match api
            .patch(&record.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(secret = %record.key(), "Secret disappeared before finalizer update");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(StoreError::Conflict(record.key()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ObjectRecord>, StoreError> {
        let api: Api<Secret> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let secrets = api.list(&params).await?;
        Ok(secrets.items.iter().map(ObjectRecord::from).collect())
    }
}
