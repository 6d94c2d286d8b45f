//! # Callback Tests
//!
//! Exercise the HTTP notifier and its effect on reconciles against a mock
//! receiver.

mod common;

use common::receiver::{unreachable_url, CallbackReceiver};
use common::{reconciler, secret, FakeSecretStore};
use secret_file_provider::config::CallbackConfig;
use secret_file_provider::controller::callback::{CallbackError, CallbackNotifier};
use secret_file_provider::controller::file::WriteOutcome;
use secret_file_provider::controller::reconciler::{ReconcileOutcome, ReconcilerError};
use secret_file_provider::controller::record::ObjectRecord;
use tempfile::TempDir;

fn notifier(url: &str, method: &str, body: &str) -> CallbackNotifier {
    CallbackNotifier::new(&CallbackConfig {
        url: url.to_string(),
        method: method.to_string(),
        body: body.to_string(),
        ..CallbackConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_success_status_completes() {
    let receiver = CallbackReceiver::start(200).await;

    notifier(&receiver.url, "GET", "")
        .notify(&ObjectRecord::new("default", "s"))
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/reload");
    assert_eq!(requests[0].content_type, None);
}

#[tokio::test]
async fn test_method_not_allowed_is_terminal() {
    let receiver = CallbackReceiver::start(405).await;

    let err = notifier(&receiver.url, "DELETE", "")
        .notify(&ObjectRecord::new("default", "s"))
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::MethodNotAllowed(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let receiver = CallbackReceiver::start(500).await;

    let err = notifier(&receiver.url, "GET", "")
        .notify(&ObjectRecord::new("default", "s"))
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::UnexpectedStatus(status) if status.as_u16() == 500));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_post_sends_rendered_body_and_content_type() {
    let receiver = CallbackReceiver::start(204).await;

    notifier(&receiver.url, "post", r#"{"secret":"{{ .Namespace }}/{{ .Name }}"}"#)
        .notify(&ObjectRecord::new("default", "db"))
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(requests[0].body, r#"{"secret":"default/db"}"#);
}

#[tokio::test]
async fn test_broken_body_template_sends_empty_body() {
    let receiver = CallbackReceiver::start(200).await;

    notifier(&receiver.url, "PUT", "{{ .Labels.missing }}")
        .notify(&ObjectRecord::new("default", "db"))
        .await
        .unwrap();

    let requests = receiver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, "");
}

#[tokio::test]
async fn test_unreachable_receiver_is_retryable() {
    let url = unreachable_url().await;

    let err = notifier(&url, "GET", "")
        .notify(&ObjectRecord::new("default", "s"))
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::Network(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_invalid_url_is_terminal() {
    let err = notifier("not a url", "GET", "")
        .notify(&ObjectRecord::new("default", "s"))
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::InvalidUrl { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_reconcile_completes_when_callback_is_rejected() {
    let receiver = CallbackReceiver::start(405).await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("config.yaml");
    let store = FakeSecretStore::new();
    let reconciler = reconciler(
        &[
            ("SECRET_SELECTOR_LABEL", "app"),
            ("SECRET_FILE_NAME_PATTERN", target.to_str().unwrap()),
            ("CALLBACK_URL", &receiver.url),
        ],
        &store,
    );

    store.insert(secret("s").with_label("app", "x").with_data("key", "value"));
    let outcome = reconciler.reconcile_secret("default", "s").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied(WriteOutcome::Written));
    assert_eq!(receiver.requests().len(), 1);
}

#[tokio::test]
async fn test_callback_fires_even_when_content_is_unchanged() {
    let receiver = CallbackReceiver::start(200).await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("config.yaml");
    let store = FakeSecretStore::new();
    let reconciler = reconciler(
        &[
            ("SECRET_SELECTOR_LABEL", "app"),
            ("SECRET_FILE_NAME_PATTERN", target.to_str().unwrap()),
            ("CALLBACK_URL", &receiver.url),
        ],
        &store,
    );

    store.insert(secret("s").with_label("app", "x").with_data("key", "value"));
    reconciler.reconcile_secret("default", "s").await.unwrap();
    let outcome = reconciler.reconcile_secret("default", "s").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied(WriteOutcome::Unchanged));
    assert_eq!(receiver.requests().len(), 2);
}

#[tokio::test]
async fn test_reconcile_retries_on_callback_failure_and_keeps_finalizer() {
    let receiver = CallbackReceiver::start(503).await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("config.yaml");
    let store = FakeSecretStore::new();
    let reconciler = reconciler(
        &[
            ("SECRET_SELECTOR_LABEL", "app"),
            ("SECRET_FILE_NAME_PATTERN", target.to_str().unwrap()),
            ("SECRET_DELETION_WATCH", "true"),
            ("CALLBACK_URL", &receiver.url),
        ],
        &store,
    );

    store.insert(secret("s").with_label("app", "x").with_data("key", "value"));
    let err = reconciler.reconcile_secret("default", "s").await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Callback(_)));
    assert!(target.is_file());

    store.delete("default", "s");
    assert!(reconciler.reconcile_secret("default", "s").await.is_err());
    assert!(!target.exists());
    assert!(store.get("default", "s").is_some_and(|s| !s.finalizers.is_empty()));
}
