//! # Callback Notifier
//!
//! Fires one HTTP request after each successful materialization so that the
//! consumer of the files can reload them. Failures are classified: a 405 or an
//! unusable configuration is terminal, anything else may be retried.

use crate::config::{CallbackConfig, ConfigError};
use crate::controller::record::ObjectRecord;
use crate::controller::template::render_or_empty;
use reqwest::{Client, Method, StatusCode};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMethod {
    Get,
    Head,
    Delete,
    Post,
    Put,
    Patch,
}

impl CallbackMethod {
    /// Only these methods carry the rendered body.
    pub fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Head => Method::HEAD,
            Self::Delete => Method::DELETE,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
        }
    }
}

impl fmt::Display for CallbackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

impl FromStr for CallbackMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "DELETE" => Ok(Self::Delete),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP method ({0}) is not supported by the callback receiver")]
    MethodNotAllowed(CallbackMethod),

    #[error("callback returned unexpected status code {0}")]
    UnexpectedStatus(StatusCode),

    #[error("error during callback request: {0}")]
    Network(#[from] reqwest::Error),
}

impl CallbackError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl { .. } | Self::MethodNotAllowed(_) => false,
            Self::UnexpectedStatus(_) | Self::Network(_) => true,
        }
    }
}

/// Sends the configured callback. An empty URL disables it.
#[derive(Debug, Clone)]
pub struct CallbackNotifier {
    client: Client,
    url: String,
    method: CallbackMethod,
    body: String,
    content_type: String,
}

impl CallbackNotifier {
    /// Builds the HTTP client with the configured timeout.
    ///
    /// # Errors
    /// Returns a configuration error for an unsupported method.
    pub fn new(config: &CallbackConfig) -> Result<Self, ConfigError> {
        let method = config.method()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "CALLBACK_TIMEOUT_SECS",
                value: format!("{} ({e})", config.timeout_secs),
            })?;
        Ok(Self {
            client,
            url: config.url.trim().to_string(),
            method,
            body: config.body.clone(),
            content_type: config.content_type.clone(),
        })
    }

    pub async fn notify(&self, record: &ObjectRecord) -> Result<(), CallbackError> {
        if self.url.is_empty() {
            debug!(secret = %record.key(), "No callback URL set, skipping");
            return Ok(());
        }

        let url = reqwest::Url::parse(&self.url).map_err(|e| CallbackError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        let mut request = self.client.request(self.method.as_method(), url);
        if self.method.sends_body() {
            let body = if self.body.is_empty() {
                String::new()
            } else {
                render_or_empty(&self.body, record)
            };
            request = request
                .header(reqwest::header::CONTENT_TYPE, &self.content_type)
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return Err(CallbackError::MethodNotAllowed(self.method));
        }
        if status.as_u16() > 299 {
            return Err(CallbackError::UnexpectedStatus(status));
        }

        info!(
            secret = %record.key(),
            method = %self.method,
            url = %self.url,
            status = status.as_u16(),
            "Callback succeeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<CallbackMethod>(), Ok(CallbackMethod::Get));
        assert_eq!("PATCH".parse::<CallbackMethod>(), Ok(CallbackMethod::Patch));
        assert!("OPTIONS".parse::<CallbackMethod>().is_err());
        assert!(CallbackMethod::Put.sends_body());
        assert!(!CallbackMethod::Delete.sends_body());
    }

    #[test]
    fn test_unsupported_method_is_config_error() {
        let config = CallbackConfig {
            method: "OPTIONS".to_string(),
            ..CallbackConfig::default()
        };
        assert!(matches!(
            CallbackNotifier::new(&config),
            Err(ConfigError::UnsupportedCallbackMethod(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_url_is_noop() {
        let notifier = CallbackNotifier::new(&CallbackConfig::default()).unwrap();
        assert!(notifier.url.is_empty());
        notifier.notify(&ObjectRecord::new("ns", "s")).await.unwrap();
    }

    #[tokio::test]
    async fn test_broken_url_is_terminal() {
        let config = CallbackConfig {
            url: "not a url".to_string(),
            ..CallbackConfig::default()
        };
        let err = CallbackNotifier::new(&config)
            .unwrap()
            .notify(&ObjectRecord::new("ns", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::InvalidUrl { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(!CallbackError::MethodNotAllowed(CallbackMethod::Get).is_retryable());
        assert!(CallbackError::UnexpectedStatus(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(CallbackError::UnexpectedStatus(StatusCode::BAD_REQUEST).is_retryable());
    }
}
