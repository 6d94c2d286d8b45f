//! # Configuration
//!
//! Immutable settings assembled once at startup from environment variables and
//! passed explicitly to every component.
//!
//! - `controller`: logging, backoff, instance identity, startup retries
//! - `secrets`: selectors, templates and file layout
//! - `callback`: the HTTP notification sent after each materialization

pub mod callback;
pub mod controller;
pub mod secrets;

pub use callback::CallbackConfig;
pub use controller::ControllerConfig;
pub use secrets::SecretsConfig;

use crate::controller::callback::CallbackMethod;
use crate::controller::content::transform::UnknownKeyTransform;
use crate::controller::content::{ContentExtractor, KeyTransform};
use crate::controller::filter::SecretFilter;
use crate::controller::labels::LabelSelectorError;
use crate::controller::template::{Template, TemplateError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("both a label selector and a name selector are set, configure exactly one")]
    AmbiguousSelector,

    #[error("no secret selector set, configure SECRET_SELECTOR_LABEL or SECRET_SELECTOR_NAME")]
    MissingSelector,

    #[error(transparent)]
    InvalidLabelSelector(#[from] LabelSelectorError),

    #[error("invalid name selector {pattern:?}: {source}")]
    InvalidNameSelector {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("missing required setting {0}")]
    MissingSetting(&'static str),

    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),

    #[error(transparent)]
    InvalidKeyTransform(#[from] UnknownKeyTransform),

    #[error("unsupported callback method {0:?}, expected one of GET, HEAD, DELETE, POST, PUT, PATCH")]
    UnsupportedCallbackMethod(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Complete process configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub secrets: SecretsConfig,
    pub callback: CallbackConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup; tests pass a map here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(&lookup);
        Self {
            controller: ControllerConfig::load(&env),
            secrets: SecretsConfig::load(&env),
            callback: CallbackConfig::load(&env),
        }
    }

    /// Startup validation. The only place configuration errors may stop the process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SecretFilter::from_config(&self.secrets)?;

        if self.secrets.file_name_pattern.trim().is_empty() {
            return Err(ConfigError::MissingSetting("SECRET_FILE_NAME_PATTERN"));
        }
        Template::parse(&self.secrets.file_name_pattern)?;

        let key_transform = self.secrets.key_transform()?;
        ContentExtractor::new(
            &self.secrets.content_selector,
            &self.secrets.property_pattern,
            key_transform,
        )?;

        self.callback.method()?;
        Template::parse(&self.callback.body)?;

        if self.controller.backoff_min_secs == 0
            || self.controller.backoff_min_secs > self.controller.backoff_max_secs
        {
            return Err(ConfigError::InvalidValue {
                key: "BACKOFF_MIN_SECS",
                value: self.controller.backoff_min_secs.to_string(),
            });
        }
        Ok(())
    }
}

impl SecretsConfig {
    pub fn key_transform(&self) -> Result<KeyTransform, UnknownKeyTransform> {
        self.key_transformation.parse()
    }
}

impl CallbackConfig {
    pub fn method(&self) -> Result<CallbackMethod, ConfigError> {
        self.method
            .parse()
            .map_err(|_| ConfigError::UnsupportedCallbackMethod(self.method.clone()))
    }
}

/// Typed reads over a key lookup, falling back to defaults.
pub(crate) struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'static> {
    pub(crate) fn empty() -> Self {
        fn unset(_: &str) -> Option<String> {
            None
        }
        Env(&unset)
    }
}

impl Env<'_> {
    pub(crate) fn str_or(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> bool {
        (self.0)(key)
            .map(|v| {
                let v_lower = v.trim().to_lowercase();
                v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
            })
            .unwrap_or(default)
    }

    /// Comma separated list, empty entries dropped.
    pub(crate) fn list(&self, key: &str) -> Vec<String> {
        (self.0)(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.callback.method, "GET");
        assert_eq!(config.callback.content_type, "application/json");
        assert_eq!(config.callback.timeout_secs, 10);
        assert!(!config.secrets.deletion_watch);
        assert!(!config.secrets.per_key_files);
        assert_eq!(config.controller.kube_connect_attempts, 30);
    }

    #[test]
    fn test_reads_all_sections() {
        let config = config(&[
            ("SECRET_SELECTOR_NAME", "^app-.*$"),
            ("SECRET_SELECTOR_NAMESPACE", "a, b,,c"),
            ("SECRET_FILE_NAME_PATTERN", "/config/{{ .Name }}.yaml"),
            ("SECRET_FILE_SINGLE", "true"),
            ("SECRET_DELETION_WATCH", "1"),
            ("SECRET_KEY_TRANSFORMATION", "ToLowerCamel"),
            ("CALLBACK_URL", "http://localhost:9000/reload"),
            ("CALLBACK_METHOD", "post"),
            ("CALLBACK_TIMEOUT_SECS", "3"),
            ("POD_NAME", "app-7d9f"),
        ]);

        assert_eq!(config.secrets.namespaces, vec!["a", "b", "c"]);
        assert!(config.secrets.per_key_files);
        assert!(config.secrets.deletion_watch);
        assert_eq!(config.secrets.key_transform().unwrap(), KeyTransform::LowerCamel);
        assert_eq!(config.callback.method().unwrap(), CallbackMethod::Post);
        assert_eq!(config.callback.timeout_secs, 3);
        assert_eq!(config.controller.pod_name, "app-7d9f");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let base = [
            ("SECRET_SELECTOR_LABEL", "app=web"),
            ("SECRET_FILE_NAME_PATTERN", "/config/app.yaml"),
        ];
        config(&base).validate().unwrap();

        let with = |extra: (&'static str, &'static str)| {
            let mut pairs = base.to_vec();
            pairs.push(extra);
            config(&pairs).validate()
        };

        assert!(matches!(
            with(("SECRET_SELECTOR_NAME", "^x$")),
            Err(ConfigError::AmbiguousSelector)
        ));
        assert!(matches!(
            with(("CALLBACK_METHOD", "TRACE")),
            Err(ConfigError::UnsupportedCallbackMethod(_))
        ));
        assert!(matches!(
            with(("SECRET_KEY_TRANSFORMATION", "ToPascal")),
            Err(ConfigError::InvalidKeyTransform(_))
        ));
        assert!(matches!(
            with(("SECRET_SELECTOR_CONTENT", "{{ .Data.key ")),
            Err(ConfigError::InvalidTemplate(_))
        ));
        assert!(matches!(
            config(&[("SECRET_SELECTOR_LABEL", "app=web")]).validate(),
            Err(ConfigError::MissingSetting("SECRET_FILE_NAME_PATTERN"))
        ));
        assert!(matches!(
            config(&[("SECRET_FILE_NAME_PATTERN", "/x")]).validate(),
            Err(ConfigError::MissingSelector)
        ));
    }
}
