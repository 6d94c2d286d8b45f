//! # Callback Configuration

use super::Env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Empty disables the callback
    pub url: String,
    pub method: String,
    /// Body template, rendered per secret
    pub body: String,
    pub content_type: String,
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self::load(&Env::empty())
    }
}

impl CallbackConfig {
    pub(crate) fn load(env: &Env<'_>) -> Self {
        use crate::constants::*;
        Self {
            url: env.str_or("CALLBACK_URL", ""),
            method: env.str_or("CALLBACK_METHOD", DEFAULT_CALLBACK_METHOD),
            body: env.str_or("CALLBACK_BODY", ""),
            content_type: env.str_or("CALLBACK_CONTENTTYPE", DEFAULT_CALLBACK_CONTENT_TYPE),
            timeout_secs: env.or_default("CALLBACK_TIMEOUT_SECS", DEFAULT_CALLBACK_TIMEOUT_SECS),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
