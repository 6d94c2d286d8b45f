//! # Event Filter
//!
//! Decides whether an incoming secret event reaches the reconciler at all.
//! Exactly one selector (label selector or name regex) is configured, an
//! optional namespace allow-list narrows it further, and delete events only
//! pass when deletion watch is enabled.

use crate::config::{ConfigError, SecretsConfig};
use crate::controller::labels::LabelSelector;
use crate::controller::record::ObjectRecord;
use regex::Regex;
use std::collections::BTreeSet;

/// What the watch reported for a secret. Creations and resyncs arrive as
/// `Update`; a secret with a deletion timestamp is a `Delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub enum Selector {
    Label(LabelSelector),
    Name(Regex),
}

impl Selector {
    fn matches(&self, record: &ObjectRecord) -> bool {
        match self {
            Self::Label(selector) => selector.matches(&record.labels),
            Self::Name(regex) => regex.is_match(&record.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretFilter {
    selector: Selector,
    namespaces: BTreeSet<String>,
    deletion_watch: bool,
}

impl SecretFilter {
    pub fn new(selector: Selector, namespaces: BTreeSet<String>, deletion_watch: bool) -> Self {
        Self {
            selector,
            namespaces,
            deletion_watch,
        }
    }

    /// Build from configuration, enforcing selector exclusivity.
    pub fn from_config(config: &SecretsConfig) -> Result<Self, ConfigError> {
        let label = config.label_selector.trim();
        let name = config.name_selector.trim();

        let selector = match (label.is_empty(), name.is_empty()) {
            (false, false) => return Err(ConfigError::AmbiguousSelector),
            (true, true) => return Err(ConfigError::MissingSelector),
            (false, true) => Selector::Label(label.parse()?),
            (true, false) => Selector::Name(Regex::new(name).map_err(|e| {
                ConfigError::InvalidNameSelector {
                    pattern: name.to_string(),
                    source: Box::new(e),
                }
            })?),
        };

        Ok(Self::new(
            selector,
            config.namespaces.iter().cloned().collect(),
            config.deletion_watch,
        ))
    }

    /// Label selector to push down to the API server, if one is configured.
    pub fn label_selector(&self) -> Option<&str> {
        match &self.selector {
            Selector::Label(selector) => Some(selector.as_str()),
            Selector::Name(_) => None,
        }
    }

    /// The single namespace to scope the watch to, when the allow-list has exactly one entry.
    pub fn single_namespace(&self) -> Option<&str> {
        match self.namespaces.len() {
            1 => self.namespaces.iter().next().map(String::as_str),
            _ => None,
        }
    }

    /// Selector and namespace checks, independent of the event kind.
    pub fn matches(&self, record: &ObjectRecord) -> bool {
        (self.namespaces.is_empty() || self.namespaces.contains(&record.namespace))
            && self.selector.matches(record)
    }

    pub fn should_process(&self, kind: EventKind, record: &ObjectRecord) -> bool {
        let relevant = match kind {
            EventKind::Update => true,
            EventKind::Delete => self.deletion_watch,
        };
        relevant && self.matches(record)
    }
}
