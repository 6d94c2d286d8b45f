//! # Secret Selection and File Layout

use super::Env;

#[derive(Debug, Clone, Default)]
pub struct SecretsConfig {
    /// Kubernetes label selector (`SECRET_SELECTOR_LABEL`)
    pub label_selector: String,
    /// Regular expression matched against secret names (`SECRET_SELECTOR_NAME`)
    pub name_selector: String,
    /// Namespace allow-list; empty means all namespaces
    pub namespaces: Vec<String>,
    /// Template selecting one value from the secret instead of all keys
    pub content_selector: String,
    /// Template for the target file (or directory in per-key mode)
    pub file_name_pattern: String,
    /// Template for the dot-delimited path the content is nested under
    pub property_pattern: String,
    /// Write one file per key into a directory instead of one YAML document
    pub per_key_files: bool,
    /// Name of the key transformation applied to extracted keys
    pub key_transformation: String,
    /// Track deletions through a finalizer and remove content again
    pub deletion_watch: bool,
}

impl SecretsConfig {
    pub(crate) fn load(env: &Env<'_>) -> Self {
        Self {
            label_selector: env.str_or("SECRET_SELECTOR_LABEL", ""),
            name_selector: env.str_or("SECRET_SELECTOR_NAME", ""),
            namespaces: env.list("SECRET_SELECTOR_NAMESPACE"),
            content_selector: env.str_or("SECRET_SELECTOR_CONTENT", ""),
            file_name_pattern: env.str_or("SECRET_FILE_NAME_PATTERN", ""),
            property_pattern: env.str_or("SECRET_FILE_PROPERTY_PATTERN", ""),
            per_key_files: env.bool_or("SECRET_FILE_SINGLE", false),
            key_transformation: env.str_or("SECRET_KEY_TRANSFORMATION", ""),
            deletion_watch: env.bool_or("SECRET_DELETION_WATCH", false),
        }
    }
}
