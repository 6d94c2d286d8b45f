//! # Content Extraction
//!
//! Builds the [`ContentMap`] that one secret contributes to its target.
//!
//! With no content selector every data key becomes a leaf (after the key
//! transformation). A selector renders to a single scalar instead, which is
//! keyed by the last `.` segment of the selector unless a property path is
//! configured. A property path such as `clients.{{ .Labels.company }}` nests
//! the result under one single-key map per segment.

use super::{ContentMap, ContentTree, KeyTransform};
use crate::controller::record::ObjectRecord;
use crate::controller::template::{is_template, Template, TemplateError};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("property path {rendered:?} rendered from {pattern:?} is not a valid dot-delimited path")]
    InvalidPropertyPath { pattern: String, rendered: String },
}

impl ExtractError {
    /// Template failures may depend on labels or data that can still change;
    /// an unusable property path comes from configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Template(_))
    }
}

enum Extracted {
    Map(ContentMap),
    Scalar(String),
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    content_selector: Option<Template>,
    property_pattern: Option<Template>,
    key_transform: KeyTransform,
}

impl ContentExtractor {
    /// Parses both templates up front so syntax errors surface at startup.
    pub fn new(
        content_selector: &str,
        property_pattern: &str,
        key_transform: KeyTransform,
    ) -> Result<Self, TemplateError> {
        let content_selector = match content_selector.trim() {
            "" => None,
            selector if !is_template(selector) => {
                warn!(
                    pattern = selector,
                    "Content selector is not a template, extracting all keys instead"
                );
                None
            }
            selector => Some(Template::parse(selector)?),
        };
        let property_pattern = match property_pattern.trim() {
            "" => None,
            pattern => Some(Template::parse(pattern)?),
        };

        Ok(Self {
            content_selector,
            property_pattern,
            key_transform,
        })
    }

    pub fn extract(&self, record: &ObjectRecord) -> Result<ContentMap, ExtractError> {
        let extracted = match &self.content_selector {
            None => Extracted::Map(self.all_keys(record)),
            Some(selector) => match selector.execute(record)? {
                // An empty selection contributes nothing rather than an empty leaf
                value if value.is_empty() => Extracted::Map(ContentMap::new()),
                value => Extracted::Scalar(value),
            },
        };

        let Some(property_pattern) = &self.property_pattern else {
            return Ok(match extracted {
                Extracted::Map(map) => map,
                Extracted::Scalar(value) => {
                    let key = self.scalar_key();
                    ContentMap::from([(key, ContentTree::leaf(value))])
                }
            });
        };

        let rendered = property_pattern.execute(record)?;
        let segments: Vec<&str> = rendered.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ExtractError::InvalidPropertyPath {
                pattern: property_pattern.source().to_string(),
                rendered,
            });
        }

        let mut tree = match extracted {
            Extracted::Map(map) => ContentTree::Node(map),
            Extracted::Scalar(value) => ContentTree::leaf(value),
        };
        for segment in segments.iter().skip(1).rev() {
            tree = ContentTree::Node(ContentMap::from([(segment.to_string(), tree)]));
        }
        Ok(ContentMap::from([(segments[0].to_string(), tree)]))
    }

    /// Values keep their raw bytes.
    fn all_keys(&self, record: &ObjectRecord) -> ContentMap {
        record
            .data
            .iter()
            .map(|(key, value)| (self.key_transform.apply(key), ContentTree::Leaf(value.clone())))
            .collect()
    }

    /// `{{ .Data.client_id }}` yields `client_id`. A selector without any `.`
    /// is used as the key verbatim.
    fn scalar_key(&self) -> String {
        let source = self
            .content_selector
            .as_ref()
            .map(Template::source)
            .unwrap_or_default();
        match source.rsplit_once('.') {
            Some((_, last)) => last.replace('}', "").trim().to_string(),
            None => source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;

    fn acme() -> ObjectRecord {
        ObjectRecord::new("default", "secret1")
            .with_label("company", "acme")
            .with_data("key1", "value1")
    }

    fn extractor(selector: &str, property: &str) -> ContentExtractor {
        ContentExtractor::new(selector, property, KeyTransform::Identity).unwrap()
    }

    #[test]
    fn test_no_selectors_extracts_all_keys() {
        assert_eq!(extractor("", "").extract(&acme()).unwrap(), content! { "key1" => "value1" });
    }

    #[test]
    fn test_selector_scalar_is_keyed_by_last_segment() {
        assert_eq!(
            extractor("{{.Data.key1}}", "").extract(&acme()).unwrap(),
            content! { "key1" => "value1" }
        );
        assert_eq!(
            extractor("{{ .Data.key1 }}", "").extract(&acme()).unwrap(),
            content! { "key1" => "value1" }
        );
    }

    #[test]
    fn test_selector_with_property_from_label() {
        assert_eq!(
            extractor("{{.Data.key1}}", "{{.Labels.company}}").extract(&acme()).unwrap(),
            content! { "acme" => "value1" }
        );
    }

    #[test]
    fn test_nested_property_path() {
        let record = acme().with_data("CLIENT_ID", "the-acme-id");
        assert_eq!(
            extractor("{{.Data.CLIENT_ID}}", "foo.bar.clientIds.{{.ObjectMeta.Labels.company}}")
                .extract(&record)
                .unwrap(),
            content! {
                "foo" => content! {
                    "bar" => content! { "clientIds" => content! { "acme" => "the-acme-id" } }
                }
            }
        );
    }

    #[test]
    fn test_static_property_wraps_full_map() {
        assert_eq!(
            extractor("", "foo").extract(&acme()).unwrap(),
            content! { "foo" => content! { "key1" => "value1" } }
        );
    }

    #[test]
    fn test_non_template_selector_falls_back_to_all_keys() {
        assert_eq!(
            extractor("key1", "").extract(&acme()).unwrap(),
            content! { "key1" => "value1" }
        );
    }

    #[test]
    fn test_key_transform_applies_to_full_map_only() {
        let record = ObjectRecord::new("default", "s").with_data("CLIENT_ID", "id");
        let transformed = ContentExtractor::new("", "", KeyTransform::LowerCamel).unwrap();
        assert_eq!(transformed.extract(&record).unwrap(), content! { "clientId" => "id" });

        let selected = ContentExtractor::new("{{.Data.CLIENT_ID}}", "", KeyTransform::LowerCamel).unwrap();
        assert_eq!(selected.extract(&record).unwrap(), content! { "CLIENT_ID" => "id" });
    }

    #[test]
    fn test_selector_without_dot_is_its_own_key() {
        let selector = r#"{{ "fixed" }}"#;
        assert_eq!(
            extractor(selector, "").extract(&acme()).unwrap(),
            ContentMap::from([(selector.to_string(), ContentTree::leaf("fixed"))])
        );
    }

    #[test]
    fn test_binary_data_keeps_its_bytes() {
        let bytes = vec![0xfe, 0xed, 0xfe, 0xed, 0x00, 0x02, 0xff];
        let record = ObjectRecord::new("default", "s").with_data("keystore", bytes.clone());
        assert_eq!(
            extractor("", "").extract(&record).unwrap(),
            ContentMap::from([("keystore".to_string(), ContentTree::Leaf(bytes))])
        );
    }

    #[test]
    fn test_missing_label_is_retryable_template_error() {
        let record = ObjectRecord::new("default", "s").with_data("key1", "v");
        let err = extractor("{{.Data.key1}}", "{{.Labels.company}}")
            .extract(&record)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Template(TemplateError::Execute { .. })));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_empty_property_segment_is_not_retryable() {
        let record = ObjectRecord::new("default", "s")
            .with_label("company", "")
            .with_data("key1", "v");
        let err = extractor("{{.Data.key1}}", "clients.{{.Labels.company}}")
            .extract(&record)
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPropertyPath { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_selection_contributes_empty_map() {
        let record = ObjectRecord::new("default", "s").with_data("key1", "");
        assert_eq!(extractor("{{.Data.key1}}", "").extract(&record).unwrap(), content! {});
    }

    #[test]
    fn test_invalid_selector_fails_at_construction() {
        assert!(ContentExtractor::new("{{ .Data.key1 ", "", KeyTransform::Identity).is_err());
        assert!(ContentExtractor::new("", "{{ nope }}", KeyTransform::Identity).is_err());
    }
}
