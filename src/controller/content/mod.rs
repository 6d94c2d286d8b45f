//! # Content
//!
//! The generic key/value tree that is projected to disk, plus the operations
//! that build and combine it.
//!
//! - `extract`: builds a tree from a secret using the configured templates
//! - `merge`: pure `union` and `drop` over trees
//! - `transform`: key name transformations applied to extracted keys

pub mod extract;
pub mod merge;
pub mod transform;

pub use extract::{ContentExtractor, ExtractError};
pub use merge::{drop, union};
pub use transform::KeyTransform;

use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Top level of a content tree: the mapping materialized at a target path.
pub type ContentMap = BTreeMap<String, ContentTree>;

/// One value of the tree. Leaves hold the raw bytes of a value, so binary
/// secret data reaches per-key files untouched; YAML documents accept only
/// UTF-8 leaves. Numeric-looking values stay strings through a write/read cycle.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentTree {
    Leaf(Vec<u8>),
    Node(ContentMap),
}

impl ContentTree {
    pub fn leaf(value: impl Into<Vec<u8>>) -> Self {
        Self::Leaf(value.into())
    }
}

impl fmt::Debug for ContentTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => match std::str::from_utf8(value) {
                Ok(text) => f.debug_tuple("Leaf").field(&text).finish(),
                Err(_) => f.debug_tuple("Leaf").field(value).finish(),
            },
            Self::Node(map) => f.debug_tuple("Node").field(map).finish(),
        }
    }
}

impl From<&str> for ContentTree {
    fn from(value: &str) -> Self {
        Self::leaf(value)
    }
}

impl From<String> for ContentTree {
    fn from(value: String) -> Self {
        Self::leaf(value)
    }
}

impl From<ContentMap> for ContentTree {
    fn from(map: ContentMap) -> Self {
        Self::Node(map)
    }
}

impl Serialize for ContentTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(value) => {
                let text = std::str::from_utf8(value)
                    .map_err(|e| ser::Error::custom(format!("value is not valid UTF-8: {e}")))?;
                serializer.serialize_str(text)
            }
            Self::Node(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

/// A YAML value that has no place in a content tree (sequences, tagged values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedValue(pub String);

impl fmt::Display for UnsupportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported value in content tree: {}", self.0)
    }
}

impl std::error::Error for UnsupportedValue {}

impl TryFrom<serde_yaml::Value> for ContentTree {
    type Error = UnsupportedValue;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value;

        match value {
            Value::Null => Ok(Self::Leaf(Vec::new())),
            Value::Bool(b) => Ok(Self::leaf(b.to_string())),
            Value::Number(n) => Ok(Self::leaf(n.to_string())),
            Value::String(s) => Ok(Self::leaf(s)),
            Value::Mapping(mapping) => {
                let mut map = ContentMap::new();
                for (key, value) in mapping {
                    map.insert(scalar_key(key)?, Self::try_from(value)?);
                }
                Ok(Self::Node(map))
            }
            Value::Sequence(_) => Err(UnsupportedValue("sequence".to_string())),
            Value::Tagged(tagged) => Err(UnsupportedValue(format!("tagged value {}", tagged.tag))),
        }
    }
}

fn scalar_key(key: serde_yaml::Value) -> Result<String, UnsupportedValue> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(UnsupportedValue(format!("non-scalar key {other:?}"))),
    }
}

/// Builds a `ContentMap` from literal pairs; handy in tests.
#[macro_export]
macro_rules! content {
    () => { $crate::controller::content::ContentMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::controller::content::ContentMap::new();
        $( map.insert($key.to_string(), $crate::controller::content::ContentTree::from($value)); )+
        map
    }};
}
