//! Single YAML document at the target path.

use super::{write_atomic, FileError, WriteOutcome};
use crate::controller::content::ContentMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

pub(super) fn read(path: &Path) -> Result<ContentMap, FileError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ContentMap::new()),
        Err(e) => return Err(FileError::io(path, e)),
    };
    if text.trim().is_empty() {
        return Ok(ContentMap::new());
    }

    // A document holding only `null` or `~` counts as empty as well
    let value: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|e| FileError::serialization(path, e.to_string()))?;
    if value.is_null() {
        return Ok(ContentMap::new());
    }
    serde_yaml::from_value(value).map_err(|e| FileError::serialization(path, e.to_string()))
}

pub(super) fn write(path: &Path, tree: Option<&ContentMap>) -> Result<WriteOutcome, FileError> {
    let Some(tree) = tree else {
        return match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed target file");
                Ok(WriteOutcome::Removed)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(WriteOutcome::Unchanged),
            Err(e) => Err(FileError::io(path, e)),
        };
    };

    let yaml =
        serde_yaml::to_string(tree).map_err(|e| FileError::serialization(path, e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| FileError::io(parent, e))?;
    }
    write_atomic(path, yaml.as_bytes())?;
    info!(path = %path.display(), keys = tree.len(), "Successfully written target file");
    Ok(WriteOutcome::Written)
}
