//! # File Materializer
//!
//! Projects a [`ContentMap`] onto the file system and reads it back.
//!
//! - **Single document**: the whole tree is one YAML file at the target path.
//! - **Per key**: the target is a directory holding one file per top-level
//!   key, the file content being the leaf value.
//!
//! Missing targets read as an empty tree. Every file is written to a temporary
//! sibling first and renamed into place, so an interrupted reconcile never
//! leaves a half-written target behind.

mod per_key;
mod single;

use crate::config::{ConfigError, SecretsConfig};
use crate::controller::content::{drop, union, ContentMap};
use crate::controller::record::ObjectRecord;
use crate::controller::template::{Template, TemplateError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    SingleDocument,
    PerKey,
}

/// Whether the content of a secret is added to or removed from its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The target already held exactly this content
    Unchanged,
    /// Nothing was left, the file (or every per-key file) was deleted
    Removed,
}

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("content of {path} cannot be encoded or decoded: {message}")]
    Serialization { path: PathBuf, message: String },
}

impl FileError {
    /// I/O may recover (permissions fixed, disk freed); invalid content will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn serialization(path: &Path, message: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileMaterializer {
    mode: FileMode,
    name_pattern: Template,
}

impl FileMaterializer {
    pub fn new(mode: FileMode, name_pattern: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            mode,
            name_pattern: Template::parse(name_pattern)?,
        })
    }

    pub fn from_config(config: &SecretsConfig) -> Result<Self, ConfigError> {
        if config.file_name_pattern.trim().is_empty() {
            return Err(ConfigError::MissingSetting("SECRET_FILE_NAME_PATTERN"));
        }
        let mode = if config.per_key_files {
            FileMode::PerKey
        } else {
            FileMode::SingleDocument
        };
        Ok(Self::new(mode, config.file_name_pattern.trim())?)
    }

    /// Target file, or directory in per-key mode, for one secret.
    pub fn resolve_target(&self, record: &ObjectRecord) -> Result<PathBuf, TemplateError> {
        self.name_pattern.execute(record).map(PathBuf::from)
    }

    pub fn read(&self, path: &Path) -> Result<ContentMap, FileError> {
        match self.mode {
            FileMode::SingleDocument => single::read(path),
            FileMode::PerKey => per_key::read(path),
        }
    }

    /// Replace whatever is at `path` with `tree`; `None` deletes the content.
    pub fn write(&self, path: &Path, tree: Option<&ContentMap>) -> Result<WriteOutcome, FileError> {
        match self.mode {
            FileMode::SingleDocument => single::write(path, tree),
            FileMode::PerKey => per_key::write(path, tree),
        }
    }

    /// Read the current tree, merge `content` in or subtract it, and write the
    /// result back unless it is identical.
    pub fn apply(
        &self,
        path: &Path,
        change: Change,
        content: &ContentMap,
    ) -> Result<WriteOutcome, FileError> {
        let existing = self.read(path)?;
        let next = match change {
            Change::Add => Some(union(&existing, content)),
            Change::Remove => drop(&existing, content),
        };

        let unchanged = match &next {
            Some(tree) => *tree == existing && self.exists(path),
            None => existing.is_empty() && !self.exists(path),
        };
        if unchanged {
            debug!(path = %path.display(), "Target content unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }
        self.write(path, next.as_ref())
    }

    fn exists(&self, path: &Path) -> bool {
        match self.mode {
            FileMode::SingleDocument => path.is_file(),
            FileMode::PerKey => path.is_dir(),
        }
    }
}

/// Write to a temporary file next to `path`, then rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FileError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(parent)
        .map_err(|e| FileError::io(parent, e))?;
    temp_file
        .write_all(contents)
        .and_then(|()| temp_file.as_file().sync_all())
        .map_err(|e| FileError::io(temp_file.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            temp_file.path(),
            std::fs::Permissions::from_mode(crate::constants::TARGET_FILE_MODE),
        )
        .map_err(|e| FileError::io(temp_file.path(), e))?;
    }

    temp_file
        .persist(path)
        .map_err(|e| FileError::io(path, e.error))?;
    Ok(())
}
