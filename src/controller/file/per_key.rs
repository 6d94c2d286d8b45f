//! One file per top-level key inside the target directory.
//!
//! The directory is owned by the materializer: files whose key is not in the
//! written tree are removed. Hidden files are left alone, which also keeps
//! in-flight temporary files out of reads.

use super::{write_atomic, FileError, WriteOutcome};
use crate::controller::content::{ContentMap, ContentTree};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

pub(super) fn read(dir: &Path) -> Result<ContentMap, FileError> {
    Ok(read_files(dir)?
        .into_iter()
        .map(|(key, (_, value))| (key, ContentTree::Leaf(value)))
        .collect())
}

pub(super) fn write(dir: &Path, tree: Option<&ContentMap>) -> Result<WriteOutcome, FileError> {
    let empty = ContentMap::new();
    let tree = tree.unwrap_or(&empty);
    let leaves = leaves(dir, tree)?;

    let existing = read_files(dir)?;
    if !leaves.is_empty() {
        std::fs::create_dir_all(dir).map_err(|e| FileError::io(dir, e))?;
    }

    let mut changed = false;
    for (key, value) in &leaves {
        if existing.get(*key).map(|(_, current)| current.as_slice()) == Some(*value) {
            continue;
        }
        let path = dir.join(key);
        write_atomic(&path, value)?;
        info!(path = %path.display(), "Successfully written key file");
        changed = true;
    }

    let mut removed = false;
    for (key, (path, _)) in &existing {
        if leaves.contains_key(key.as_str()) {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed stale key file");
                removed = true;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(FileError::io(path, e)),
        }
    }

    Ok(match (leaves.is_empty(), changed || removed) {
        (true, true) => WriteOutcome::Removed,
        (false, true) => WriteOutcome::Written,
        (_, false) => WriteOutcome::Unchanged,
    })
}

/// Flattens the tree into file name and content, rejecting anything that is
/// not a scalar or would escape the directory.
fn leaves<'a>(dir: &Path, tree: &'a ContentMap) -> Result<BTreeMap<&'a str, &'a [u8]>, FileError> {
    tree.iter()
        .map(|(key, value)| {
            if !is_file_name(key) {
                return Err(FileError::serialization(
                    dir,
                    format!("key {key:?} is not usable as a file name"),
                ));
            }
            match value {
                ContentTree::Leaf(value) => Ok((key.as_str(), value.as_slice())),
                ContentTree::Node(_) => Err(FileError::serialization(
                    dir,
                    format!("key {key:?} holds a nested value, which cannot be written as a single file"),
                )),
            }
        })
        .collect()
}

fn is_file_name(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('.') && !key.contains(['/', '\\', '\0'])
}

/// File contents are compared as raw bytes.
fn read_files(dir: &Path) -> Result<BTreeMap<String, (PathBuf, Vec<u8>)>, FileError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(FileError::io(dir, e)),
    };

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| FileError::io(dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let bytes = std::fs::read(&path).map_err(|e| FileError::io(&path, e))?;
        files.insert(name, (path, bytes));
    }
    Ok(files)
}
