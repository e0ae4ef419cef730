//! Key/value blob backends used by the annotation store.

use crate::StorageError;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Synchronous string-keyed blob storage. No transactions, no schema.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-process backend. Contents vanish with the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written blob.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Maps an arbitrary key onto a single safe file name component.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());

    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "%{byte:02X}");
        }
    }

    escaped
}
