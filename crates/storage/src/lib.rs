//! Local persistence: per-document annotation sets and viewer preferences.

pub mod annotations;
pub mod backend;

pub use annotations::AnnotationStore;
pub use backend::{FileBackend, MemoryBackend, StorageBackend};

use directories::ProjectDirs;
use doc_model::ViewerPreferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),
}

/// Data directory layout: `preferences.json` plus an `annotations/` folder.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: ViewerPreferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfAnnotator", "PdfAnnotator")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn annotation_store(&self) -> AnnotationStore<FileBackend> {
        AnnotationStore::new(FileBackend::new(self.root.join("annotations")))
    }

    pub fn load_preferences(&self) -> Result<ViewerPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(ViewerPreferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &ViewerPreferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        Ok(())
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Annotation, DocumentId, PagePoint, Tool};

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let prefs = ViewerPreferences { initial_zoom_percent: 200, default_tool: Tool::Note };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, ViewerPreferences::default());
    }

    #[test]
    fn annotation_store_lives_under_root() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = Storage::with_root(temp.path());
        let mut store = storage.annotation_store();
        let id = DocumentId::new("paper.pdf");

        store
            .save_all(&id, &[Annotation::note(1, PagePoint::new(1.0, 1.0), "hi")])
            .expect("save should succeed");

        assert!(temp.path().join("annotations/annotations_paper.pdf.json").exists());
        assert_eq!(storage.annotation_store().load(&id).len(), 1);
    }
}
