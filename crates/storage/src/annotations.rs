//! Per-document annotation persistence.
//!
//! Every save replaces the whole set for a document. There is no partial
//! update and no conflict detection: the last writer wins.

use crate::backend::StorageBackend;
use crate::StorageError;
use doc_model::{Annotation, DocumentId};
use serde::{Deserialize, Serialize};

const ANNOTATIONS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct AnnotationEnvelopeRef<'a> {
    version: u32,
    annotations: &'a [Annotation],
}

#[derive(Debug, Deserialize)]
struct AnnotationEnvelope {
    version: u32,
    annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct AnnotationStore<B> {
    backend: B,
}

impl<B: StorageBackend> AnnotationStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads the persisted set, treating absent or unreadable data as empty.
    pub fn load(&self, document_id: &DocumentId) -> Vec<Annotation> {
        match self.try_load(document_id) {
            Ok(Some(annotations)) => annotations,
            Ok(None) => Vec::new(),
            Err(err) => {
                log::warn!("ignoring unreadable annotations for {document_id}: {err}");
                Vec::new()
            }
        }
    }

    /// Like [`Self::load`] but distinguishes "nothing saved" from a failed read.
    pub fn try_load(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<Vec<Annotation>>, StorageError> {
        let Some(blob) = self.backend.get(&storage_key(document_id))? else {
            return Ok(None);
        };

        let envelope: AnnotationEnvelope = serde_json::from_str(&blob)?;
        if envelope.version != ANNOTATIONS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        Ok(Some(envelope.annotations))
    }

    pub fn save_all(
        &mut self,
        document_id: &DocumentId,
        annotations: &[Annotation],
    ) -> Result<(), StorageError> {
        let envelope =
            AnnotationEnvelopeRef { version: ANNOTATIONS_SCHEMA_VERSION, annotations };
        let blob = serde_json::to_string(&envelope)?;

        self.backend.set(&storage_key(document_id), &blob)?;
        log::info!("saved {} annotation(s) for {document_id}", annotations.len());
        Ok(())
    }

    pub fn clear(&mut self, document_id: &DocumentId) -> Result<(), StorageError> {
        self.backend.remove(&storage_key(document_id))
    }
}

fn storage_key(document_id: &DocumentId) -> String {
    format!("annotations_{document_id}")
}
