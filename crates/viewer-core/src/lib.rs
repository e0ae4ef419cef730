//! Viewer core: page navigation, zoom, annotation gestures and the overlay
//! render loop, wired to a document source and an annotation store passed in
//! by the caller.

pub mod gesture;
pub mod notify;
pub mod scene;
pub mod viewer;

pub use gesture::{GestureOutcome, GestureTracker, NOTE_PROMPT};
pub use notify::{LogNotifier, NotePrompt, Notifier, ScriptedPrompt, Severity};
pub use scene::{compose, ImageSurface, OverlayScene, Rect, SceneItem, Surface};
pub use viewer::Viewer;

use pdf_engine::PdfEngineError;
use storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to load document: {0}")]
    DocumentLoad(String),
    #[error("failed to read saved annotations: {0}")]
    StorageRead(#[source] StorageError),
    #[error("failed to save annotations: {0}")]
    StorageWrite(#[source] StorageError),
    #[error("failed to render page: {0}")]
    Render(#[from] PdfEngineError),
    #[error("no document is open")]
    NoDocument,
}
