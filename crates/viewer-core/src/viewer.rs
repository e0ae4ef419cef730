//! The viewer state machine: `Closed -> Loading -> Ready -> Closed`, with a
//! terminal `Error` display state left only by the next `load`.

use crate::gesture::{GestureOutcome, GestureTracker};
use crate::notify::{LogNotifier, NotePrompt, Notifier, ScriptedPrompt, Severity};
use crate::scene::{compose, ImageSurface, OverlayScene};
use crate::ViewerError;
use doc_model::{
    apply_viewer_action, Annotation, DocumentId, PagePoint, Tool, ViewerAction, ViewerPhase,
    ViewerPreferences, ViewerState,
};
use image::RgbaImage;
use pdf_engine::{DocumentHandle, OpenSource, PdfEngine, PdfEngineError, RenderRequest};
use storage::{AnnotationStore, StorageBackend};

/// Everything that exists only while a document is open.
struct Session {
    handle: DocumentHandle,
    state: ViewerState,
    annotations: Vec<Annotation>,
    gesture: GestureTracker,
    page: RgbaImage,
    overlay: ImageSurface,
    unsaved: bool,
}

impl Session {
    fn render_page<E: PdfEngine>(&mut self, engine: &E) -> Result<(), PdfEngineError> {
        let request = RenderRequest {
            page_index: self.state.current_page - 1,
            scale: self.state.zoom_scale(),
        };

        self.page = engine.render_page(self.handle, request)?;
        self.overlay = ImageSurface::new(self.page.width(), self.page.height());
        self.redraw_overlay();

        log::debug!(
            "rendered page {}/{} at {}%",
            self.state.current_page,
            self.state.page_count,
            self.state.zoom_percent
        );
        Ok(())
    }

    fn scene(&self) -> OverlayScene {
        OverlayScene::for_page(&self.annotations, self.state.current_page)
    }

    fn redraw_overlay(&mut self) {
        self.scene().paint(&mut self.overlay);
    }
}

pub struct Viewer<E, B> {
    engine: E,
    store: AnnotationStore<B>,
    notifier: Box<dyn Notifier>,
    prompt: Box<dyn NotePrompt>,
    preferences: ViewerPreferences,
    phase: ViewerPhase,
    session: Option<Session>,
}

impl<E: PdfEngine, B: StorageBackend> Viewer<E, B> {
    /// Viewer that logs notifications and cancels every note prompt.
    pub fn new(engine: E, store: AnnotationStore<B>) -> Self {
        Self {
            engine,
            store,
            notifier: Box::new(LogNotifier),
            prompt: Box::new(ScriptedPrompt::declining()),
            preferences: ViewerPreferences::default(),
            phase: ViewerPhase::Closed,
            session: None,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_prompt(mut self, prompt: impl NotePrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn with_preferences(mut self, preferences: ViewerPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> &AnnotationStore<B> {
        &self.store
    }

    pub fn phase(&self) -> &ViewerPhase {
        &self.phase
    }

    pub fn state(&self) -> Option<&ViewerState> {
        self.session.as_ref().map(|session| &session.state)
    }

    /// All in-memory annotations of the open document, saved or not.
    pub fn annotations(&self) -> &[Annotation] {
        self.session.as_ref().map(|session| session.annotations.as_slice()).unwrap_or_default()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.unsaved)
    }

    pub fn page_image(&self) -> Option<&RgbaImage> {
        self.session.as_ref().map(|session| &session.page)
    }

    pub fn overlay_image(&self) -> Option<&RgbaImage> {
        self.session.as_ref().map(|session| session.overlay.image())
    }

    /// The overlay scene for the current page.
    pub fn scene(&self) -> Option<OverlayScene> {
        self.session.as_ref().map(Session::scene)
    }

    pub fn composite(&self) -> Option<RgbaImage> {
        self.session.as_ref().map(|session| compose(&session.page, session.overlay.image()))
    }

    /// Opens a document, restores its saved annotations and renders page 1.
    ///
    /// Any previously open document is closed first, discarding unsaved
    /// annotations.
    pub fn load(
        &mut self,
        source: impl Into<OpenSource>,
        document_id: DocumentId,
    ) -> Result<(), ViewerError> {
        self.close();
        self.phase = ViewerPhase::Loading;
        log::debug!("loading {document_id}");

        let handle = match self.engine.open(source.into()) {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail_load(&document_id, err)),
        };

        let page_count = match self.engine.page_count(handle) {
            Ok(count) => count,
            Err(err) => {
                self.release(handle);
                return Err(self.fail_load(&document_id, err));
            }
        };

        let annotations = self.restore_annotations(&document_id);
        let mut session = Session {
            handle,
            state: ViewerState::new(document_id.clone(), page_count, &self.preferences),
            annotations,
            gesture: GestureTracker::new(),
            page: RgbaImage::new(1, 1),
            overlay: ImageSurface::new(1, 1),
            unsaved: false,
        };

        if let Err(err) = session.render_page(&self.engine) {
            self.release(handle);
            return Err(self.fail_load(&document_id, err));
        }

        log::info!(
            "opened {document_id}: {page_count} page(s), {} annotation(s)",
            session.annotations.len()
        );
        self.session = Some(session);
        self.phase = ViewerPhase::Ready;
        Ok(())
    }

    /// Discards the viewer state and returns to `Closed`.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if session.unsaved {
                log::warn!("closing {} with unsaved annotations", session.state.document_id);
            }
            self.release(session.handle);
        }
        self.phase = ViewerPhase::Closed;
    }

    pub fn previous_page(&mut self) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::PreviousPage)
    }

    pub fn next_page(&mut self) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::NextPage)
    }

    pub fn go_to_page(&mut self, page: u32) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::GoToPage { page })
    }

    pub fn zoom_in(&mut self) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::ZoomIn)
    }

    pub fn zoom_out(&mut self) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::ZoomOut)
    }

    pub fn set_tool(&mut self, tool: Tool) -> Result<bool, ViewerError> {
        self.dispatch(ViewerAction::SetTool { tool })
    }

    /// Applies a navigation, zoom or tool action and re-renders as needed.
    ///
    /// Returns `Ok(false)` for no-ops, including any action while no
    /// document is ready.
    pub fn dispatch(&mut self, action: ViewerAction) -> Result<bool, ViewerError> {
        if self.phase != ViewerPhase::Ready {
            return Ok(false);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };

        if !apply_viewer_action(&mut session.state, action) {
            return Ok(false);
        }
        session.gesture.reset();

        if matches!(action, ViewerAction::SetTool { .. }) {
            session.redraw_overlay();
            return Ok(true);
        }

        if let Err(err) = session.render_page(&self.engine) {
            self.fail_render(&err);
            return Err(ViewerError::Render(err));
        }

        Ok(true)
    }

    pub fn pointer_down(&mut self, point: PagePoint) {
        if let Some(session) = self.ready_session() {
            let tool = session.state.active_tool;
            session.gesture.start(tool, point);
        }
    }

    /// Paints an uncommitted preview while a highlight drag is in progress.
    pub fn pointer_move(&mut self, point: PagePoint) {
        let Some(session) = self.ready_session() else {
            return;
        };

        if let GestureOutcome::Preview { start, current } =
            session.gesture.update(session.state.active_tool, point)
        {
            session.scene().with_preview(start, current).paint(&mut session.overlay);
        }
    }

    /// Ends the gesture, committing and returning the new annotation, if any.
    pub fn pointer_up(&mut self, point: PagePoint) -> Option<Annotation> {
        if self.phase != ViewerPhase::Ready {
            return None;
        }
        let session = self.session.as_mut()?;

        let outcome = session.gesture.finish(
            session.state.active_tool,
            session.state.current_page,
            point,
            &mut *self.prompt,
        );

        match outcome {
            GestureOutcome::Committed(annotation) => {
                session.annotations.push(annotation.clone());
                session.unsaved = true;
                session.redraw_overlay();
                log::debug!("committed {:?} on page {}", annotation.kind(), annotation.page_index());
                Some(annotation)
            }
            GestureOutcome::Cancelled => {
                // Drop any preview left behind by the drag.
                session.redraw_overlay();
                None
            }
            _ => None,
        }
    }

    /// Replaces the persisted set with the full in-memory list.
    pub fn save(&mut self) -> Result<(), ViewerError> {
        let Some(session) = self.session.as_mut() else {
            return Err(ViewerError::NoDocument);
        };

        match self.store.save_all(&session.state.document_id, &session.annotations) {
            Ok(()) => {
                session.unsaved = false;
                let message = format!("Saved {} annotation(s)", session.annotations.len());
                self.notifier.notify(Severity::Success, &message);
                Ok(())
            }
            Err(err) => {
                log::error!("saving annotations for {} failed: {err}", session.state.document_id);
                self.notifier.notify(Severity::Error, &format!("Could not save annotations: {err}"));
                Err(ViewerError::StorageWrite(err))
            }
        }
    }

    fn ready_session(&mut self) -> Option<&mut Session> {
        if self.phase != ViewerPhase::Ready {
            return None;
        }
        self.session.as_mut()
    }

    fn restore_annotations(&mut self, document_id: &DocumentId) -> Vec<Annotation> {
        match self.store.try_load(document_id) {
            Ok(annotations) => annotations.unwrap_or_default(),
            Err(err) => {
                let err = ViewerError::StorageRead(err);
                log::warn!("{err}; starting {document_id} without annotations");
                self.notifier.notify(Severity::Warning, "Saved annotations could not be restored");
                Vec::new()
            }
        }
    }

    fn fail_load(&mut self, document_id: &DocumentId, err: PdfEngineError) -> ViewerError {
        let message = err.to_string();
        log::error!("failed to load {document_id}: {message}");
        self.notifier.notify(Severity::Error, &format!("Could not open document: {message}"));
        self.phase = ViewerPhase::Error(message.clone());
        ViewerError::DocumentLoad(message)
    }

    /// Drops the session so the viewer stays inert until the next `load`.
    fn fail_render(&mut self, err: &PdfEngineError) {
        let message = err.to_string();
        log::error!("render failed: {message}");
        self.notifier.notify(Severity::Error, &format!("Could not render page: {message}"));

        if let Some(session) = self.session.take() {
            if session.unsaved {
                log::warn!("discarding unsaved annotations for {}", session.state.document_id);
            }
            self.release(session.handle);
        }
        self.phase = ViewerPhase::Error(message);
    }

    fn release(&mut self, handle: DocumentHandle) {
        if let Err(err) = self.engine.close(handle) {
            log::debug!("closing handle {} failed: {err}", handle.raw());
        }
    }
}
