//! Shared data model for the annotation viewer.
//!
//! Holds the persisted annotation records, the transient viewer state and the
//! pure state transitions applied to it. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const MIN_ZOOM_PERCENT: u16 = 50;
pub const MAX_ZOOM_PERCENT: u16 = 300;
pub const ZOOM_STEP_PERCENT: u16 = 20;
pub const DEFAULT_ZOOM_PERCENT: u16 = 120;

/// Identifies a document and keys its persisted annotation set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for a document on disk: `<file name>-<md5 of the path, first 12 hex>`.
    ///
    /// Pass a canonical path so the same file always maps to the same id.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_owned());
        let digest = md5::compute(path.to_string_lossy().as_bytes());
        let hash = format!("{digest:x}");

        Self(format!("{name}-{}", &hash[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overlay-local pixel coordinate, origin at the top-left of the page image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePointError {
    #[error("expected a point as `X,Y`, got `{0}`")]
    Format(String),
    #[error("invalid coordinate `{0}`")]
    Coordinate(String),
}

impl FromStr for PagePoint {
    type Err = ParsePointError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((x, y)) = value.split_once(',') else {
            return Err(ParsePointError::Format(value.to_owned()));
        };

        let parse = |raw: &str| {
            raw.trim()
                .parse::<f32>()
                .ok()
                .filter(|coordinate| coordinate.is_finite())
                .ok_or_else(|| ParsePointError::Coordinate(raw.trim().to_owned()))
        };

        Ok(Self { x: parse(x)?, y: parse(y)? })
    }
}

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Semi-transparent yellow used for every highlight.
    pub const HIGHLIGHT: Color = Color { r: 255, g: 255, b: 0, a: 77 };
    pub const NOTE_MARKER: Color = Color { r: 255, g: 165, b: 0, a: 255 };
    pub const PREVIEW: Color = Color { r: 255, g: 200, b: 0, a: 128 };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Highlight,
    Note,
}

/// One user-created markup object.
///
/// Coordinates are captured in overlay pixels at the zoom active when the
/// annotation was drawn and are never rescaled afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Highlight { page_index: u32, start: PagePoint, end: PagePoint, color: Color },
    Note { page_index: u32, anchor: PagePoint, text: String },
}

impl Annotation {
    pub fn highlight(page_index: u32, start: PagePoint, end: PagePoint) -> Self {
        Self::Highlight { page_index, start, end, color: Color::HIGHLIGHT }
    }

    pub fn note(page_index: u32, anchor: PagePoint, text: impl Into<String>) -> Self {
        Self::Note { page_index, anchor, text: text.into() }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Highlight { .. } => AnnotationKind::Highlight,
            Self::Note { .. } => AnnotationKind::Note,
        }
    }

    /// 1-based page the annotation belongs to.
    pub fn page_index(&self) -> u32 {
        match self {
            Self::Highlight { page_index, .. } | Self::Note { page_index, .. } => *page_index,
        }
    }
}

/// Annotations belonging to `page_index`, in insertion order.
pub fn annotations_on_page(
    annotations: &[Annotation],
    page_index: u32,
) -> impl Iterator<Item = &Annotation> {
    annotations.iter().filter(move |annotation| annotation.page_index() == page_index)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    None,
    Highlight,
    Note,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Highlight => "highlight",
            Self::Note => "note",
        };
        f.write_str(label)
    }
}

/// Display state of a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerPhase {
    Closed,
    Loading,
    Ready,
    /// Document could not be fetched or decoded. Inert until the next load.
    Error(String),
}

/// Transient per-document view state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    pub document_id: DocumentId,
    pub page_count: u32,
    pub current_page: u32,
    pub zoom_percent: u16,
    pub active_tool: Tool,
}

impl ViewerState {
    pub fn new(document_id: DocumentId, page_count: u32, preferences: &ViewerPreferences) -> Self {
        Self {
            document_id,
            page_count: page_count.max(1),
            current_page: 1,
            zoom_percent: clamp_zoom_percent(preferences.initial_zoom_percent),
            active_tool: preferences.default_tool,
        }
    }

    pub fn zoom_scale(&self) -> f32 {
        f32::from(self.zoom_percent) / 100.0
    }
}

pub fn clamp_zoom_percent(percent: u16) -> u16 {
    percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    PreviousPage,
    NextPage,
    GoToPage { page: u32 },
    ZoomIn,
    ZoomOut,
    SetTool { tool: Tool },
}

/// Applies `action` and reports whether anything visible changed.
///
/// Navigation past the first or last page and zooming past the bounds are
/// silent no-ops.
pub fn apply_viewer_action(state: &mut ViewerState, action: ViewerAction) -> bool {
    let before = state.clone();

    match action {
        ViewerAction::PreviousPage => {
            state.current_page = state.current_page.saturating_sub(1).max(1);
        }
        ViewerAction::NextPage => {
            state.current_page = (state.current_page + 1).min(state.page_count);
        }
        ViewerAction::GoToPage { page } => {
            state.current_page = page.clamp(1, state.page_count.max(1));
        }
        ViewerAction::ZoomIn => {
            state.zoom_percent =
                clamp_zoom_percent(state.zoom_percent.saturating_add(ZOOM_STEP_PERCENT));
        }
        ViewerAction::ZoomOut => {
            state.zoom_percent =
                clamp_zoom_percent(state.zoom_percent.saturating_sub(ZOOM_STEP_PERCENT));
        }
        ViewerAction::SetTool { tool } => state.active_tool = tool,
    }

    *state != before
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerPreferences {
    pub initial_zoom_percent: u16,
    pub default_tool: Tool,
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self { initial_zoom_percent: DEFAULT_ZOOM_PERCENT, default_tool: Tool::None }
    }
}
