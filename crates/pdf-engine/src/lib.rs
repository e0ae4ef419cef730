//! Document source for the viewer: opens PDFs and rasterizes single pages.

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const MAX_PARENT_DEPTH: usize = 16;
/// Largest raster a single page render may allocate (256 MiB of RGBA).
pub const MAX_VIEWPORT_PIXELS: u64 = 64 * 1024 * 1024;
const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// For engines implemented outside this crate.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Scale and pixel dimensions used to rasterize one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width_px: u32,
    pub height_px: u32,
}

impl Viewport {
    pub fn for_page(size: PageSize, scale: f32) -> Self {
        let scale = if scale <= 0.0 { 1.0 } else { scale };

        Self {
            scale,
            width_px: (size.width_pt * scale).round().max(1.0) as u32,
            height_px: (size.height_pt * scale).round().max(1.0) as u32,
        }
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width_px) * u64::from(self.height_px)
    }
}

/// `page_index` is zero-based here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error(
        "page raster of {width_px}x{height_px} exceeds the {limit} pixel limit",
        limit = MAX_VIEWPORT_PIXELS
    )]
    ViewportTooLarge { width_px: u32, height_px: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// A source of decoded documents whose pages can be rasterized.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    fn viewport(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<Viewport, PdfEngineError> {
        let size = self.page_size(handle, request.page_index)?;
        Ok(Viewport::for_page(size, request.scale))
    }
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

/// Parses the page tree with lopdf and rasterizes blank pages of the right
/// geometry. Content streams are not interpreted.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = media_box(&doc, dict)
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Resolves `MediaBox`, walking up `Parent` links for inherited boxes.
fn media_box(doc: &Document, page: &Dictionary) -> Option<PageSize> {
    let mut current = page;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(size) = current
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| size_from_box(array))
        {
            return Some(size);
        }

        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn size_from_box(array: &[Object]) -> Option<PageSize> {
    if array.len() != 4 {
        return None;
    }

    let x0 = number(&array[0])?;
    let y0 = number(&array[1])?;
    let x1 = number(&array[2])?;
    let y1 = number(&array[3])?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened document handle {} with {} page(s)", handle.raw(), page_sizes.len());
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let viewport = self.viewport(handle, request)?;
        let (width, height) = (viewport.width_px, viewport.height_px);
        if viewport.pixel_count() > MAX_VIEWPORT_PIXELS {
            return Err(PdfEngineError::ViewportTooLarge { width_px: width, height_px: height });
        }

        let mut image = RgbaImage::from_pixel(width, height, PAGE_BACKGROUND);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, PAGE_BORDER);
                image.put_pixel(x, height - 1, PAGE_BORDER);
            }
            for y in 0..height {
                image.put_pixel(0, y, PAGE_BORDER);
                image.put_pixel(width - 1, y, PAGE_BORDER);
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_blank(engine: &mut LopdfEngine, pages: u32) -> DocumentHandle {
        let bytes = fixtures::blank_pdf(pages).expect("fixture should build");
        engine.open(OpenSource::Bytes(bytes)).expect("open should succeed")
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = open_blank(&mut engine, 3);

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 3);
    }

    #[test]
    fn reads_per_page_media_boxes() {
        let mut engine = LopdfEngine::new();
        let sizes = [
            PageSize { width_pt: 200.0, height_pt: 100.0 },
            PageSize { width_pt: 300.0, height_pt: 400.0 },
        ];
        let bytes = fixtures::sized_pdf(&sizes).expect("fixture should build");
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        assert_eq!(engine.page_size(handle, 1).expect("size should resolve"), sizes[1]);
    }

    #[test]
    fn render_page_uses_scaled_viewport() {
        let mut engine = LopdfEngine::new();
        let bytes = fixtures::sized_pdf(&[PageSize { width_pt: 100.0, height_pt: 50.0 }])
            .expect("fixture should build");
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        let image = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 1.2 })
            .expect("render should succeed");

        assert_eq!((image.width(), image.height()), (120, 60));
        assert_eq!(*image.get_pixel(0, 0), PAGE_BORDER);
        assert_eq!(*image.get_pixel(60, 30), PAGE_BACKGROUND);
    }

    #[test]
    fn page_out_of_range_is_reported() {
        let mut engine = LopdfEngine::new();
        let handle = open_blank(&mut engine, 1);

        let err = engine
            .render_page(handle, RenderRequest { page_index: 4, scale: 1.0 })
            .expect_err("render should fail");

        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 4, page_count: 1 }));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let mut engine = LopdfEngine::new();
        let result = engine.open(OpenSource::Bytes(b"definitely not a pdf".to_vec()));

        assert!(result.is_err());
    }

    #[test]
    fn missing_file_fails_with_io_error() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::from(Path::new("/nonexistent/missing.pdf")))
            .expect_err("open should fail");

        assert!(matches!(err, PdfEngineError::Io(_)));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn close_releases_handle() {
        let mut engine = LopdfEngine::new();
        let handle = open_blank(&mut engine, 1);

        engine.close(handle).expect("close should succeed");
        assert!(engine.page_count(handle).is_err());
    }

    #[test]
    fn oversized_page_is_refused_before_allocating() {
        let mut engine = LopdfEngine::new();
        let bytes = fixtures::sized_pdf(&[PageSize { width_pt: 14400.0, height_pt: 14400.0 }])
            .expect("fixture should build");
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        let err = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 3.0 })
            .expect_err("render should be refused");

        assert!(matches!(
            err,
            PdfEngineError::ViewportTooLarge { width_px: 43200, height_px: 43200 }
        ));
    }

    #[test]
    fn encrypt_bytes_inside_content_do_not_block_opening() {
        let mut doc = fixtures::document(&[fixtures::LETTER]);
        doc.add_object(Object::string_literal("/Encrypt"));
        let bytes = fixtures::to_bytes(&mut doc).expect("fixture should serialize");

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");
        assert_eq!(engine.page_count(handle).expect("count should succeed"), 1);
    }

    #[test]
    fn encrypt_entry_in_trailer_is_rejected() {
        let mut doc = fixtures::document(&[fixtures::LETTER]);
        let encrypt_id = doc.add_object(lopdf::dictionary! { "Filter" => "Standard" });
        doc.trailer.set("Encrypt", encrypt_id);
        let bytes = fixtures::to_bytes(&mut doc).expect("fixture should serialize");

        let result = LopdfEngine::new().open(OpenSource::Bytes(bytes));
        assert!(result.is_err());
    }

    #[test]
    fn non_positive_scale_falls_back_to_identity() {
        let viewport = Viewport::for_page(PageSize { width_pt: 10.0, height_pt: 20.0 }, 0.0);
        assert_eq!((viewport.width_px, viewport.height_px), (10, 20));
    }
}
