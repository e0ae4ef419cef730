//! Typed overlay scene built from the annotation model.
//!
//! The overlay is never patched incrementally: every redraw clears the
//! surface and repaints the scene for the current page in insertion order.

use doc_model::{annotations_on_page, Annotation, Color, PagePoint};
use image::{Pixel, Rgba, RgbaImage};

/// Highlights dragged along a single line still need visible thickness.
pub const HIGHLIGHT_MIN_THICKNESS: f32 = 14.0;
pub const NOTE_MARKER_SIZE: f32 = 12.0;
const PREVIEW_OUTLINE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanned by a drag, padded on each axis to `min_extent`.
    pub fn spanning(start: PagePoint, end: PagePoint, min_extent: f32) -> Self {
        let (x, width) = padded_span(start.x, end.x, min_extent);
        let (y, height) = padded_span(start.y, end.y, min_extent);

        Self { x, y, width, height }
    }
}

fn padded_span(a: f32, b: f32, min_extent: f32) -> (f32, f32) {
    let start = a.min(b);
    let extent = (a - b).abs();

    if extent < min_extent {
        (start - (min_extent - extent) / 2.0, min_extent)
    } else {
        (start, extent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Highlight { rect: Rect, color: Color },
    Note { anchor: PagePoint, text: String },
    /// Uncommitted stroke shown while a highlight drag is in progress.
    Preview { rect: Rect },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayScene {
    items: Vec<SceneItem>,
}

impl OverlayScene {
    pub fn for_page(annotations: &[Annotation], page_index: u32) -> Self {
        let items = annotations_on_page(annotations, page_index)
            .map(|annotation| match annotation {
                Annotation::Highlight { start, end, color, .. } => SceneItem::Highlight {
                    rect: Rect::spanning(*start, *end, HIGHLIGHT_MIN_THICKNESS),
                    color: *color,
                },
                Annotation::Note { anchor, text, .. } => {
                    SceneItem::Note { anchor: *anchor, text: text.clone() }
                }
            })
            .collect();

        Self { items }
    }

    pub fn with_preview(mut self, start: PagePoint, current: PagePoint) -> Self {
        self.items.push(SceneItem::Preview {
            rect: Rect::spanning(start, current, HIGHLIGHT_MIN_THICKNESS),
        });
        self
    }

    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clears `surface` and paints every item in order.
    pub fn paint(&self, surface: &mut dyn Surface) {
        surface.clear();

        for item in &self.items {
            match item {
                SceneItem::Highlight { rect, color } => surface.fill_rect(*rect, *color),
                SceneItem::Note { anchor, .. } => surface.fill_rect(
                    Rect::new(anchor.x, anchor.y, NOTE_MARKER_SIZE, NOTE_MARKER_SIZE),
                    Color::NOTE_MARKER,
                ),
                SceneItem::Preview { rect } => {
                    surface.stroke_rect(*rect, Color::PREVIEW, PREVIEW_OUTLINE)
                }
            }
        }
    }
}

/// Drawing target for the overlay.
pub trait Surface {
    fn clear(&mut self);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f32);
}

/// Transparent raster overlay, alpha-blended on every fill.
#[derive(Debug, Clone)]
pub struct ImageSurface {
    image: RgbaImage,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Pixel span covered by `rect`, clipped to the surface.
    fn pixel_bounds(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let clip = |value: f32, max: u32| value.max(0.0).min(max as f32) as u32;

        let x0 = clip(rect.x.floor(), self.image.width());
        let y0 = clip(rect.y.floor(), self.image.height());
        let x1 = clip((rect.x + rect.width).ceil(), self.image.width());
        let y1 = clip((rect.y + rect.height).ceil(), self.image.height());

        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

impl Surface for ImageSurface {
    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(rect) else {
            return;
        };

        let paint = Rgba(color.to_rgba());
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.get_pixel_mut(x, y).blend(&paint);
            }
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f32) {
        let t = thickness.max(1.0).min(rect.width.min(rect.height) / 2.0).max(1.0);

        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, t), color);
        self.fill_rect(Rect::new(rect.x, rect.y + rect.height - t, rect.width, t), color);
        self.fill_rect(Rect::new(rect.x, rect.y + t, t, rect.height - 2.0 * t), color);
        self.fill_rect(
            Rect::new(rect.x + rect.width - t, rect.y + t, t, rect.height - 2.0 * t),
            color,
        );
    }
}

/// Page raster with the overlay composited on top.
pub fn compose(page: &RgbaImage, overlay: &RgbaImage) -> RgbaImage {
    let mut composite = page.clone();
    image::imageops::overlay(&mut composite, overlay, 0, 0);
    composite
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<String>,
    }

    impl Surface for RecordingSurface {
        fn clear(&mut self) {
            self.calls.push("clear".to_owned());
        }

        fn fill_rect(&mut self, rect: Rect, _color: Color) {
            self.calls.push(format!("fill {} {}", rect.x, rect.y));
        }

        fn stroke_rect(&mut self, rect: Rect, _color: Color, _thickness: f32) {
            self.calls.push(format!("stroke {} {}", rect.x, rect.y));
        }
    }

    fn two_page_annotations() -> Vec<Annotation> {
        vec![
            Annotation::highlight(1, PagePoint::new(10.0, 10.0), PagePoint::new(50.0, 10.0)),
            Annotation::note(2, PagePoint::new(30.0, 40.0), "page two"),
            Annotation::note(1, PagePoint::new(5.0, 5.0), "page one"),
        ]
    }

    #[test]
    fn scene_contains_only_current_page_items() {
        let scene = OverlayScene::for_page(&two_page_annotations(), 2);

        assert_eq!(
            scene.items(),
            &[SceneItem::Note { anchor: PagePoint::new(30.0, 40.0), text: "page two".to_owned() }]
        );
    }

    #[test]
    fn paint_clears_first_then_draws_in_insertion_order() {
        let scene = OverlayScene::for_page(&two_page_annotations(), 1)
            .with_preview(PagePoint::new(0.0, 100.0), PagePoint::new(20.0, 100.0));
        let mut surface = RecordingSurface::default();

        scene.paint(&mut surface);

        assert_eq!(surface.calls, vec!["clear", "fill 10 3", "fill 5 5", "stroke 0 93"]);
    }

    #[test]
    fn horizontal_drag_gets_minimum_thickness() {
        let rect = Rect::spanning(PagePoint::new(50.0, 10.0), PagePoint::new(10.0, 10.0), 14.0);
        assert_eq!(rect, Rect::new(10.0, 3.0, 40.0, 14.0));
    }

    #[test]
    fn vertical_drag_gets_minimum_width() {
        let rect = Rect::spanning(PagePoint::new(20.0, 10.0), PagePoint::new(20.0, 60.0), 14.0);
        assert_eq!(rect, Rect::new(13.0, 10.0, 14.0, 50.0));
    }

    #[test]
    fn image_surface_blends_highlight_and_clears() {
        let mut surface = ImageSurface::new(60, 30);
        surface.fill_rect(Rect::new(10.0, 5.0, 20.0, 10.0), Color::HIGHLIGHT);

        let alpha = surface.image().get_pixel(15, 8)[3];
        assert!(alpha.abs_diff(Color::HIGHLIGHT.a) <= 1, "unexpected alpha {alpha}");
        assert_eq!(surface.image().get_pixel(40, 8)[3], 0);

        surface.clear();
        assert!(surface.image().pixels().all(|pixel| pixel[3] == 0));
    }

    #[test]
    fn fills_outside_surface_are_clipped() {
        let mut surface = ImageSurface::new(10, 10);
        surface.fill_rect(Rect::new(-5.0, -5.0, 8.0, 8.0), Color::NOTE_MARKER);
        surface.fill_rect(Rect::new(50.0, 50.0, 8.0, 8.0), Color::NOTE_MARKER);

        assert_eq!(surface.image().get_pixel(2, 2)[3], 255);
        assert_eq!(surface.image().get_pixel(3, 3)[3], 0);
    }

    #[test]
    fn compose_tints_page_under_highlight() {
        let page = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        let mut overlay = ImageSurface::new(20, 20);
        overlay.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::new(0, 0, 255, 255));

        let composite = compose(&page, overlay.image());

        assert_eq!(*composite.get_pixel(5, 5), Rgba([0, 0, 255, 255]));
        assert_eq!(*composite.get_pixel(15, 15), Rgba([255, 255, 255, 255]));
    }
}
