//! Press, drag and release handling for the annotation tools.

use crate::notify::NotePrompt;
use doc_model::{Annotation, PagePoint, Tool};

pub const NOTE_PROMPT: &str = "Enter note text";

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// No tool active or no press in progress.
    Ignored,
    Pressed,
    Preview { start: PagePoint, current: PagePoint },
    Committed(Annotation),
    /// The gesture ended without producing an annotation.
    Cancelled,
}

/// Tracks the single in-flight gesture of the pointer device.
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    press: Option<PagePoint>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    pub fn reset(&mut self) {
        self.press = None;
    }

    pub fn start(&mut self, tool: Tool, point: PagePoint) -> GestureOutcome {
        if tool == Tool::None {
            return GestureOutcome::Ignored;
        }

        self.press = Some(point);
        GestureOutcome::Pressed
    }

    /// Only highlight drags produce a live preview.
    pub fn update(&self, tool: Tool, point: PagePoint) -> GestureOutcome {
        match (tool, self.press) {
            (Tool::Highlight, Some(start)) => GestureOutcome::Preview { start, current: point },
            _ => GestureOutcome::Ignored,
        }
    }

    pub fn finish(
        &mut self,
        tool: Tool,
        page_index: u32,
        point: PagePoint,
        prompt: &mut dyn NotePrompt,
    ) -> GestureOutcome {
        let Some(start) = self.press.take() else {
            return GestureOutcome::Ignored;
        };

        match tool {
            Tool::None => GestureOutcome::Ignored,
            Tool::Highlight if start == point => GestureOutcome::Cancelled,
            Tool::Highlight => {
                GestureOutcome::Committed(Annotation::highlight(page_index, start, point))
            }
            Tool::Note => match prompt.ask(NOTE_PROMPT) {
                Some(text) if !text.trim().is_empty() => {
                    GestureOutcome::Committed(Annotation::note(page_index, start, text))
                }
                _ => GestureOutcome::Cancelled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ScriptedPrompt;

    fn point(x: f32, y: f32) -> PagePoint {
        PagePoint::new(x, y)
    }

    #[test]
    fn no_tool_never_commits() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::new([Some("unused")]);

        assert_eq!(tracker.start(Tool::None, point(1.0, 1.0)), GestureOutcome::Ignored);
        assert_eq!(tracker.update(Tool::None, point(5.0, 5.0)), GestureOutcome::Ignored);
        assert_eq!(
            tracker.finish(Tool::None, 1, point(5.0, 5.0), &mut prompt),
            GestureOutcome::Ignored
        );
    }

    #[test]
    fn highlight_drag_previews_then_commits() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::declining();

        tracker.start(Tool::Highlight, point(10.0, 10.0));
        assert_eq!(
            tracker.update(Tool::Highlight, point(30.0, 10.0)),
            GestureOutcome::Preview { start: point(10.0, 10.0), current: point(30.0, 10.0) }
        );

        let outcome = tracker.finish(Tool::Highlight, 1, point(50.0, 10.0), &mut prompt);
        assert_eq!(
            outcome,
            GestureOutcome::Committed(Annotation::highlight(1, point(10.0, 10.0), point(50.0, 10.0)))
        );
        assert!(!tracker.is_pressed());
    }

    #[test]
    fn click_without_drag_commits_no_highlight() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::declining();

        tracker.start(Tool::Highlight, point(10.0, 10.0));
        assert_eq!(
            tracker.finish(Tool::Highlight, 1, point(10.0, 10.0), &mut prompt),
            GestureOutcome::Cancelled
        );
    }

    #[test]
    fn note_is_anchored_at_press_point() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::new([Some("remember this")]);

        tracker.start(Tool::Note, point(7.0, 8.0));
        assert_eq!(tracker.update(Tool::Note, point(20.0, 20.0)), GestureOutcome::Ignored);

        let outcome = tracker.finish(Tool::Note, 3, point(20.0, 20.0), &mut prompt);
        assert_eq!(
            outcome,
            GestureOutcome::Committed(Annotation::note(3, point(7.0, 8.0), "remember this"))
        );
    }

    #[test]
    fn cancelled_or_blank_note_is_dropped() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::new([None, Some("   ")]);

        for _ in 0..2 {
            tracker.start(Tool::Note, point(1.0, 1.0));
            assert_eq!(
                tracker.finish(Tool::Note, 1, point(1.0, 1.0), &mut prompt),
                GestureOutcome::Cancelled
            );
        }
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut tracker = GestureTracker::new();
        let mut prompt = ScriptedPrompt::declining();

        assert_eq!(
            tracker.finish(Tool::Highlight, 1, point(3.0, 3.0), &mut prompt),
            GestureOutcome::Ignored
        );
    }
}
