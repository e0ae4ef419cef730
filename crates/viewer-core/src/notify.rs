//! User-facing feedback collaborators: notifications and the note prompt.

use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Fire-and-forget message surface.
pub trait Notifier {
    fn notify(&mut self, severity: Severity, message: &str);
}

/// Routes notifications into the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Info | Severity::Success => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
    }
}

/// Blocking text prompt used to collect note contents.
///
/// `None` means the user cancelled.
pub trait NotePrompt {
    fn ask(&mut self, message: &str) -> Option<String>;
}

/// Answers prompts from a fixed queue, then cancels.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Option<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self { answers: answers.into_iter().map(|answer| answer.map(Into::into)).collect() }
    }

    /// Prompt that cancels every request.
    pub fn declining() -> Self {
        Self::default()
    }
}

impl NotePrompt for ScriptedPrompt {
    fn ask(&mut self, message: &str) -> Option<String> {
        let answer = self.answers.pop_front().flatten();
        log::debug!("prompt `{message}` answered with {answer:?}");
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_prompt_replays_answers_then_cancels() {
        let mut prompt = ScriptedPrompt::new([Some("first"), None, Some("third")]);

        assert_eq!(prompt.ask("?").as_deref(), Some("first"));
        assert_eq!(prompt.ask("?"), None);
        assert_eq!(prompt.ask("?").as_deref(), Some("third"));
        assert_eq!(prompt.ask("?"), None);
    }

    #[test]
    fn declining_prompt_always_cancels() {
        let mut prompt = ScriptedPrompt::declining();
        assert_eq!(prompt.ask("note?"), None);
    }
}
