//! Per-file decision state machine
//!
//! `step` is a pure transition function: given the current state, the file
//! being decided and one line of user input, it returns the next state and
//! the effect the caller must carry out (ask for more text, re-classify,
//! or finish with an outcome). Nothing here touches the terminal, the
//! network or the cache.
//!
//! ```text
//! Presenting ──m/""──────────────▶ Done(Move suggested)
//!     │ ──d──▶ AwaitingDescription ──text──▶ Presenting + Reclassify
//!     │ ──a──────────────────────────────▶ Presenting + Reclassify(content)
//!     │ ──r──▶ AwaitingFolder  ──path/""──▶ Done(Move)
//!     │ ──n──▶ AwaitingName    ──name/""──▶ Done(Move)
//!     │ ──c──▶ AwaitingNewFolder ──path──▶ Done(Move) / ""──▶ Done(Skip)
//!     │ ──p / other──▶ Done(Skip)
//!     └ ──q / EOF──▶ Done(Quit)
//! ```

use crate::classifier::Suggestion;
use crate::drive::folder::path_segments;

/// User action at the `Presenting` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Accept,
    Describe,
    Analyze,
    RenameFolder,
    RenameName,
    CreateFolder,
    Skip,
    Quit,
    Invalid(String),
}

impl Action {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "" | "m" => Self::Accept,
            "d" => Self::Describe,
            "a" => Self::Analyze,
            "r" => Self::RenameFolder,
            "n" => Self::RenameName,
            "c" => Self::CreateFolder,
            "p" => Self::Skip,
            "q" => Self::Quit,
            other => Self::Invalid(other.to_string()),
        }
    }
}

/// Why a file was skipped; all count as one skip in the run totals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UserSkipped,
    EmptyFolderName,
    InvalidInput(String),
    ClassificationFailed,
}

/// Final result of deciding one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Move { folder: String, name: String },
    Skip(SkipReason),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionState {
    Presenting,
    AwaitingDescription,
    AwaitingFolder,
    AwaitingName,
    AwaitingNewFolder,
    Done(DecisionOutcome),
}

/// Free-text question the caller has to ask next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPrompt {
    Description,
    FolderPath { default: String },
    FileName { default: String },
    NewFolder,
}

/// Re-classification the caller has to run before presenting again
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reclassify {
    Description(String),
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask for an action again, optionally after printing a notice
    AskAction { notice: Option<&'static str> },
    AskText(TextPrompt),
    Reclassify(Reclassify),
    Finish(DecisionOutcome),
}

/// One line read from the user, or end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Line(&'a str),
    Eof,
}

/// The file being decided and its current suggestion
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub original_name: &'a str,
    pub suggestion: &'a Suggestion,
}

impl DecisionContext<'_> {
    fn target_name(&self) -> String {
        self.suggestion.target_name(self.original_name).to_string()
    }

    fn suggested_folder(&self) -> String {
        self.suggestion.suggested_folder.clone()
    }

    fn finish_move(&self, folder: String, name: String) -> (DecisionState, Effect) {
        finish(DecisionOutcome::Move { folder, name })
    }
}

fn finish(outcome: DecisionOutcome) -> (DecisionState, Effect) {
    (DecisionState::Done(outcome.clone()), Effect::Finish(outcome))
}

/// Folder input with surrounding blanks and empty segments removed
fn folder_input(text: &str) -> Option<String> {
    let segments = path_segments(text);
    (!segments.is_empty()).then(|| segments.join("/"))
}

/// Advance the machine by one event
pub fn step(state: &DecisionState, ctx: DecisionContext<'_>, event: Event<'_>) -> (DecisionState, Effect) {
    if let DecisionState::Done(outcome) = state {
        return finish(outcome.clone());
    }

    let line = match event {
        Event::Line(line) => line,
        Event::Eof => return finish(DecisionOutcome::Quit),
    };
    let text = line.trim();

    match state {
        DecisionState::Presenting => match Action::parse(line) {
            Action::Accept => ctx.finish_move(ctx.suggested_folder(), ctx.target_name()),
            Action::Describe => (
                DecisionState::AwaitingDescription,
                Effect::AskText(TextPrompt::Description),
            ),
            Action::Analyze => (
                DecisionState::Presenting,
                Effect::Reclassify(Reclassify::Content),
            ),
            Action::RenameFolder => (
                DecisionState::AwaitingFolder,
                Effect::AskText(TextPrompt::FolderPath {
                    default: ctx.suggested_folder(),
                }),
            ),
            Action::RenameName => (
                DecisionState::AwaitingName,
                Effect::AskText(TextPrompt::FileName {
                    default: ctx.target_name(),
                }),
            ),
            Action::CreateFolder => (
                DecisionState::AwaitingNewFolder,
                Effect::AskText(TextPrompt::NewFolder),
            ),
            Action::Skip => finish(DecisionOutcome::Skip(SkipReason::UserSkipped)),
            Action::Quit => finish(DecisionOutcome::Quit),
            Action::Invalid(input) => finish(DecisionOutcome::Skip(SkipReason::InvalidInput(input))),
        },

        DecisionState::AwaitingDescription => {
            if text.is_empty() {
                (
                    DecisionState::Presenting,
                    Effect::AskAction {
                        notice: Some("Empty description, keeping the current suggestion."),
                    },
                )
            } else {
                (
                    DecisionState::Presenting,
                    Effect::Reclassify(Reclassify::Description(text.to_string())),
                )
            }
        }

        DecisionState::AwaitingFolder => {
            let folder = folder_input(text).unwrap_or_else(|| ctx.suggested_folder());
            ctx.finish_move(folder, ctx.target_name())
        }

        DecisionState::AwaitingName => {
            let name = if text.is_empty() {
                ctx.target_name()
            } else {
                text.to_string()
            };
            ctx.finish_move(ctx.suggested_folder(), name)
        }

        DecisionState::AwaitingNewFolder => match folder_input(text) {
            Some(folder) => ctx.finish_move(folder, ctx.target_name()),
            None => finish(DecisionOutcome::Skip(SkipReason::EmptyFolderName)),
        },

        DecisionState::Done(_) => unreachable!("handled above"),
    }
}
