//! Pure state transitions for text and document input.
//!
//! Nothing here performs I/O; the engine applies the returned `Step`.

use std::num::NonZeroUsize;

use crate::cards::{OutputFile, render_files};
use crate::error::{CardError, InputError};

use super::input;
use super::prompts;
use super::state::SessionState;

/// Everything needed to produce the output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub numbers: Vec<String>,
    pub file_count: NonZeroUsize,
    pub per_file: NonZeroUsize,
    pub name_prefix: String,
    pub file_base_name: String,
}

impl Submission {
    /// Partition the numbers and render one card file per chunk.
    pub fn render(&self) -> Result<Vec<OutputFile>, CardError> {
        render_files(
            &self.numbers,
            self.file_count.get(),
            self.per_file.get(),
            &self.name_prefix,
            &self.file_base_name,
        )
    }
}

/// Outcome of feeding one input to a session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input accepted; move to `next` and send `prompt`.
    Advanced {
        next: SessionState,
        prompt: &'static str,
    },
    /// Input rejected; stay in `state` and report `error`.
    Rejected {
        state: SessionState,
        error: InputError,
    },
    /// The state does not accept this kind of input.
    Ignored(SessionState),
    /// Final input accepted; the session is over.
    Completed(Submission),
}

/// Apply a text message to the current state.
pub fn on_text(state: SessionState, text: &str) -> Step {
    match state {
        SessionState::AwaitingFile => Step::Ignored(state),

        SessionState::AwaitingFileCount { numbers } => match input::parse_count(text) {
            Ok(file_count) => Step::Advanced {
                next: SessionState::AwaitingPerFileCount {
                    numbers,
                    file_count,
                },
                prompt: prompts::ASK_PER_FILE_COUNT,
            },
            Err(error) => Step::Rejected {
                state: SessionState::AwaitingFileCount { numbers },
                error,
            },
        },

        SessionState::AwaitingPerFileCount {
            numbers,
            file_count,
        } => {
            let checked = input::parse_count(text).and_then(|per_file| {
                input::check_total(numbers.len(), file_count, per_file).map(|()| per_file)
            });
            match checked {
                Ok(per_file) => Step::Advanced {
                    next: SessionState::AwaitingNamePrefix {
                        numbers,
                        file_count,
                        per_file,
                    },
                    prompt: prompts::ASK_NAME_PREFIX,
                },
                Err(error) => Step::Rejected {
                    state: SessionState::AwaitingPerFileCount {
                        numbers,
                        file_count,
                    },
                    error,
                },
            }
        }

        SessionState::AwaitingNamePrefix {
            numbers,
            file_count,
            per_file,
        } => Step::Advanced {
            next: SessionState::AwaitingFileBaseName {
                numbers,
                file_count,
                per_file,
                name_prefix: input::name_prefix(text),
            },
            prompt: prompts::ASK_FILE_BASE_NAME,
        },

        SessionState::AwaitingFileBaseName {
            numbers,
            file_count,
            per_file,
            name_prefix,
        } => match input::file_base_name(text) {
            Ok(file_base_name) => Step::Completed(Submission {
                numbers,
                file_count,
                per_file,
                name_prefix,
                file_base_name,
            }),
            Err(error) => Step::Rejected {
                state: SessionState::AwaitingFileBaseName {
                    numbers,
                    file_count,
                    per_file,
                    name_prefix,
                },
                error,
            },
        },
    }
}

/// Apply downloaded document content to the current state.
///
/// The extension has already been checked by the caller.
pub fn on_document(state: SessionState, content: &[u8]) -> Step {
    match state {
        SessionState::AwaitingFile => match input::parse_numbers(content) {
            Ok(numbers) => Step::Advanced {
                next: SessionState::AwaitingFileCount { numbers },
                prompt: prompts::ASK_FILE_COUNT,
            },
            Err(error) => Step::Rejected { state, error },
        },
        other => Step::Ignored(other),
    }
}
