//! Error types for the vCard splitter bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Card error: {0}")]
    Card(#[from] CardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to download document on channel {name}: {reason}")]
    DownloadFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Partitioning precondition violations.
///
/// The conversation validates counts before partitioning, so these only
/// surface when the card functions are called directly with bad input.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CardError {
    #[error("File count and per-file count must both be positive")]
    ZeroCount,

    #[error("{numbers} numbers cannot fill {file_count} files of {per_file}")]
    CountMismatch {
        numbers: usize,
        file_count: usize,
        per_file: usize,
    },
}

/// User input rejected during the conversation.
///
/// Every variant is recoverable at the conversation layer; whether the
/// session survives depends on the variant (see `InputError::ends_session`).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Document {file_name:?} does not have the required extension")]
    WrongExtension { file_name: String },

    #[error("Uploaded document contains no numbers")]
    EmptyFile,

    #[error("Not a positive integer: {input:?}")]
    InvalidCount { input: String },

    #[error("{uploaded} numbers uploaded, but {file_count} x {per_file} does not match")]
    CountMismatch {
        uploaded: usize,
        file_count: usize,
        per_file: usize,
        expected: Option<usize>,
    },

    #[error("File base name is empty")]
    EmptyBaseName,
}

impl InputError {
    /// Whether this rejection terminates the session instead of re-prompting.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::WrongExtension { .. })
    }
}
