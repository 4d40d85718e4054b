//! Session states — each variant carries exactly the fields collected so far.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a user currently is in the conversation.
///
/// Progresses linearly: Idle → AwaitingFile → AwaitingFileCount →
/// AwaitingPerFileCount → AwaitingNamePrefix → AwaitingFileBaseName → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationPhase {
    Idle,
    AwaitingFile,
    AwaitingFileCount,
    AwaitingPerFileCount,
    AwaitingNamePrefix,
    AwaitingFileBaseName,
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingFile => "awaiting_file",
            Self::AwaitingFileCount => "awaiting_file_count",
            Self::AwaitingPerFileCount => "awaiting_per_file_count",
            Self::AwaitingNamePrefix => "awaiting_name_prefix",
            Self::AwaitingFileBaseName => "awaiting_file_base_name",
        };
        write!(f, "{s}")
    }
}

/// Collected fields of an in-progress session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFile,
    AwaitingFileCount {
        numbers: Vec<String>,
    },
    AwaitingPerFileCount {
        numbers: Vec<String>,
        file_count: NonZeroUsize,
    },
    AwaitingNamePrefix {
        numbers: Vec<String>,
        file_count: NonZeroUsize,
        per_file: NonZeroUsize,
    },
    AwaitingFileBaseName {
        numbers: Vec<String>,
        file_count: NonZeroUsize,
        per_file: NonZeroUsize,
        name_prefix: String,
    },
}

impl SessionState {
    pub fn phase(&self) -> ConversationPhase {
        match self {
            Self::AwaitingFile => ConversationPhase::AwaitingFile,
            Self::AwaitingFileCount { .. } => ConversationPhase::AwaitingFileCount,
            Self::AwaitingPerFileCount { .. } => ConversationPhase::AwaitingPerFileCount,
            Self::AwaitingNamePrefix { .. } => ConversationPhase::AwaitingNamePrefix,
            Self::AwaitingFileBaseName { .. } => ConversationPhase::AwaitingFileBaseName,
        }
    }

    /// Uploaded numbers, once the file step is done.
    pub fn numbers(&self) -> Option<&[String]> {
        match self {
            Self::AwaitingFile => None,
            Self::AwaitingFileCount { numbers }
            | Self::AwaitingPerFileCount { numbers, .. }
            | Self::AwaitingNamePrefix { numbers, .. }
            | Self::AwaitingFileBaseName { numbers, .. } => Some(numbers),
        }
    }
}

/// One user's in-progress conversation.
#[derive(Debug, Clone)]
pub struct Session {
    /// Correlates log lines of a single run through the flow.
    pub id: Uuid,
    pub state: SessionState,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// A fresh session waiting for the numbers file.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::AwaitingFile,
            last_activity: Utc::now(),
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.state.phase()
    }

    /// Replace the state and refresh the activity timestamp.
    pub fn advance(&mut self, next: SessionState) {
        self.state = next;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the session has been idle for at least `max_idle`.
    pub fn is_idle_for(&self, max_idle: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_activity >= max_idle
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
