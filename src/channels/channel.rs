//! Transport-facing types: inbound events and the `Channel` trait.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// An uploaded document, referenced but not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Name as supplied by the sender (empty if the transport had none).
    pub file_name: String,
    /// Transport-specific handle used by `Channel::fetch_document`.
    pub file_id: String,
}

/// What a user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/start` — begin (or restart) a conversation.
    Start,
    /// `/cancel` — abandon the current conversation.
    Cancel,
    /// `/startbot` — open the availability gate.
    Enable,
    /// `/stopbot` — close the availability gate.
    Disable,
    Document(DocumentRef),
    Text(String),
}

impl InboundEvent {
    /// Classify a text message. Unknown `/commands` yield `None`.
    pub fn from_text(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Some(Self::Text(text.to_string()));
        };

        let command = command.split_whitespace().next().unwrap_or_default();
        // Group chats address commands as `/start@bot_name`.
        let command = command.split('@').next().unwrap_or_default();

        match command {
            "start" => Some(Self::Start),
            "cancel" => Some(Self::Cancel),
            "startbot" => Some(Self::Enable),
            "stopbot" => Some(Self::Disable),
            _ => None,
        }
    }

    /// Short name for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Document(_) => "document",
            Self::Text(_) => "text",
        }
    }
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel that produced the message (e.g. "telegram").
    pub channel: String,
    /// Stable identity of the sender; sessions are keyed on it.
    pub user_id: String,
    pub user_name: Option<String>,
    pub event: InboundEvent,
    /// Transport data needed to reply (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: impl Into<String>, user_id: impl Into<String>, event: InboundEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            event,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// Stream of inbound messages produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message transport: yields inbound events and performs outbound sends.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a text reply to the sender of `msg`.
    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<(), ChannelError>;

    /// Send a file attachment to the sender of `msg`.
    async fn send_file(
        &self,
        msg: &IncomingMessage,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), ChannelError>;

    /// Download the content of a document the user uploaded.
    async fn fetch_document(
        &self,
        msg: &IncomingMessage,
        document: &DocumentRef,
    ) -> Result<Vec<u8>, ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
