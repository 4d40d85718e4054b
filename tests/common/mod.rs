//! Shared test fixtures: a channel that records everything sent to it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use vcard_splitter::channels::{
    Channel, DocumentRef, InboundEvent, IncomingMessage, MessageStream,
};
use vcard_splitter::conversation::{AvailabilityGate, ConversationEngine, SessionStore};
use vcard_splitter::error::ChannelError;

/// Something the engine sent to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    File { name: String, content: String },
}

/// In-memory channel: serves canned documents and records outbound traffic.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Sent)>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    inbound: Mutex<Vec<IncomingMessage>>,
    live: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
    fail_downloads: bool,
    fail_file_sends: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `fetch_document` fails as if storage were unreachable.
    pub fn failing_downloads() -> Self {
        Self {
            fail_downloads: true,
            ..Self::default()
        }
    }

    /// Every `send_file` fails.
    pub fn failing_file_sends() -> Self {
        Self {
            fail_file_sends: true,
            ..Self::default()
        }
    }

    /// Register content served for `file_id`.
    pub fn add_document(&self, file_id: &str, content: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(file_id.to_string(), content.as_bytes().to_vec());
    }

    /// Messages returned by `start`, in order.
    pub fn queue_inbound(&self, messages: Vec<IncomingMessage>) {
        self.inbound.lock().unwrap().extend(messages);
    }

    /// Feed that `start` streams after the queued messages; the stream ends
    /// when the returned sender is dropped.
    pub fn live_inbound(&self) -> mpsc::UnboundedSender<IncomingMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.live.lock().unwrap() = Some(rx);
        tx
    }

    /// Everything sent to `user_id`, in order.
    pub fn sent_to(&self, user_id: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, sent)| sent.clone())
            .collect()
    }

    /// Texts sent to `user_id`, in order.
    pub fn texts_to(&self, user_id: &str) -> Vec<String> {
        self.sent_to(user_id)
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(text) => Some(text),
                Sent::File { .. } => None,
            })
            .collect()
    }

    /// Most recent text sent to `user_id`.
    pub fn last_text(&self, user_id: &str) -> Option<String> {
        self.texts_to(user_id).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let messages = std::mem::take(&mut *self.inbound.lock().unwrap());
        let queued = futures::stream::iter(messages);
        match self.live.lock().unwrap().take() {
            Some(rx) => {
                let live = futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|msg| (msg, rx))
                });
                Ok(Box::pin(queued.chain(live)))
            }
            None => Ok(Box::pin(queued)),
        }
    }

    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((msg.user_id.clone(), Sent::Text(text.to_string())));
        Ok(())
    }

    async fn send_file(
        &self,
        msg: &IncomingMessage,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), ChannelError> {
        if self.fail_file_sends {
            return Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: "upload rejected".into(),
            });
        }
        self.sent.lock().unwrap().push((
            msg.user_id.clone(),
            Sent::File {
                name: file_name.to_string(),
                content: String::from_utf8(content).unwrap(),
            },
        ));
        Ok(())
    }

    async fn fetch_document(
        &self,
        _msg: &IncomingMessage,
        document: &DocumentRef,
    ) -> Result<Vec<u8>, ChannelError> {
        if self.fail_downloads {
            return Err(ChannelError::DownloadFailed {
                name: "recording".into(),
                reason: "storage unavailable".into(),
            });
        }
        self.documents
            .lock()
            .unwrap()
            .get(&document.file_id)
            .cloned()
            .ok_or_else(|| ChannelError::DownloadFailed {
                name: "recording".into(),
                reason: format!("unknown file {}", document.file_id),
            })
    }
}

pub fn engine() -> ConversationEngine {
    engine_with_admins(vec!["*".to_string()])
}

pub fn engine_with_admins(admin_users: Vec<String>) -> ConversationEngine {
    ConversationEngine::new(
        SessionStore::new(),
        Arc::new(AvailabilityGate::new(true)),
        admin_users,
    )
}

pub fn start(user: &str) -> IncomingMessage {
    IncomingMessage::new("recording", user, InboundEvent::Start)
}

pub fn cancel(user: &str) -> IncomingMessage {
    IncomingMessage::new("recording", user, InboundEvent::Cancel)
}

pub fn enable(user: &str) -> IncomingMessage {
    IncomingMessage::new("recording", user, InboundEvent::Enable)
}

pub fn disable(user: &str) -> IncomingMessage {
    IncomingMessage::new("recording", user, InboundEvent::Disable)
}

pub fn text(user: &str, text: &str) -> IncomingMessage {
    IncomingMessage::new("recording", user, InboundEvent::Text(text.to_string()))
}

pub fn document(user: &str, file_name: &str, file_id: &str) -> IncomingMessage {
    IncomingMessage::new(
        "recording",
        user,
        InboundEvent::Document(DocumentRef {
            file_name: file_name.to_string(),
            file_id: file_id.to_string(),
        }),
    )
}

/// Expected card text for consecutive records.
pub fn cards(prefix: &str, entries: &[(usize, &str)]) -> String {
    entries
        .iter()
        .map(|(index, number)| {
            format!(
                "BEGIN:VCARD\nVERSION:3.0\nFN:{prefix} {index}\nTEL;TYPE=CELL:{number}\nEND:VCARD\n\n"
            )
        })
        .collect()
}
