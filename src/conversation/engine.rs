//! Conversation engine — dispatches inbound events against the session store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channels::{Channel, DocumentRef, InboundEvent, IncomingMessage};
use crate::error::{ChannelError, Error};

use super::gate::AvailabilityGate;
use super::input;
use super::prompts;
use super::state::{ConversationPhase, Session, SessionState};
use super::store::{SessionSlot, SessionStore};
use super::transition::{self, Step, Submission};

/// Drives every user's conversation: gate check, transition, replies.
pub struct ConversationEngine {
    sessions: Arc<SessionStore>,
    gate: Arc<AvailabilityGate>,
    admin_users: Vec<String>,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        gate: Arc<AvailabilityGate>,
        admin_users: Vec<String>,
    ) -> Self {
        Self {
            sessions,
            gate,
            admin_users,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn gate(&self) -> &Arc<AvailabilityGate> {
        &self.gate
    }

    /// Whether the sender may toggle the availability gate.
    ///
    /// Matches the numeric user id or the `username` metadata; `*` allows all.
    pub fn is_admin(&self, msg: &IncomingMessage) -> bool {
        let username = msg.metadata.get("username").and_then(|v| v.as_str());
        self.admin_users.iter().any(|u| {
            u == "*" || *u == msg.user_id || username.is_some_and(|name| name == u.as_str())
        })
    }

    /// Handle one inbound message.
    ///
    /// Input problems and transport failures are answered in-conversation;
    /// an error is returned only if even the failure notice could not be sent.
    pub async fn handle(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
    ) -> Result<(), ChannelError> {
        match &msg.event {
            InboundEvent::Enable | InboundEvent::Disable => {
                return self.on_admin(channel, msg).await;
            }
            InboundEvent::Start if !self.gate.is_enabled() => {
                info!(user_id = %msg.user_id, "Start refused, bot is stopped");
                return channel.reply_text(msg, prompts::STOPPED).await;
            }
            InboundEvent::Document(_) | InboundEvent::Text(_) if !self.gate.is_enabled() => {
                debug!(
                    user_id = %msg.user_id,
                    event = msg.event.label(),
                    "Bot stopped, ignoring input"
                );
                return Ok(());
            }
            _ => {}
        }

        let mut slot = self.sessions.lock(&msg.user_id).await;
        let session_id = slot.as_ref().map(|s| s.id);

        if let Err(e) = self.transition(channel, msg, &mut slot).await {
            warn!(
                user_id = %msg.user_id,
                session_id = ?session_id,
                event = msg.event.label(),
                error = %e,
                "Conversation step failed, abandoning session"
            );
            *slot = None;
            return channel.reply_text(msg, prompts::FAILED).await;
        }
        Ok(())
    }

    async fn transition(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        slot: &mut SessionSlot,
    ) -> Result<(), Error> {
        match &msg.event {
            InboundEvent::Start => {
                if let Some(old) = slot.take() {
                    debug!(
                        user_id = %msg.user_id,
                        session_id = %old.id,
                        phase = %old.phase(),
                        "Discarding session on restart"
                    );
                }
                let session = Session::new();
                info!(user_id = %msg.user_id, session_id = %session.id, "Session started");
                **slot = Some(session);
                channel.reply_text(msg, prompts::ASK_FILE).await?;
            }
            InboundEvent::Cancel => match slot.take() {
                Some(session) => {
                    info!(
                        user_id = %msg.user_id,
                        session_id = %session.id,
                        phase = %session.phase(),
                        "Session cancelled"
                    );
                    channel.reply_text(msg, prompts::CANCELLED).await?;
                }
                None => debug!(user_id = %msg.user_id, "Cancel outside a conversation, ignoring"),
            },
            InboundEvent::Document(document) => {
                self.on_document(channel, msg, slot, document).await?;
            }
            InboundEvent::Text(text) => self.on_text(channel, msg, slot, text).await?,
            InboundEvent::Enable | InboundEvent::Disable => {}
        }
        Ok(())
    }

    async fn on_document(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        slot: &mut SessionSlot,
        document: &DocumentRef,
    ) -> Result<(), Error> {
        let Some(session) = slot.as_mut() else {
            debug!(user_id = %msg.user_id, "Document outside a conversation, ignoring");
            return Ok(());
        };
        if session.phase() != ConversationPhase::AwaitingFile {
            debug!(
                user_id = %msg.user_id,
                phase = %session.phase(),
                "Document not expected, ignoring"
            );
            return Ok(());
        }

        if let Err(error) = input::check_extension(&document.file_name) {
            let state = session.state.clone();
            return self
                .apply(channel, msg, slot, Step::Rejected { state, error })
                .await;
        }

        let content = channel.fetch_document(msg, document).await?;
        let state = std::mem::replace(&mut session.state, SessionState::AwaitingFile);
        self.apply(channel, msg, slot, transition::on_document(state, &content)).await
    }

    async fn on_text(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        slot: &mut SessionSlot,
        text: &str,
    ) -> Result<(), Error> {
        let Some(session) = slot.as_mut() else {
            debug!(user_id = %msg.user_id, "Text outside a conversation, ignoring");
            return Ok(());
        };
        let state = std::mem::replace(&mut session.state, SessionState::AwaitingFile);
        self.apply(channel, msg, slot, transition::on_text(state, text)).await
    }

    async fn apply(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        slot: &mut SessionSlot,
        step: Step,
    ) -> Result<(), Error> {
        match step {
            Step::Advanced { next, prompt } => {
                if let Some(session) = slot.as_mut() {
                    session.advance(next);
                    debug!(
                        user_id = %msg.user_id,
                        session_id = %session.id,
                        phase = %session.phase(),
                        "Session advanced"
                    );
                }
                channel.reply_text(msg, prompt).await?;
            }
            Step::Rejected { state, error } if error.ends_session() => {
                if let Some(session) = slot.take() {
                    info!(
                        user_id = %msg.user_id,
                        session_id = %session.id,
                        phase = %state.phase(),
                        error = %error,
                        "Input rejected, ending session"
                    );
                }
                channel.reply_text(msg, &prompts::input_error(&error)).await?;
            }
            Step::Rejected { state, error } => {
                if let Some(session) = slot.as_mut() {
                    session.advance(state);
                    debug!(
                        user_id = %msg.user_id,
                        session_id = %session.id,
                        phase = %session.phase(),
                        error = %error,
                        "Input rejected"
                    );
                }
                channel.reply_text(msg, &prompts::input_error(&error)).await?;
            }
            Step::Ignored(state) => {
                if let Some(session) = slot.as_mut() {
                    session.state = state;
                    debug!(
                        user_id = %msg.user_id,
                        phase = %session.phase(),
                        event = msg.event.label(),
                        "Input not expected, ignoring"
                    );
                }
            }
            Step::Completed(submission) => {
                let session = slot.take();
                self.complete(channel, msg, session, submission).await?;
            }
        }
        Ok(())
    }

    async fn complete(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
        session: Option<Session>,
        submission: Submission,
    ) -> Result<(), Error> {
        let files = submission.render()?;
        let file_count = files.len();

        for file in files {
            let file_name = file.file_name.clone();
            channel.send_file(msg, &file_name, file.into_bytes()).await?;
        }
        channel.reply_text(msg, prompts::DONE).await?;

        info!(
            user_id = %msg.user_id,
            session_id = ?session.map(|s| s.id),
            numbers = submission.numbers.len(),
            file_count,
            per_file = submission.per_file.get(),
            "Card files generated"
        );
        Ok(())
    }

    async fn on_admin(
        &self,
        channel: &dyn Channel,
        msg: &IncomingMessage,
    ) -> Result<(), ChannelError> {
        if !self.is_admin(msg) {
            warn!(
                user_id = %msg.user_id,
                event = msg.event.label(),
                "Non-admin tried to toggle the bot"
            );
            return channel.reply_text(msg, prompts::NOT_ADMIN).await;
        }

        if msg.event == InboundEvent::Enable {
            self.gate.enable();
            info!(user_id = %msg.user_id, "Bot enabled");
            channel.reply_text(msg, prompts::ENABLED).await
        } else {
            self.gate.disable();
            info!(user_id = %msg.user_id, "Bot disabled");
            channel.reply_text(msg, prompts::DISABLED).await
        }
    }
}
