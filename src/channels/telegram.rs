//! Telegram channel — long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation: text and document messages
//! become `InboundEvent`s, replies go out through `sendMessage`, card files
//! through multipart `sendDocument`, and uploads are pulled via `getFile`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::channels::{Channel, DocumentRef, InboundEvent, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Public Bot API endpoint.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// `getFile` result.
#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API server (local server, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Send a plain text message.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("sendMessage returned {status}: {err}")));
        }
        Ok(())
    }

    /// Send a document from bytes (in-memory).
    pub async fn send_document_bytes(
        &self,
        chat_id: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<(), ChannelError> {
        let part = Part::bytes(file_bytes).file_name(file_name.to_string());

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("sendDocument failed: {err}")));
        }

        tracing::info!("Telegram document sent to {chat_id}: {file_name}");
        Ok(())
    }

    /// Resolve a `file_id` with `getFile` and download the content.
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        let resp = self
            .client
            .post(self.api_url("getFile"))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(download_failed(format!(
                "getFile returned {}",
                resp.status()
            )));
        }

        let data: ApiResponse<TelegramFile> = resp
            .json()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        if !data.ok {
            return Err(download_failed(format!(
                "getFile failed: {}",
                data.description.unwrap_or_default()
            )));
        }
        let file_path = data
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| download_failed("getFile response has no file_path".into()))?;

        let resp = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(download_failed(format!(
                "file download returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        tracing::debug!(file_id, size = bytes.len(), "Telegram document downloaded");
        Ok(bytes.to_vec())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let updates_url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&updates_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tracing::warn!(
                        "Telegram getUpdates returned no result: {}",
                        data.get("description")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or("unknown error")
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<(), ChannelError> {
        self.send_message(chat_id(msg)?, text).await
    }

    async fn send_file(
        &self,
        msg: &IncomingMessage,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), ChannelError> {
        self.send_document_bytes(chat_id(msg)?, content, file_name)
            .await
    }

    async fn fetch_document(
        &self,
        _msg: &IncomingMessage,
        document: &DocumentRef,
    ) -> Result<Vec<u8>, ChannelError> {
        self.download_file(&document.file_id).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

fn download_failed(reason: String) -> ChannelError {
    ChannelError::DownloadFailed {
        name: "telegram".into(),
        reason,
    }
}

fn chat_id(msg: &IncomingMessage) -> Result<&str, ChannelError> {
    msg.metadata
        .get("chat_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::InvalidMessage("No chat_id in message metadata".into()))
}

/// Turn one `getUpdates` entry into an inbound message.
///
/// Returns `None` for updates without a message, senders outside the
/// allowlist, unknown commands, and message kinds the bot does not handle.
fn parse_update(update: &Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.get("message")?;

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string());

    // Check allowlist against both username and numeric ID
    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities.iter().copied()) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: \
             username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let event = if let Some(document) = message.get("document") {
        InboundEvent::Document(DocumentRef {
            file_name: document
                .get("file_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            file_id: document.get("file_id").and_then(Value::as_str)?.to_string(),
        })
    } else {
        let text = message.get("text").and_then(Value::as_str)?;
        InboundEvent::from_text(text)?
    };

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let first_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(Value::as_str);

    let incoming = IncomingMessage::new("telegram", user_id.as_deref().unwrap_or(username), event)
        .with_metadata(serde_json::json!({
            "chat_id": chat_id,
            "username": username,
        }))
        .with_user_name(first_name.unwrap_or(username));

    Some(incoming)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(allowed: &[&str]) -> TelegramChannel {
        TelegramChannel::new(
            SecretString::from("123:ABC".to_string()),
            allowed.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn update(message: Value) -> Value {
        serde_json::json!({ "update_id": 1, "message": message })
    }

    fn reply_target() -> IncomingMessage {
        IncomingMessage::new("telegram", "42", InboundEvent::Start)
            .with_metadata(serde_json::json!({ "chat_id": "99887766" }))
    }

    // ── Basic channel tests ─────────────────────────────────────────

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(&["*"]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = channel(&[]);
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
        assert_eq!(
            ch.file_url("documents/file_1.txt"),
            "https://api.telegram.org/file/bot123:ABC/documents/file_1.txt"
        );
    }

    #[test]
    fn telegram_api_base_override_trims_slash() {
        let ch = channel(&[]).with_api_base("http://localhost:8081/");
        assert_eq!(ch.api_url("getMe"), "http://localhost:8081/bot123:ABC/getMe");
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allowed(users: &[&str]) -> Vec<String> {
        users.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(check_user_allowed(&allowed(&["*"]), ["anyone"]));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        let users = allowed(&["alice", "bob"]);
        assert!(check_user_allowed(&users, ["alice"]));
        assert!(!check_user_allowed(&users, ["eve"]));
    }

    #[test]
    fn telegram_user_denied_empty() {
        assert!(!check_user_allowed(&[], ["anyone"]));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        let users = allowed(&["alice"]);
        assert!(!check_user_allowed(&users, ["alice_bot"]));
        assert!(!check_user_allowed(&users, ["malice"]));
    }

    #[test]
    fn telegram_user_allowed_by_numeric_id() {
        let users = allowed(&["123456789"]);
        let from_id = |id: i64| {
            update(serde_json::json!({
                "from": { "id": id, "username": "someone" },
                "chat": { "id": 1 },
                "text": "/start"
            }))
        };
        assert!(parse_update(&from_id(123456789), &users).is_some());
        assert!(parse_update(&from_id(987654321), &users).is_none());
    }

    // ── Update parsing tests ────────────────────────────────────────

    #[test]
    fn parse_text_update() {
        let allowed = vec!["*".to_string()];
        let msg = parse_update(
            &update(serde_json::json!({
                "from": { "id": 42, "username": "alice", "first_name": "Alice" },
                "chat": { "id": 99887766 },
                "text": "3"
            })),
            &allowed,
        )
        .unwrap();

        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.user_name.as_deref(), Some("Alice"));
        assert_eq!(msg.event, InboundEvent::Text("3".into()));
        assert_eq!(msg.metadata["chat_id"], "99887766");
        assert_eq!(msg.metadata["username"], "alice");
    }

    #[test]
    fn parse_command_update() {
        let allowed = vec!["*".to_string()];
        let msg = parse_update(
            &update(serde_json::json!({
                "from": { "id": 42 },
                "chat": { "id": 1 },
                "text": "/start"
            })),
            &allowed,
        )
        .unwrap();
        assert_eq!(msg.event, InboundEvent::Start);
    }

    #[test]
    fn parse_document_update() {
        let allowed = vec!["*".to_string()];
        let msg = parse_update(
            &update(serde_json::json!({
                "from": { "id": 42 },
                "chat": { "id": 1 },
                "document": { "file_id": "BQAD", "file_name": "numbers.txt" }
            })),
            &allowed,
        )
        .unwrap();
        assert_eq!(
            msg.event,
            InboundEvent::Document(DocumentRef {
                file_name: "numbers.txt".into(),
                file_id: "BQAD".into(),
            })
        );
    }

    #[test]
    fn parse_document_without_name() {
        let allowed = vec!["*".to_string()];
        let msg = parse_update(
            &update(serde_json::json!({
                "from": { "id": 42 },
                "chat": { "id": 1 },
                "document": { "file_id": "BQAD" }
            })),
            &allowed,
        )
        .unwrap();
        assert!(matches!(msg.event, InboundEvent::Document(ref d) if d.file_name.is_empty()));
    }

    #[test]
    fn parse_skips_unknown_commands_and_other_kinds() {
        let allowed = vec!["*".to_string()];
        let unknown = update(serde_json::json!({
            "from": { "id": 42 }, "chat": { "id": 1 }, "text": "/help"
        }));
        let sticker = update(serde_json::json!({
            "from": { "id": 42 }, "chat": { "id": 1 }, "sticker": {}
        }));
        assert!(parse_update(&unknown, &allowed).is_none());
        assert!(parse_update(&sticker, &allowed).is_none());
        assert!(parse_update(&serde_json::json!({ "update_id": 5 }), &allowed).is_none());
    }

    #[test]
    fn parse_rejects_unauthorized_sender() {
        let allowed = vec!["alice".to_string()];
        let msg = update(serde_json::json!({
            "from": { "id": 7, "username": "eve" }, "chat": { "id": 1 }, "text": "hi"
        }));
        assert!(parse_update(&msg, &allowed).is_none());
    }

    #[test]
    fn chat_id_required_for_replies() {
        let msg = IncomingMessage::new("telegram", "42", InboundEvent::Start);
        assert!(matches!(chat_id(&msg), Err(ChannelError::InvalidMessage(_))));
        assert_eq!(chat_id(&reply_target()).unwrap(), "99887766");
    }

    // ── HTTP contract tests ─────────────────────────────────────────

    #[tokio::test]
    async fn reply_text_posts_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "99887766",
                "text": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        ch.reply_text(&reply_target(), "hello").await.unwrap();
    }

    #[tokio::test]
    async fn reply_text_reports_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        let err = ch.reply_text(&reply_target(), "hello").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"), "got: {err}");
    }

    #[tokio::test]
    async fn send_file_uploads_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendDocument"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        ch.send_file(&reply_target(), "out_1.vcf", b"BEGIN:VCARD\n".to_vec())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("filename=\"out_1.vcf\""));
        assert!(body.contains("BEGIN:VCARD"));
        assert!(body.contains("99887766"));
    }

    #[tokio::test]
    async fn fetch_document_resolves_and_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getFile"))
            .and(body_json(serde_json::json!({ "file_id": "BQAD" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "file_id": "BQAD", "file_path": "documents/file_1.txt" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file/bot123:ABC/documents/file_1.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("111\n222\n"))
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        let doc = DocumentRef {
            file_name: "numbers.txt".into(),
            file_id: "BQAD".into(),
        };
        let content = ch.fetch_document(&reply_target(), &doc).await.unwrap();
        assert_eq!(content, b"111\n222\n");
    }

    #[tokio::test]
    async fn fetch_document_without_file_path_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getFile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true, "result": {} })),
            )
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        let doc = DocumentRef {
            file_name: "numbers.txt".into(),
            file_id: "BQAD".into(),
        };
        let err = ch.fetch_document(&reply_target(), &doc).await.unwrap_err();
        assert!(matches!(err, ChannelError::DownloadFailed { .. }));
    }

    #[tokio::test]
    async fn health_check_calls_get_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let ch = channel(&["*"]).with_api_base(server.uri());
        assert!(matches!(
            ch.health_check().await,
            Err(ChannelError::StartupFailed { .. })
        ));
    }
}
