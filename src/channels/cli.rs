//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Commands are typed as in Telegram (`/start`, `/cancel`, ...). A document
//! upload is simulated with `/file <path>`; generated files are written to the
//! configured output directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, DocumentRef, InboundEvent, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Identity used for every message typed on stdin.
const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    output_dir: PathBuf,
}

impl CliChannel {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where `send_file` writes a file. Only the final path component of the
    /// requested name is used.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output.vcf");
        self.output_dir.join(name)
    }
}

/// Classify one stdin line.
pub fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if let Some(path) = line.strip_prefix("/file ") {
        let path = path.trim();
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        return Some(InboundEvent::Document(DocumentRef {
            file_name,
            file_id: path.to_string(),
        }));
    }
    InboundEvent::from_text(line)
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let Some(event) = parse_line(&line) else {
                            eprintln!("Unknown command. Try /start, /cancel, /file <path>.");
                            eprint!("> ");
                            continue;
                        };
                        let msg = IncomingMessage::new("cli", CLI_USER, event);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn reply_text(&self, _msg: &IncomingMessage, text: &str) -> Result<(), ChannelError> {
        println!("\n{text}\n");
        eprint!("> ");
        Ok(())
    }

    async fn send_file(
        &self,
        _msg: &IncomingMessage,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<(), ChannelError> {
        let send_failed = |e: std::io::Error| ChannelError::SendFailed {
            name: "cli".into(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(send_failed)?;
        let path = self.output_path(file_name);
        tokio::fs::write(&path, content).await.map_err(send_failed)?;

        println!("📎 {}", path.display());
        Ok(())
    }

    async fn fetch_document(
        &self,
        _msg: &IncomingMessage,
        document: &DocumentRef,
    ) -> Result<Vec<u8>, ChannelError> {
        tokio::fs::read(&document.file_id)
            .await
            .map_err(|e| ChannelError::DownloadFailed {
                name: "cli".into(),
                reason: format!("{}: {e}", document.file_id),
            })
    }
}
