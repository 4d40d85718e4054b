use std::sync::Arc;

use vcard_splitter::channels::{Channel, CliChannel, TelegramChannel};
use vcard_splitter::config::BotConfig;
use vcard_splitter::conversation::{
    AvailabilityGate, ConversationEngine, SessionStore, spawn_expiry_task,
};
use vcard_splitter::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 vCard splitter v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Session idle timeout: {}s",
        config.session_idle_timeout.as_secs()
    );
    eprintln!("   Admins: {}", describe_users(&config.admin_users));

    // ── Conversation ─────────────────────────────────────────────────────
    let sessions = SessionStore::new();
    let gate = Arc::new(AvailabilityGate::new(config.start_enabled));
    let engine = Arc::new(ConversationEngine::new(
        Arc::clone(&sessions),
        gate,
        config.admin_users.clone(),
    ));

    let _expiry_handle = spawn_expiry_task(Arc::clone(&sessions), config.session_idle_timeout);

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.telegram {
        Some(telegram) => {
            eprintln!(
                "   Telegram: enabled (allowed: {})",
                describe_users(&telegram.allowed_users)
            );
            let channel = TelegramChannel::new(telegram.bot_token, telegram.allowed_users);
            channel.health_check().await?;
            Arc::new(channel)
        }
        None => {
            eprintln!("   Telegram: disabled (TELEGRAM_BOT_TOKEN not set), using CLI");
            eprintln!("   Output: {}", config.output_dir.display());
            eprintln!("   Type /start to begin, /file <path> to upload. Ctrl-C to exit.\n");
            Arc::new(CliChannel::new(config.output_dir.clone()))
        }
    };

    let dispatcher = Dispatcher::new(engine, channel);
    dispatcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}

/// Banner text for a user list where `*` means everyone.
fn describe_users(users: &[String]) -> String {
    if users.iter().any(|u| u == "*") {
        "everyone".to_string()
    } else {
        users.join(", ")
    }
}
