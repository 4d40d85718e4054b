//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Telegram transport settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids allowed to talk to the bot; `*` allows all.
    pub allowed_users: Vec<String>,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// `None` runs the bot on the local CLI channel instead.
    pub telegram: Option<TelegramConfig>,
    /// Identities allowed to run `/startbot` and `/stopbot`; `*` allows all.
    pub admin_users: Vec<String>,
    /// Sessions idle for this long are discarded.
    pub session_idle_timeout: Duration,
    /// Where the CLI channel writes generated files.
    pub output_dir: PathBuf,
    /// Initial state of the availability gate.
    pub start_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram: None,
            admin_users: vec!["*".to_string()],
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            output_dir: PathBuf::from("./vcards"),
            start_enabled: true,
        }
    }
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let telegram = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(|token| TelegramConfig {
                bot_token: SecretString::from(token.trim().to_string()),
                allowed_users: parse_list(lookup("TELEGRAM_ALLOWED_USERS").as_deref()),
            });

        let admin_users = parse_list(lookup("VCARD_ADMIN_USERS").as_deref());

        let session_idle_timeout = parse_value::<u64>(&lookup, "VCARD_SESSION_IDLE_SECS")?
            .map_or(defaults.session_idle_timeout, Duration::from_secs);

        let output_dir = lookup("VCARD_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let start_enabled =
            parse_value::<bool>(&lookup, "VCARD_START_ENABLED")?.unwrap_or(defaults.start_enabled);

        Ok(Self {
            telegram,
            admin_users,
            session_idle_timeout,
            output_dir,
            start_enabled,
        })
    }
}

/// Comma-separated list, defaulting to `*` when unset or empty.
fn parse_list(raw: Option<&str>) -> Vec<String> {
    let items: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        vec!["*".to_string()]
    } else {
        items
    }
}

fn parse_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}
