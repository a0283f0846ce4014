//! Environment settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_BROADCAST_DELAY_MS, DEFAULT_SESSION_TTL_SECS};

/// Telegram Bot API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Token of the bot users talk to.
    pub bot_token: String,

    /// Token of the bot used for membership checks.
    ///
    /// That bot must be an administrator of every checked channel.
    pub check_bot_token: String,

    /// Base URL of the Bot API server.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-polling timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_owned()
}

fn default_poll_timeout() -> u64 {
    30
}

impl TelegramConfig {
    /// Creates a configuration that uses one token for both bots.
    #[must_use]
    pub fn new(bot_token: String) -> Self {
        Self {
            check_bot_token: bot_token.clone(),
            bot_token,
            api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `BOT_TOKEN` to be set. `CHECK_BOT_TOKEN` falls back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("BOT_TOKEN"))?;
        if !looks_like_token(&bot_token) {
            return Err(ConfigError::InvalidToken("BOT_TOKEN"));
        }

        let check_bot_token = match std::env::var("CHECK_BOT_TOKEN") {
            Ok(token) if !token.is_empty() => {
                if !looks_like_token(&token) {
                    return Err(ConfigError::InvalidToken("CHECK_BOT_TOKEN"));
                }
                token
            }
            _ => bot_token.clone(),
        };

        let api_url = std::env::var("TELEGRAM_API_URL").unwrap_or_else(|_| default_api_url());

        let poll_timeout_secs = match std::env::var("POLL_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("POLL_TIMEOUT_SECS"))?,
            Err(_) => default_poll_timeout(),
        };

        Ok(Self {
            bot_token,
            check_bot_token,
            api_url,
            poll_timeout_secs,
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("check_bot_token", &"***")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Bot tokens have the shape `<digits>:<secret>`.
fn looks_like_token(token: &str) -> bool {
    token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
    })
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// sqlx URL of the SQLite database.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Directory where submitted screenshots are written.
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,

    /// Minimum interval between broadcast sends in milliseconds.
    #[serde(default = "default_broadcast_delay")]
    pub broadcast_delay_ms: u64,

    /// Idle time after which a conversation is dropped, in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_url() -> String {
    "sqlite://bot.db".to_owned()
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_broadcast_delay() -> u64 {
    DEFAULT_BROADCAST_DELAY_MS
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            screenshots_dir: default_screenshots_dir(),
            broadcast_delay_ms: default_broadcast_delay(),
            session_ttl_secs: default_session_ttl(),
            log_level: default_log_level(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            screenshots_dir: std::env::var("SCREENSHOTS_DIR")
                .map_or_else(|_| default_screenshots_dir(), PathBuf::from),
            broadcast_delay_ms: std::env::var("BROADCAST_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_broadcast_delay),
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_session_ttl),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level()),
        }
    }

    /// Interval between broadcast sends.
    #[must_use]
    pub const fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.broadcast_delay_ms)
    }

    /// Idle lifetime of a session.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid bot token in {0} (expected <id>:<secret>)")]
    InvalidToken(&'static str),

    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
}
