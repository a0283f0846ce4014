//! Configuration module for the task bot.
//!
//! Handles loading and validation of the bot configuration file
//! (texts, links, administrators) and of the environment settings
//! (tokens, database location, timing).

mod bot_config;
mod settings;

pub use bot_config::{BotConfig, ValidationError, format_amount};
pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Default interval between two broadcast sends, in milliseconds.
pub const DEFAULT_BROADCAST_DELAY_MS: u64 = 50;

/// Default idle time after which a conversation is forgotten, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
