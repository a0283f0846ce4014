//! Bot configuration file: texts, links and administrators.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::UserId;

/// Errors that can occur while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    #[error("Field '{field}' is not a valid link: {value}")]
    InvalidLink { field: &'static str, value: String },

    #[error("Administrator id {id} is not a valid Telegram user id")]
    InvalidAdminId { id: UserId },

    #[error("Duplicate administrator id: {id}")]
    DuplicateAdmin { id: UserId },

    #[error("No administrators configured")]
    NoAdmins,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Static options of the bot, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Greeting shown on `/start`.
    pub welcome_message: String,

    /// Label of the button under the greeting.
    pub understand_button: String,

    /// Where users are sent when they press "Support".
    pub support_link: String,

    /// Default channel of the project.
    pub main_channel: String,

    /// Default registration page.
    pub registration_link: String,

    /// Telegram ids of the administrators.
    pub admin_ids: Vec<UserId>,

    /// Reserved. No workflow reads it yet.
    #[serde(default)]
    pub auto_approve: bool,

    /// Symbol appended to amounts.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "₽".to_owned()
}

impl BotConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_all().into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    /// Returns every problem found in the configuration, one entry per check.
    #[must_use]
    pub fn validate_all(&self) -> Vec<Result<(), ValidationError>> {
        let mut results = vec![
            non_empty("welcome_message", &self.welcome_message),
            non_empty("understand_button", &self.understand_button),
            non_empty("currency", &self.currency),
            link("support_link", &self.support_link),
            non_empty("main_channel", &self.main_channel),
            link("registration_link", &self.registration_link),
        ];

        if self.admin_ids.is_empty() {
            results.push(Err(ValidationError::NoAdmins));
        }

        let mut seen = std::collections::HashSet::new();
        for &id in &self.admin_ids {
            if id <= 0 {
                results.push(Err(ValidationError::InvalidAdminId { id }));
            } else if !seen.insert(id) {
                results.push(Err(ValidationError::DuplicateAdmin { id }));
            } else {
                results.push(Ok(()));
            }
        }

        results
    }

    /// Checks whether `user_id` is a configured administrator.
    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Formats an amount with the configured currency symbol.
    #[must_use]
    pub fn money(&self, amount: f64) -> String {
        format!("{} {}", format_amount(amount), self.currency)
    }

    /// Creates an example configuration for users to reference.
    #[must_use]
    pub fn example() -> Self {
        Self {
            welcome_message: "👋 Welcome! Complete simple tasks and get paid for them.".to_owned(),
            understand_button: "Got it ✅".to_owned(),
            support_link: "https://t.me/support".to_owned(),
            main_channel: "@example_channel".to_owned(),
            registration_link: "https://example.com/register".to_owned(),
            admin_ids: vec![123_456_789],
            auto_approve: false,
            currency: default_currency(),
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(())
    }
}

fn link(field: &'static str, value: &str) -> Result<(), ValidationError> {
    non_empty(field, value)?;
    if value.starts_with("https://") || value.starts_with("http://") || value.starts_with("tg://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidLink {
            field,
            value: value.to_owned(),
        })
    }
}

/// Renders whole amounts without decimals and everything else with two.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount.fract().abs() < f64::EPSILON {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
