//! Persistence layer for tasks, user balances and completion records.
//!
//! Everything lives in a single SQLite database managed by [`SqliteStore`].
//! The schema is applied from `migrations/` when the store connects.

mod sqlite;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Identifier of a task row.
pub type TaskId = i64;

/// Telegram user identifier.
pub type UserId = i64;

/// Errors returned by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed task extra data: {0}")]
    ExtraData(#[from] serde_json::Error),

    #[error("Unexpected value '{value}' in column {column}")]
    UnknownValue { column: &'static str, value: String },

    #[error("Task #{0} not found")]
    TaskNotFound(TaskId),
}

/// The two kinds of work a task can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Join a channel; verified automatically.
    Subscribe,
    /// Register on a site; verified by an admin looking at a screenshot.
    Register,
}

impl TaskKind {
    /// Storage and callback representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Register => "register",
        }
    }

    /// Human readable label shown on task cards.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Subscribe => "Channel subscription",
            Self::Register => "Site registration",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Self::Subscribe),
            "register" => Ok(Self::Register),
            other => Err(StoreError::UnknownValue {
                column: "type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Kind-specific attributes of a task, stored as JSON in `extra_data`.
///
/// Keys other than the two known links are kept as-is so that rows written
/// by other tools survive an edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskExtra {
    /// Channel to join, for [`TaskKind::Subscribe`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_link: Option<String>,

    /// Registration page, for [`TaskKind::Register`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_link: Option<String>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl TaskExtra {
    /// Builds the attribute bag holding `link` under the key `kind` expects.
    #[must_use]
    pub fn with_link(kind: TaskKind, link: impl Into<String>) -> Self {
        let link = link.into();
        match kind {
            TaskKind::Subscribe => Self {
                channel_link: Some(link),
                ..Self::default()
            },
            TaskKind::Register => Self {
                reg_link: Some(link),
                ..Self::default()
            },
        }
    }

    /// Returns the link relevant to `kind`, if present.
    #[must_use]
    pub fn link_for(&self, kind: TaskKind) -> Option<&str> {
        match kind {
            TaskKind::Subscribe => self.channel_link.as_deref(),
            TaskKind::Register => self.reg_link.as_deref(),
        }
    }
}

/// A rewardable unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub reward: f64,
    pub order_num: i64,
    pub extra: TaskExtra,
    pub is_active: bool,
}

impl Task {
    /// Link for this task's kind, or an empty string.
    #[must_use]
    pub fn link(&self) -> &str {
        self.extra.link_for(self.kind).unwrap_or_default()
    }
}

/// Status of a completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Screenshot submitted, waiting for an admin.
    Pending,
    /// Verified automatically.
    Completed,
}

impl CompletionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(StoreError::UnknownValue {
                column: "status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A user's interaction with a task.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub status: CompletionStatus,
    pub screenshot: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a task. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub reward: Option<f64>,
    pub order_num: Option<i64>,
    pub extra: Option<TaskExtra>,
}

impl TaskUpdate {
    /// Returns true when no field would be written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.reward.is_none()
            && self.order_num.is_none()
            && self.extra.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_keeps_unknown_keys() {
        let extra: TaskExtra =
            serde_json::from_str(r#"{"channel_link":"https://t.me/chan","note":"vip"}"#).unwrap();
        assert_eq!(extra.channel_link.as_deref(), Some("https://t.me/chan"));
        assert_eq!(extra.other.get("note").and_then(|v| v.as_str()), Some("vip"));

        let json = serde_json::to_string(&extra).unwrap();
        assert!(json.contains("\"note\":\"vip\""));
        assert!(!json.contains("reg_link"));
    }

    #[test]
    fn test_extra_link_for_kind() {
        let extra = TaskExtra::with_link(TaskKind::Register, "example.com/signup");
        assert_eq!(extra.link_for(TaskKind::Register), Some("example.com/signup"));
        assert_eq!(extra.link_for(TaskKind::Subscribe), None);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("subscribe".parse::<TaskKind>().unwrap(), TaskKind::Subscribe);
        assert!(matches!(
            "follow".parse::<TaskKind>(),
            Err(StoreError::UnknownValue { column: "type", .. })
        ));
    }

    #[test]
    fn test_empty_update() {
        assert!(TaskUpdate::default().is_empty());
        let update = TaskUpdate {
            reward: Some(3.0),
            ..TaskUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
