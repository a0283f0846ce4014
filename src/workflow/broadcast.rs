//! Broadcast engine.
//!
//! Sends one admin-composed message to every known user, one recipient at
//! a time, and reports delivery statistics.

use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::store::{SqliteStore, StoreError, UserId};
use crate::telegram::{Message, MessageId, Messenger, ParseMode, RateLimiter, TelegramError};

/// Recipients between two progress updates.
const PROGRESS_EVERY: usize = 10;

/// Failed ids listed in the summary before the rest is elided.
const FAILED_IDS_SHOWN: usize = 10;

/// Errors that abort a broadcast as a whole.
///
/// Failures to reach individual recipients are counted in the report
/// instead.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Failed to load recipients: {0}")]
    Recipients(#[from] StoreError),

    #[error("Failed to report progress: {0}")]
    Progress(#[from] TelegramError),
}

/// Message to deliver, shaped like the admin's original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastPayload {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
}

impl BroadcastPayload {
    /// Builds the payload from the admin's message.
    ///
    /// A photo wins over a video, which wins over text. Returns `None` for
    /// messages with none of the three.
    #[must_use]
    pub fn from_message(message: &Message) -> Option<Self> {
        if let Some(photo) = message.largest_photo() {
            return Some(Self::Photo {
                file_id: photo.file_id.clone(),
                caption: message.caption.clone(),
            });
        }
        if let Some(video) = &message.video {
            return Some(Self::Video {
                file_id: video.file_id.clone(),
                caption: message.caption.clone(),
            });
        }
        message
            .text
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Self::Text(t.clone()))
    }

    async fn deliver<M: Messenger>(&self, messenger: &M, chat_id: i64) -> Result<MessageId, TelegramError> {
        match self {
            Self::Text(text) => {
                messenger
                    .send_message(chat_id, text, Some(ParseMode::Html), None)
                    .await
            }
            Self::Photo { file_id, caption } => {
                messenger
                    .send_photo(chat_id, file_id, caption.as_deref(), Some(ParseMode::Html), None)
                    .await
            }
            Self::Video { file_id, caption } => {
                messenger
                    .send_video(chat_id, file_id, caption.as_deref(), Some(ParseMode::Html))
                    .await
            }
        }
    }
}

/// Delivery statistics of a finished broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub total: usize,
    pub success: usize,
    pub failed_ids: Vec<UserId>,
}

impl BroadcastReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }

    /// Percentage of recipients reached; zero when there were none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success as f64 / self.total as f64 * 100.0
    }

    /// Final summary shown to the admin.
    #[must_use]
    pub fn render(&self) -> String {
        let rate = self.success_rate();
        let (icon, verdict) = if self.total > 0 && self.success == self.total {
            ("🚀", "The broadcast went perfectly!")
        } else if rate >= 90.0 {
            ("✨", "The broadcast was very successful!")
        } else if rate >= 75.0 {
            ("👍", "The broadcast went well.")
        } else if rate >= 50.0 {
            ("⚠️", "The broadcast was satisfactory.")
        } else {
            ("❌", "The broadcast ran into problems.")
        };

        let mut text = format!(
            "{icon} ✅ Broadcast finished!\n\n\
             📊 Statistics:\n\
             • Total users: {}\n\
             • Delivered: {}\n\
             • Failed: {}\n\
             • Success rate: {rate:.1}%\n\n\
             {verdict}",
            self.total,
            self.success,
            self.failed(),
        );

        if !self.failed_ids.is_empty() {
            let shown: Vec<String> = self
                .failed_ids
                .iter()
                .take(FAILED_IDS_SHOWN)
                .map(ToString::to_string)
                .collect();
            let _ = write!(text, "\n\n⚠️ Users with delivery errors:\n{}", shown.join(", "));
            if self.failed_ids.len() > FAILED_IDS_SHOWN {
                let _ = write!(
                    text,
                    "\nand {} more users...",
                    self.failed_ids.len() - FAILED_IDS_SHOWN
                );
            }
        }

        text
    }
}

fn progress_text(heading: &str, total: usize, success: usize, failed: usize) -> String {
    format!("{heading}\nTotal users: {total}\nDelivered: {success}\nFailed: {failed}")
}

/// Fans a message out to every known user.
pub struct Broadcaster<M> {
    store: SqliteStore,
    messenger: Arc<M>,
    limiter: RateLimiter,
}

impl<M: Messenger> Broadcaster<M> {
    #[must_use]
    pub const fn new(store: SqliteStore, messenger: Arc<M>, limiter: RateLimiter) -> Self {
        Self {
            store,
            messenger,
            limiter,
        }
    }

    /// Delivers `payload` to every user and reports progress to `admin_chat`.
    ///
    /// Recipients are read once up front. A failed recipient is recorded and
    /// skipped; nothing is retried.
    pub async fn run(
        &self,
        admin_chat: i64,
        payload: &BroadcastPayload,
    ) -> Result<BroadcastReport, BroadcastError> {
        let recipients = self.store.all_user_ids().await?;
        let total = recipients.len();
        info!("Starting broadcast to {} users", total);

        let progress_id = self
            .messenger
            .send_text(
                admin_chat,
                &progress_text("📤 Starting the broadcast...", total, 0, 0),
                None,
            )
            .await?;

        let mut report = BroadcastReport {
            total,
            ..BroadcastReport::default()
        };

        for (i, user_id) in recipients.into_iter().enumerate() {
            self.limiter.wait_and_acquire().await;

            match payload.deliver(self.messenger.as_ref(), user_id).await {
                Ok(_) => report.success += 1,
                Err(TelegramError::FloodWait(seconds)) => {
                    warn!("Flood wait while sending to {}", user_id);
                    report.failed_ids.push(user_id);
                    self.limiter.handle_flood_wait(seconds).await;
                }
                Err(e) => {
                    warn!("Failed to deliver broadcast to {}: {}", user_id, e);
                    report.failed_ids.push(user_id);
                }
            }

            let sent = i + 1;
            if sent % PROGRESS_EVERY == 0 && sent < total {
                self.messenger
                    .edit_text(
                        admin_chat,
                        progress_id,
                        &progress_text(
                            "📤 Broadcast in progress...",
                            total,
                            report.success,
                            report.failed(),
                        ),
                        None,
                    )
                    .await?;
            }
        }

        self.messenger
            .edit_text(admin_chat, progress_id, &report.render(), None)
            .await?;

        info!(
            "Broadcast finished: {}/{} delivered, {} failed",
            report.success,
            total,
            report.failed()
        );
        Ok(report)
    }
}

impl<M> std::fmt::Debug for Broadcaster<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}
