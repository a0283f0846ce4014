//! Test doubles for the transport seams.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::store::UserId;
use crate::telegram::{
    InlineKeyboardMarkup, MembershipCheck, MessageId, Messenger, ParseMode, ReplyMarkup,
    TelegramError,
};

/// Everything a [`RecordingMessenger`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    },
    Photo {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    },
    Video {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
        parse_mode: Option<ParseMode>,
    },
    Edit {
        chat_id: i64,
        message_id: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Delete {
        chat_id: i64,
        message_id: MessageId,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
}

impl Sent {
    /// Chat the action targeted, if any.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Text { chat_id, .. }
            | Self::Photo { chat_id, .. }
            | Self::Video { chat_id, .. }
            | Self::Edit { chat_id, .. }
            | Self::Delete { chat_id, .. } => Some(*chat_id),
            Self::Answer { .. } => None,
        }
    }

    /// Text, caption or callback answer carried by the action.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } | Self::Edit { text, .. } => Some(text),
            Self::Photo { caption, .. } | Self::Video { caption, .. } => caption.as_deref(),
            Self::Answer { text, .. } => text.as_deref(),
            Self::Delete { .. } => None,
        }
    }

    /// Formatting requested for the text or caption.
    pub fn parse_mode(&self) -> Option<ParseMode> {
        match self {
            Self::Text { parse_mode, .. }
            | Self::Photo { parse_mode, .. }
            | Self::Video { parse_mode, .. } => *parse_mode,
            _ => None,
        }
    }

    /// Inline keyboard attached to the action, if any.
    pub fn inline_keyboard(&self) -> Option<&InlineKeyboardMarkup> {
        match self {
            Self::Text {
                markup: Some(ReplyMarkup::Inline(k)),
                ..
            }
            | Self::Photo {
                markup: Some(ReplyMarkup::Inline(k)),
                ..
            }
            | Self::Edit {
                markup: Some(k), ..
            } => Some(k),
            _ => None,
        }
    }
}

/// Messenger that records calls instead of talking to Telegram.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<i64>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicI64,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `chat_id` fail as if the bot was blocked.
    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    /// Registers the contents returned for `file_id`.
    pub fn add_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_owned(), bytes.to_vec());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Recorded actions aimed at `chat_id`.
    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat_id() == Some(chat_id))
            .collect()
    }

    /// Texts and captions of everything aimed at `chat_id`.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .filter_map(|s| s.text().map(str::to_owned))
            .collect()
    }

    /// Callback answers, in order.
    pub fn answers(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Answer { .. }))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn check(&self, chat_id: i64) -> Result<(), TelegramError> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(TelegramError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_owned(),
            });
        }
        Ok(())
    }

    fn message_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId, TelegramError> {
        self.check(chat_id)?;
        self.record(Sent::Text {
            chat_id,
            text: text.to_owned(),
            parse_mode,
            markup,
        });
        Ok(self.message_id())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId, TelegramError> {
        self.check(chat_id)?;
        self.record(Sent::Photo {
            chat_id,
            file_id: file_id.to_owned(),
            caption: caption.map(str::to_owned),
            parse_mode,
            markup,
        });
        Ok(self.message_id())
    }

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageId, TelegramError> {
        self.check(chat_id)?;
        self.record(Sent::Video {
            chat_id,
            file_id: file_id.to_owned(),
            caption: caption.map(str::to_owned),
            parse_mode,
        });
        Ok(self.message_id())
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        self.check(chat_id)?;
        self.record(Sent::Edit {
            chat_id,
            message_id,
            text: text.to_owned(),
            markup,
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<(), TelegramError> {
        self.check(chat_id)?;
        self.record(Sent::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_owned(),
            text: text.map(str::to_owned),
            show_alert,
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TelegramError::MissingFilePath(file_id.to_owned()))
    }
}

/// Membership check answering from a fixed list of members.
#[derive(Debug, Default)]
pub struct ScriptedChecker {
    members: Mutex<HashSet<(String, UserId)>>,
    calls: Mutex<Vec<(String, UserId)>>,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `user_id` a member of `channel_handle`.
    pub fn add_member(&self, channel_handle: &str, user_id: UserId) {
        self.members
            .lock()
            .unwrap()
            .insert((channel_handle.to_owned(), user_id));
    }

    /// Every lookup made so far.
    pub fn calls(&self) -> Vec<(String, UserId)> {
        self.calls.lock().unwrap().clone()
    }
}

impl MembershipCheck for ScriptedChecker {
    async fn is_member(&self, channel_handle: &str, user_id: UserId) -> bool {
        let key = (channel_handle.to_owned(), user_id);
        self.calls.lock().unwrap().push(key.clone());
        self.members.lock().unwrap().contains(&key)
    }
}
