//! Subset of the Telegram Bot API object model used by the bot.

use serde::{Deserialize, Serialize};

/// Identifier of a message inside a chat.
pub type MessageId = i64;

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Id of the user who caused the update, when there is one.
    #[must_use]
    pub fn sender_id(&self) -> Option<i64> {
        if let Some(query) = &self.callback_query {
            return Some(query.from.id);
        }
        self.message.as_ref().and_then(|m| m.from.as_ref()).map(|u| u.id)
    }
}

/// Telegram user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

/// Chat a message belongs to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A message, incoming or one of ours.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    pub video: Option<Video>,
}

impl Message {
    /// The largest available size of an attached photo.
    #[must_use]
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }
}

/// One size variant of a photo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Attached video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Video {
    pub file_id: String,
}

/// Press on an inline button.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// File metadata returned by `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_path: Option<String>,
}

/// Chat returned by `getChat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub title: Option<String>,
}

/// Membership entry returned by `getChatMember`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

impl ChatMember {
    /// Members, administrators and the creator count as subscribed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        matches!(self.status.as_str(), "member" | "administrator" | "creator")
    }
}

/// Button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    /// Button that sends `data` back as a callback query.
    pub fn callback(text: impl Into<String>, data: impl ToString) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.to_string()),
            url: None,
        }
    }

    /// Button that opens a link.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Keyboard attached under a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    #[must_use]
    pub const fn new(rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            inline_keyboard: rows,
        }
    }

    /// One button per row.
    #[must_use]
    pub fn column(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self::new(buttons.into_iter().map(|b| vec![b]).collect())
    }

    /// Iterates over every button, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineKeyboardButton> {
        self.inline_keyboard.iter().flatten()
    }
}

/// Button of a reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// Keyboard replacing the user's input keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboardMarkup {
    /// Builds a resized keyboard from rows of labels.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            keyboard: rows
                .into_iter()
                .map(|row| row.into_iter().map(|text| KeyboardButton { text }).collect())
                .collect(),
            resize_keyboard: true,
        }
    }
}

/// Formatting applied by Telegram to a message text or caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

/// Any keyboard that can accompany a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
}

impl From<InlineKeyboardMarkup> for ReplyMarkup {
    fn from(markup: InlineKeyboardMarkup) -> Self {
        Self::Inline(markup)
    }
}

impl From<ReplyKeyboardMarkup> for ReplyMarkup {
    fn from(markup: ReplyKeyboardMarkup) -> Self {
        Self::Keyboard(markup)
    }
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseParameters {
    pub retry_after: Option<u32>,
}
