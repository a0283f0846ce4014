//! Telegram transport module.
//!
//! Provides the Bot API client, the seams the rest of the bot talks
//! through ([`Messenger`] and [`MembershipCheck`]), outbound rate
//! limiting and screenshot storage.

mod client;
mod rate_limiter;
mod screenshots;
mod subscription;
pub mod types;

use std::future::Future;

pub use client::{TelegramBot, TelegramError};
pub use rate_limiter::RateLimiter;
pub use screenshots::ScreenshotStore;
pub use subscription::SubscriptionChecker;
pub use types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, MessageId, ParseMode,
    ReplyKeyboardMarkup, ReplyMarkup, Update,
};

use crate::store::UserId;

/// Outbound side of the messaging transport.
pub trait Messenger: Send + Sync + 'static {
    /// Sends a text message and returns its id.
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> impl Future<Output = Result<MessageId, TelegramError>> + Send;

    /// Sends a plain text message.
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> impl Future<Output = Result<MessageId, TelegramError>> + Send {
        self.send_message(chat_id, text, None, markup)
    }

    /// Sends an already uploaded photo by file id.
    fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> impl Future<Output = Result<MessageId, TelegramError>> + Send;

    /// Sends an already uploaded video by file id.
    fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> impl Future<Output = Result<MessageId, TelegramError>> + Send;

    /// Replaces the text (and inline keyboard) of a sent message.
    fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    fn delete_message(
        &self,
        chat_id: i64,
        message_id: MessageId,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    /// Acknowledges a button press, optionally with a toast or alert.
    fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    /// Downloads the contents of an uploaded file.
    fn download_file(
        &self,
        file_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TelegramError>> + Send;
}

/// Inbound side of the transport: batches of updates after an offset.
pub trait UpdateSource: Send + Sync + 'static {
    fn next_batch(
        &self,
        offset: i64,
    ) -> impl Future<Output = Result<Vec<Update>, TelegramError>> + Send;
}

/// Answers whether a user currently belongs to a channel.
///
/// Implementations never fail: any error means "not a member".
pub trait MembershipCheck: Send + Sync + 'static {
    fn is_member(
        &self,
        channel_handle: &str,
        user_id: UserId,
    ) -> impl Future<Output = bool> + Send;
}
