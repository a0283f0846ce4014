//! Telegram Bot API client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{
    ApiResponse, ChatInfo, ChatMember, File, InlineKeyboardMarkup, Message, MessageId, ParseMode,
    ReplyMarkup, Update, User,
};
use super::{Messenger, UpdateSource};
use crate::config::TelegramConfig;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    /// Transport failure. The request URL is stripped since it carries the token.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Telegram returned no file path for {0}")]
    MissingFilePath(String),

    #[error("Telegram reported success without a result")]
    EmptyResult,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if self.ok {
            return self.result.ok_or(TelegramError::EmptyResult);
        }

        if let Some(seconds) = self.parameters.and_then(|p| p.retry_after) {
            return Err(TelegramError::FloodWait(seconds));
        }

        Err(TelegramError::Api {
            code: self.error_code.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: i64,
    photo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Serialize)]
struct SendVideo<'a> {
    chat_id: i64,
    video: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: MessageId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct MessageRef {
    chat_id: i64,
    message_id: MessageId,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct FileRef<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct ChatRef<'a> {
    chat_id: &'a str,
}

#[derive(Serialize)]
struct ChatMemberRef {
    chat_id: i64,
    user_id: i64,
}

#[derive(Serialize)]
struct NoParams {}

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramBot {
    http: Client,
    /// `<api_url>/bot<token>`
    method_base: String,
    /// `<api_url>/file/bot<token>`
    file_base: String,
    poll_timeout: Duration,
}

impl TelegramBot {
    /// Creates a client for `token` against the configured API server.
    #[must_use]
    pub fn new(config: &TelegramConfig, token: &str) -> Self {
        let api_url = config.api_url.trim_end_matches('/');
        Self {
            http: Client::new(),
            method_base: format!("{api_url}/bot{token}"),
            file_base: format!("{api_url}/file/bot{token}"),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }

    /// Client for the bot users talk to.
    #[must_use]
    pub fn main(config: &TelegramConfig) -> Self {
        Self::new(config, &config.bot_token)
    }

    /// Client for the bot that performs membership checks.
    #[must_use]
    pub fn checker(config: &TelegramConfig) -> Self {
        Self::new(config, &config.check_bot_token)
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{method}", self.method_base))
            .json(params)
            .send()
            .await?
            .json()
            .await?;

        response.into_result()
    }

    /// Returns the bot's own account, used to verify the token on startup.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        let me: User = self.call("getMe", &NoParams {}).await?;
        info!(
            "Authorized as @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.id
        );
        Ok(me)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ["message", "callback_query"],
        };

        let response: ApiResponse<Vec<Update>> = self
            .http
            .post(format!("{}/getUpdates", self.method_base))
            .timeout(self.poll_timeout + Duration::from_secs(10))
            .json(&params)
            .send()
            .await?
            .json()
            .await?;

        response.into_result()
    }

    /// Resolves a public `@handle` to its chat.
    pub async fn get_chat(&self, handle: &str) -> Result<ChatInfo, TelegramError> {
        let chat_id = format!("@{}", handle.trim_start_matches('@'));
        self.call("getChat", &ChatRef { chat_id: &chat_id }).await
    }

    /// Looks up a user's membership in a chat.
    pub async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, TelegramError> {
        self.call("getChatMember", &ChatMemberRef { chat_id, user_id })
            .await
    }
}

impl Messenger for TelegramBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId, TelegramError> {
        debug!("Sending to {}: \"{}\"", chat_id, crate::feed::truncate(text, 30));
        let sent: Message = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id,
                    text,
                    parse_mode,
                    reply_markup: markup,
                },
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageId, TelegramError> {
        let sent: Message = self
            .call(
                "sendPhoto",
                &SendPhoto {
                    chat_id,
                    photo: file_id,
                    caption,
                    parse_mode,
                    reply_markup: markup,
                },
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn send_video(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageId, TelegramError> {
        let sent: Message = self
            .call(
                "sendVideo",
                &SendVideo {
                    chat_id,
                    video: file_id,
                    caption,
                    parse_mode,
                },
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageText {
                    chat_id,
                    message_id,
                    text,
                    reply_markup: markup,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<(), TelegramError> {
        let _: bool = self
            .call("deleteMessage", &MessageRef { chat_id, message_id })
            .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery {
                    callback_query_id: callback_id,
                    text,
                    show_alert,
                },
            )
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        let file: File = self.call("getFile", &FileRef { file_id }).await?;
        let path = file
            .file_path
            .ok_or_else(|| TelegramError::MissingFilePath(file.file_id.clone()))?;

        let response = self
            .http
            .get(format!("{}/{path}", self.file_base))
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            warn!("Downloaded empty file {}", file_id);
        }
        Ok(bytes.to_vec())
    }
}

impl UpdateSource for TelegramBot {
    async fn next_batch(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.get_updates(offset).await
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}
