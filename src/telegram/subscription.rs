//! Channel membership checks through a dedicated bot.

use tracing::{debug, warn};

use super::{MembershipCheck, TelegramBot, TelegramError};
use crate::store::UserId;

/// Checks channel subscriptions with the Bot API.
///
/// The checking bot must be an administrator of the channel, otherwise
/// Telegram refuses to reveal its member list.
#[derive(Debug, Clone)]
pub struct SubscriptionChecker {
    bot: TelegramBot,
}

impl SubscriptionChecker {
    #[must_use]
    pub const fn new(bot: TelegramBot) -> Self {
        Self { bot }
    }

    async fn lookup(&self, channel_handle: &str, user_id: UserId) -> Result<bool, TelegramError> {
        let chat = self.bot.get_chat(channel_handle).await?;
        let member = self.bot.get_chat_member(chat.id, user_id).await?;
        debug!(
            channel = channel_handle,
            user_id,
            status = %member.status,
            "Membership looked up"
        );
        Ok(member.is_subscribed())
    }
}

impl MembershipCheck for SubscriptionChecker {
    async fn is_member(&self, channel_handle: &str, user_id: UserId) -> bool {
        match self.lookup(channel_handle, user_id).await {
            Ok(subscribed) => subscribed,
            Err(e) => {
                warn!(
                    "Subscription check for user {} in @{} failed: {}",
                    user_id, channel_handle, e
                );
                false
            }
        }
    }
}
