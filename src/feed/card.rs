//! Rendering of a task as a message with buttons.

use super::{format_channel_link, registration_url};
use crate::commands::Callback;
use crate::config::BotConfig;
use crate::store::{Task, TaskKind};
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

/// A task ready to be shown to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

impl TaskCard {
    /// Builds the card for `task`.
    #[must_use]
    pub fn render(task: &Task, config: &BotConfig) -> Self {
        let (steps, link_button, action) = match task.kind {
            TaskKind::Subscribe => (
                "1. Open the link\n2. Subscribe to the channel\n3. Press the check button",
                InlineKeyboardButton::url("📢 Open channel", format_channel_link(task.link())),
                InlineKeyboardButton::callback(
                    "✅ Check subscription",
                    Callback::CheckSubscription(task.id),
                ),
            ),
            TaskKind::Register => (
                "1. Open the link\n2. Register on the site\n3. Send a screenshot",
                InlineKeyboardButton::url("🌐 Open site", registration_url(task.link())),
                InlineKeyboardButton::callback(
                    "📸 Send screenshot",
                    Callback::SendScreenshot(task.id),
                ),
            ),
        };

        let text = format!(
            "📋 Task #{}\n\n\
             Type: {}\n\
             💎 Reward: {}\n\n\
             📝 Description:\n{}\n\n\
             ✅ To complete the task:\n{steps}",
            task.id,
            task.kind.label(),
            config.money(task.reward),
            task.description,
        );

        let keyboard = InlineKeyboardMarkup::column(vec![
            link_button,
            action,
            InlineKeyboardButton::callback("➡️ Next task", Callback::NextTask),
        ]);

        Self { text, keyboard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskExtra;

    fn task(kind: TaskKind, link: &str) -> Task {
        Task {
            id: 3,
            kind,
            description: "Do the thing".to_owned(),
            reward: 10.0,
            order_num: 1,
            extra: TaskExtra::with_link(kind, link),
            is_active: true,
        }
    }

    fn callbacks(card: &TaskCard) -> Vec<&str> {
        card.keyboard
            .buttons()
            .filter_map(|b| b.callback_data.as_deref())
            .collect()
    }

    #[test]
    fn test_subscribe_card() {
        let card = TaskCard::render(&task(TaskKind::Subscribe, "@chan"), &BotConfig::example());

        assert!(card.text.starts_with("📋 Task #3"));
        assert!(card.text.contains("Channel subscription"));
        assert!(card.text.contains("💎 Reward: 10 ₽"));
        assert!(card.text.contains("Do the thing"));

        let url = card.keyboard.buttons().find_map(|b| b.url.as_deref());
        assert_eq!(url, Some("https://t.me/chan"));
        assert_eq!(callbacks(&card), ["check_sub_3", "next_task"]);
    }

    #[test]
    fn test_register_card() {
        let card = TaskCard::render(
            &task(TaskKind::Register, "example.com/join"),
            &BotConfig::example(),
        );

        assert!(card.text.contains("Site registration"));
        let url = card.keyboard.buttons().find_map(|b| b.url.as_deref());
        assert_eq!(url, Some("https://example.com/join"));
        assert_eq!(callbacks(&card), ["send_screenshot_3", "next_task"]);
    }
}
