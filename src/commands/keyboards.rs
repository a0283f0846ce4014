//! Keyboards and fixed screens shown by the handler.

use std::fmt::Write as _;

use super::types::{ADMIN_PANEL_LABEL, BALANCE_PREFIX, Callback, MY_TASKS_LABEL, SUPPORT_LABEL};
use crate::config::BotConfig;
use crate::feed::truncate;
use crate::session::EditField;
use crate::store::{Task, TaskId, TaskKind, UserId};
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, ReplyKeyboardMarkup};

pub const ADMIN_MENU_TEXT: &str = "Admin panel\nChoose an action:";

pub const BROADCAST_PROMPT: &str = "📢 Broadcast mode\n\n\
    Send the message to broadcast:\n\
    • plain text\n\
    • a photo with a caption\n\
    • a video with a caption\n\n\
    ❗️ The message will be sent to every user of the bot";

pub const SCREENSHOT_PROMPT: &str = "📸 Please send a screenshot of the completed task.\n\n\
    ❗️ Make sure the screenshot shows:\n\
    - the date and time\n\
    - proof that the task was completed";

pub const DELETE_PROMPT: &str =
    "❗️ Are you sure you want to delete this task?\nThis cannot be undone!";

/// Reply keyboard with the feed, balance and support buttons.
///
/// Administrators also get a button back to the admin panel.
pub fn main_keyboard(config: &BotConfig, user_id: UserId, balance: f64) -> ReplyKeyboardMarkup {
    let mut rows = vec![
        vec![MY_TASKS_LABEL.to_owned()],
        vec![
            format!("{BALANCE_PREFIX} {}", config.money(balance)),
            SUPPORT_LABEL.to_owned(),
        ],
    ];
    if config.is_admin(user_id) {
        rows.push(vec![ADMIN_PANEL_LABEL.to_owned()]);
    }
    ReplyKeyboardMarkup::from_rows(rows)
}

pub fn welcome_keyboard(config: &BotConfig) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![InlineKeyboardButton::callback(
        config.understand_button.clone(),
        Callback::Understand,
    )])
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![
        InlineKeyboardButton::callback("➕ Add task", Callback::AddTask),
        InlineKeyboardButton::callback("📋 Task list", Callback::ListTasks),
        InlineKeyboardButton::callback("📝 Edit tasks", Callback::EditTasks),
        InlineKeyboardButton::callback("📢 Broadcast", Callback::Broadcast),
        InlineKeyboardButton::callback("👤 User mode", Callback::UserMode),
    ])
}

fn back_to_admin() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("◀️ Back", Callback::BackToAdmin)
}

pub fn back_only() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![back_to_admin()])
}

pub fn task_kinds() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![
        InlineKeyboardButton::callback(
            TaskKind::Subscribe.label(),
            Callback::NewTask(TaskKind::Subscribe),
        ),
        InlineKeyboardButton::callback(
            TaskKind::Register.label(),
            Callback::NewTask(TaskKind::Register),
        ),
        back_to_admin(),
    ])
}

pub fn broadcast_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![
        InlineKeyboardButton::callback("❌ Cancel", Callback::CancelBroadcast),
        back_to_admin(),
    ])
}

/// Approve/reject buttons under a submitted screenshot.
pub fn review(user: UserId, task: TaskId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", Callback::Approve { user, task }),
        InlineKeyboardButton::callback("❌ Reject", Callback::Reject { user, task }),
    ]])
}

/// Text of the admin task list.
pub fn task_list(tasks: &[Task], config: &BotConfig) -> String {
    if tasks.is_empty() {
        return "The task list is empty".to_owned();
    }
    let mut text = String::from("📝 Task list:\n\n");
    for task in tasks {
        let _ = write!(
            text,
            "#{} - {}\nType: {}\nReward: {}\n\n",
            task.id,
            task.description,
            task.kind,
            config.money(task.reward)
        );
    }
    text.trim_end().to_owned()
}

/// One button per task leading to its edit menu.
pub fn edit_list(tasks: &[Task]) -> InlineKeyboardMarkup {
    let mut buttons: Vec<_> = tasks
        .iter()
        .map(|t| {
            InlineKeyboardButton::callback(
                format!("#{} - {}", t.id, truncate(&t.description, 30)),
                Callback::EditTask(t.id),
            )
        })
        .collect();
    buttons.push(back_to_admin());
    InlineKeyboardMarkup::column(buttons)
}

/// Summary of a task with its edit actions.
pub fn edit_options(task: &Task, config: &BotConfig) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "📋 Task #{}\n\nType: {}\nDescription: {}\nReward: {}\nLink: {}",
        task.id,
        task.kind,
        task.description,
        config.money(task.reward),
        task.link()
    );
    let id = task.id;
    let keyboard = InlineKeyboardMarkup::column(vec![
        InlineKeyboardButton::callback(
            "📝 Edit description",
            Callback::EditField(EditField::Description, id),
        ),
        InlineKeyboardButton::callback("💰 Edit reward", Callback::EditField(EditField::Reward, id)),
        InlineKeyboardButton::callback("🔗 Edit link", Callback::EditField(EditField::Link, id)),
        InlineKeyboardButton::callback(
            "📊 Edit position",
            Callback::EditField(EditField::Position, id),
        ),
        InlineKeyboardButton::callback("❌ Delete task", Callback::DeleteTask(id)),
        InlineKeyboardButton::callback("◀️ Back", Callback::EditTasks),
    ]);
    (text, keyboard)
}

/// Cancel button under an edit prompt.
pub fn edit_cancel(task: TaskId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![InlineKeyboardButton::callback(
        "◀️ Cancel",
        Callback::EditTask(task),
    )])
}

pub fn delete_confirmation(task: TaskId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Yes", Callback::ConfirmDelete(task)),
        InlineKeyboardButton::callback("❌ No", Callback::EditTask(task)),
    ]])
}
