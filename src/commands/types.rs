//! Command types and definitions.

use std::fmt;
use std::str::FromStr;

use crate::session::EditField;
use crate::store::{TaskId, TaskKind, UserId};

/// Label of the reply-keyboard button that opens the task feed.
pub const MY_TASKS_LABEL: &str = "✅ My tasks ✅";

/// Prefix of the reply-keyboard button showing the balance.
pub const BALANCE_PREFIX: &str = "Balance:";

pub const SUPPORT_LABEL: &str = "Support";

/// Label of the button that brings an admin back from user mode.
pub const ADMIN_PANEL_LABEL: &str = "👑 Admin panel";

/// Action carried by an inline button.
///
/// Encoded into callback data with [`fmt::Display`] and decoded with
/// [`FromStr`]; the two are inverse of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    /// "I understand" under the welcome message.
    Understand,

    /// Open the task creation menu.
    AddTask,

    /// Start a draft of the given kind.
    NewTask(TaskKind),

    /// Show every active task.
    ListTasks,

    /// Return to the admin panel.
    BackToAdmin,

    /// Ask for a message to broadcast.
    Broadcast,

    CancelBroadcast,

    /// Switch an admin to the user keyboard.
    UserMode,

    /// Approve a screenshot of `user` for `task`.
    Approve { user: UserId, task: TaskId },

    /// Reject a screenshot of `user` for `task`.
    Reject { user: UserId, task: TaskId },

    /// Verify a channel subscription.
    CheckSubscription(TaskId),

    /// Show the next task of the feed.
    NextTask,

    /// Ask for a screenshot for a registration task.
    SendScreenshot(TaskId),

    /// List tasks for editing.
    EditTasks,

    /// Show the edit menu of one task.
    EditTask(TaskId),

    /// Prompt for a new value of one field.
    EditField(EditField, TaskId),

    /// Ask for confirmation before deleting.
    DeleteTask(TaskId),

    ConfirmDelete(TaskId),
}

impl Callback {
    /// Whether only administrators may trigger this action.
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        !matches!(
            self,
            Self::Understand | Self::CheckSubscription(_) | Self::NextTask | Self::SendScreenshot(_)
        )
    }

    fn parse_edit_field(name: &str) -> Option<EditField> {
        match name {
            "desc" => Some(EditField::Description),
            "reward" => Some(EditField::Reward),
            "link" => Some(EditField::Link),
            "position" => Some(EditField::Position),
            _ => None,
        }
    }

    fn parse_pair(args: &str) -> Option<(UserId, TaskId)> {
        let (user, task) = args.split_once('_')?;
        Some((user.parse().ok()?, task.parse().ok()?))
    }
}

/// Error returned for callback data that matches no known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown callback data: '{0}'")]
pub struct UnknownCallback(pub String);

impl FromStr for Callback {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(data.to_owned());

        let simple = match data {
            "understand" => Some(Self::Understand),
            "add_task" => Some(Self::AddTask),
            "list_tasks" => Some(Self::ListTasks),
            "back_to_admin" => Some(Self::BackToAdmin),
            "broadcast" => Some(Self::Broadcast),
            "cancel_broadcast" => Some(Self::CancelBroadcast),
            "user_mode" => Some(Self::UserMode),
            "next_task" => Some(Self::NextTask),
            "edit_tasks" => Some(Self::EditTasks),
            _ => None,
        };
        if let Some(callback) = simple {
            return Ok(callback);
        }

        let id = |rest: &str| rest.parse::<TaskId>().map_err(|_| unknown());

        if let Some(kind) = data.strip_prefix("new_task_") {
            return kind.parse().map(Self::NewTask).map_err(|_| unknown());
        }
        if let Some(rest) = data.strip_prefix("approve_") {
            let (user, task) = Self::parse_pair(rest).ok_or_else(unknown)?;
            return Ok(Self::Approve { user, task });
        }
        if let Some(rest) = data.strip_prefix("reject_") {
            let (user, task) = Self::parse_pair(rest).ok_or_else(unknown)?;
            return Ok(Self::Reject { user, task });
        }
        if let Some(rest) = data.strip_prefix("check_sub_") {
            return id(rest).map(Self::CheckSubscription);
        }
        if let Some(rest) = data.strip_prefix("send_screenshot_") {
            return id(rest).map(Self::SendScreenshot);
        }
        if let Some(rest) = data.strip_prefix("edit_task_") {
            return id(rest).map(Self::EditTask);
        }
        if let Some(rest) = data.strip_prefix("delete_task_") {
            return id(rest).map(Self::DeleteTask);
        }
        if let Some(rest) = data.strip_prefix("confirm_delete_") {
            return id(rest).map(Self::ConfirmDelete);
        }
        if let Some(rest) = data.strip_prefix("edit_") {
            let (field, task) = rest.split_once('_').ok_or_else(unknown)?;
            let field = Self::parse_edit_field(field).ok_or_else(unknown)?;
            return id(task).map(|task| Self::EditField(field, task));
        }

        Err(unknown())
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Understand => write!(f, "understand"),
            Self::AddTask => write!(f, "add_task"),
            Self::NewTask(kind) => write!(f, "new_task_{kind}"),
            Self::ListTasks => write!(f, "list_tasks"),
            Self::BackToAdmin => write!(f, "back_to_admin"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::CancelBroadcast => write!(f, "cancel_broadcast"),
            Self::UserMode => write!(f, "user_mode"),
            Self::Approve { user, task } => write!(f, "approve_{user}_{task}"),
            Self::Reject { user, task } => write!(f, "reject_{user}_{task}"),
            Self::CheckSubscription(id) => write!(f, "check_sub_{id}"),
            Self::NextTask => write!(f, "next_task"),
            Self::SendScreenshot(id) => write!(f, "send_screenshot_{id}"),
            Self::EditTasks => write!(f, "edit_tasks"),
            Self::EditTask(id) => write!(f, "edit_task_{id}"),
            Self::EditField(field, id) => write!(f, "edit_{field}_{id}"),
            Self::DeleteTask(id) => write!(f, "delete_task_{id}"),
            Self::ConfirmDelete(id) => write!(f, "confirm_delete_{id}"),
        }
    }
}

/// Commands typed by the user or sent by the reply keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    /// `/start`
    Start,

    /// Open the task feed.
    MyTasks,

    /// Show the balance.
    Balance,

    /// Show the support contact.
    Support,

    /// Return an admin to the admin panel.
    AdminPanel,
}

impl MenuCommand {
    /// Parses a message text into a menu command.
    ///
    /// Returns `None` if the text is not a menu command, in which case it
    /// may be an answer to a prompt.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        // "/start" may carry a deep-link payload or a bot mention.
        let command = text.split_whitespace().next().unwrap_or_default();
        if command == "/start" || command.starts_with("/start@") {
            return Some(Self::Start);
        }

        match text {
            MY_TASKS_LABEL => Some(Self::MyTasks),
            SUPPORT_LABEL => Some(Self::Support),
            ADMIN_PANEL_LABEL => Some(Self::AdminPanel),
            t if t.starts_with(BALANCE_PREFIX) => Some(Self::Balance),
            _ => None,
        }
    }
}

impl fmt::Display for MenuCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::MyTasks => write!(f, "my tasks"),
            Self::Balance => write!(f, "balance"),
            Self::Support => write!(f, "support"),
            Self::AdminPanel => write!(f, "admin panel"),
        }
    }
}
