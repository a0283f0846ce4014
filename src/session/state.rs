//! Conversation state of a single user.
//!
//! Multi-step flows (creating a task, editing a field, submitting a
//! screenshot, composing a broadcast) are driven by [`ConversationState`].
//! Every move goes through [`ConversationState::transition`]:
//!
//! - button presses that open a flow are accepted from any state and
//!   abandon whatever was in progress;
//! - inputs that continue a flow are only accepted in the state that asked
//!   for them;
//! - `Cancel` always returns to `Idle`.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::feed::TaskFeed;
use crate::store::{Task, TaskId, TaskKind};

/// Field of a task an admin is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Description,
    Reward,
    Link,
    Position,
}

impl EditField {
    /// Short name used in callback data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Description => "desc",
            Self::Reward => "reward",
            Self::Link => "link",
            Self::Position => "position",
        }
    }

    /// Prompt asking for the new value.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Description => "Enter the new task description:",
            Self::Reward => "Enter the new reward:",
            Self::Link => "Enter the new link:",
            Self::Position => "Enter the new position (a number):",
        }
    }
}

impl fmt::Display for EditField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a user is in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingDescription,
    AwaitingReward,
    AwaitingLink,
    AwaitingScreenshot,
    EditingField(EditField),
    AwaitingBroadcast,
}

/// Something that moves a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StartDraft,
    DescriptionEntered,
    RewardEntered,
    LinkEntered,
    RequestScreenshot,
    ScreenshotReceived,
    BeginEdit(EditField),
    EditApplied,
    BeginBroadcast,
    BroadcastSent,
    Cancel,
}

/// Errors raised when a session is driven out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Cannot apply {event:?} while {state:?}")]
    InvalidTransition {
        state: ConversationState,
        event: SessionEvent,
    },

    #[error("Task draft is missing its {0}")]
    IncompleteDraft(&'static str),

    #[error("No task selected")]
    NoTarget,
}

impl ConversationState {
    /// The transition table.
    pub fn transition(self, event: SessionEvent) -> Result<Self, SessionError> {
        use ConversationState as S;
        use SessionEvent as E;

        let next = match (self, event) {
            (_, E::Cancel) => S::Idle,

            (_, E::StartDraft) => S::AwaitingDescription,
            (_, E::RequestScreenshot) => S::AwaitingScreenshot,
            (_, E::BeginEdit(field)) => S::EditingField(field),
            (_, E::BeginBroadcast) => S::AwaitingBroadcast,

            (S::AwaitingDescription, E::DescriptionEntered) => S::AwaitingReward,
            (S::AwaitingReward, E::RewardEntered) => S::AwaitingLink,
            (S::AwaitingLink, E::LinkEntered)
            | (S::AwaitingScreenshot, E::ScreenshotReceived)
            | (S::EditingField(_), E::EditApplied)
            | (S::AwaitingBroadcast, E::BroadcastSent) => S::Idle,

            (state, event) => return Err(SessionError::InvalidTransition { state, event }),
        };

        Ok(next)
    }

    /// True while a free-text answer from an admin is expected.
    #[must_use]
    pub const fn expects_admin_text(self) -> bool {
        matches!(
            self,
            Self::AwaitingDescription
                | Self::AwaitingReward
                | Self::AwaitingLink
                | Self::EditingField(_)
        )
    }
}

/// Task being assembled by an admin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub kind: Option<TaskKind>,
    pub description: Option<String>,
    pub reward: Option<f64>,
}

/// A draft with every field filled in, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDraft {
    pub kind: TaskKind,
    pub description: String,
    pub reward: f64,
    pub link: String,
}

/// Task a user is about to submit a screenshot for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenshotTarget {
    pub task_id: TaskId,
    pub reward: f64,
}

/// Everything remembered about one user's conversation.
#[derive(Debug, Clone)]
pub struct SessionState {
    state: ConversationState,

    /// Task being created.
    pub draft: TaskDraft,

    /// Tasks shown by "My tasks", cycled by "Next task".
    pub feed: TaskFeed,

    /// Task awaiting a screenshot.
    pub screenshot_target: Option<ScreenshotTarget>,

    /// Task whose edit menu is open.
    pub editing_task: Option<TaskId>,

    last_activity: Instant,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: ConversationState::Idle,
            draft: TaskDraft::default(),
            feed: TaskFeed::default(),
            screenshot_target: None,
            editing_task: None,
            last_activity: Instant::now(),
        }
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current conversation state.
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.state
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        self.state = self.state.transition(event)?;
        self.touch();
        Ok(())
    }

    /// Marks the session as used now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Whether the session has been idle for longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() >= ttl
    }

    /// Starts a new task draft of the given kind.
    pub fn start_draft(&mut self, kind: TaskKind) -> Result<(), SessionError> {
        self.apply(SessionEvent::StartDraft)?;
        self.draft = TaskDraft {
            kind: Some(kind),
            ..TaskDraft::default()
        };
        Ok(())
    }

    /// Stores the description of the draft.
    pub fn enter_description(&mut self, description: String) -> Result<(), SessionError> {
        self.apply(SessionEvent::DescriptionEntered)?;
        self.draft.description = Some(description);
        Ok(())
    }

    /// Stores the reward of the draft and returns the draft's kind.
    pub fn enter_reward(&mut self, reward: f64) -> Result<TaskKind, SessionError> {
        let kind = self.draft.kind.ok_or(SessionError::IncompleteDraft("kind"))?;
        self.apply(SessionEvent::RewardEntered)?;
        self.draft.reward = Some(reward);
        Ok(kind)
    }

    /// Completes the draft with its link and hands it out.
    pub fn finish_draft(&mut self, link: String) -> Result<CompletedDraft, SessionError> {
        if self.state != ConversationState::AwaitingLink {
            return Err(SessionError::InvalidTransition {
                state: self.state,
                event: SessionEvent::LinkEntered,
            });
        }

        let draft = std::mem::take(&mut self.draft);
        let completed = CompletedDraft {
            kind: draft.kind.ok_or(SessionError::IncompleteDraft("kind"))?,
            description: draft
                .description
                .ok_or(SessionError::IncompleteDraft("description"))?,
            reward: draft.reward.ok_or(SessionError::IncompleteDraft("reward"))?,
            link,
        };

        self.apply(SessionEvent::LinkEntered)?;
        Ok(completed)
    }

    /// Waits for a screenshot for `task_id`.
    pub fn await_screenshot(&mut self, task_id: TaskId, reward: f64) -> Result<(), SessionError> {
        self.apply(SessionEvent::RequestScreenshot)?;
        self.screenshot_target = Some(ScreenshotTarget { task_id, reward });
        Ok(())
    }

    /// Consumes the screenshot target once the image has arrived.
    pub fn take_screenshot_target(&mut self) -> Result<ScreenshotTarget, SessionError> {
        let target = self.screenshot_target.ok_or(SessionError::NoTarget)?;
        self.apply(SessionEvent::ScreenshotReceived)?;
        self.screenshot_target = None;
        Ok(target)
    }

    /// Starts editing `field` of `task_id`.
    pub fn begin_edit(&mut self, field: EditField, task_id: TaskId) -> Result<(), SessionError> {
        self.apply(SessionEvent::BeginEdit(field))?;
        self.editing_task = Some(task_id);
        Ok(())
    }

    /// Field and task currently being edited, without moving the state.
    #[must_use]
    pub fn edit_target(&self) -> Option<(EditField, TaskId)> {
        match self.state {
            ConversationState::EditingField(field) => self.editing_task.map(|id| (field, id)),
            _ => None,
        }
    }

    /// Leaves the edit prompt after a value was applied.
    ///
    /// The task stays selected so its edit menu can be shown again.
    pub fn finish_edit(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::EditApplied)
    }

    pub fn begin_broadcast(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::BeginBroadcast)
    }

    pub fn finish_broadcast(&mut self) -> Result<(), SessionError> {
        self.apply(SessionEvent::BroadcastSent)
    }

    /// Abandons whatever flow is in progress.
    pub fn cancel(&mut self) {
        self.state = ConversationState::Idle;
        self.draft = TaskDraft::default();
        self.screenshot_target = None;
        self.touch();
    }

    /// Replaces the feed snapshot with freshly fetched tasks.
    pub fn show_feed(&mut self, tasks: Vec<Task>) -> Option<&Task> {
        self.feed = TaskFeed::new(tasks);
        self.touch();
        self.feed.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let session = SessionState::new();
        assert_eq!(session.state(), ConversationState::Idle);
        assert!(session.screenshot_target.is_none());
        assert!(session.feed.is_empty());
    }

    #[test]
    fn test_create_flow() {
        let mut session = SessionState::new();
        session.start_draft(TaskKind::Subscribe).unwrap();
        assert_eq!(session.state(), ConversationState::AwaitingDescription);

        session.enter_description("Join us".to_owned()).unwrap();
        assert_eq!(session.state(), ConversationState::AwaitingReward);

        assert_eq!(session.enter_reward(10.0).unwrap(), TaskKind::Subscribe);
        assert_eq!(session.state(), ConversationState::AwaitingLink);

        let draft = session.finish_draft("https://t.me/chan".to_owned()).unwrap();
        assert_eq!(
            draft,
            CompletedDraft {
                kind: TaskKind::Subscribe,
                description: "Join us".to_owned(),
                reward: 10.0,
                link: "https://t.me/chan".to_owned(),
            }
        );
        assert_eq!(session.state(), ConversationState::Idle);
        assert_eq!(session.draft, TaskDraft::default());
    }

    #[test]
    fn test_inputs_out_of_order_are_rejected() {
        let mut session = SessionState::new();
        assert!(matches!(
            session.enter_description("x".to_owned()),
            Err(SessionError::InvalidTransition { .. })
        ));

        session.start_draft(TaskKind::Register).unwrap();
        assert!(session.finish_draft("link".to_owned()).is_err());
        assert_eq!(session.state(), ConversationState::AwaitingDescription);
    }

    #[test]
    fn test_entry_events_restart_flows() {
        let mut session = SessionState::new();
        session.start_draft(TaskKind::Register).unwrap();
        session.begin_edit(EditField::Reward, 4).unwrap();
        assert_eq!(session.edit_target(), Some((EditField::Reward, 4)));

        session.begin_broadcast().unwrap();
        assert_eq!(session.state(), ConversationState::AwaitingBroadcast);
        assert_eq!(session.edit_target(), None);
    }

    #[test]
    fn test_screenshot_flow() {
        let mut session = SessionState::new();
        assert_eq!(session.take_screenshot_target(), Err(SessionError::NoTarget));

        session.await_screenshot(9, 5.0).unwrap();
        assert_eq!(session.state(), ConversationState::AwaitingScreenshot);

        let target = session.take_screenshot_target().unwrap();
        assert_eq!(target.task_id, 9);
        assert_eq!(session.state(), ConversationState::Idle);
        assert!(session.screenshot_target.is_none());
    }

    #[test]
    fn test_cancel_from_anywhere() {
        for event in [
            SessionEvent::StartDraft,
            SessionEvent::RequestScreenshot,
            SessionEvent::BeginEdit(EditField::Link),
            SessionEvent::BeginBroadcast,
        ] {
            let state = ConversationState::Idle.transition(event).unwrap();
            assert_eq!(
                state.transition(SessionEvent::Cancel),
                Ok(ConversationState::Idle)
            );
        }
    }

    #[test]
    fn test_completion_events_need_matching_state() {
        assert!(ConversationState::Idle.transition(SessionEvent::EditApplied).is_err());
        assert!(ConversationState::AwaitingReward
            .transition(SessionEvent::BroadcastSent)
            .is_err());
        assert_eq!(
            ConversationState::EditingField(EditField::Position).transition(SessionEvent::EditApplied),
            Ok(ConversationState::Idle)
        );
    }

    #[test]
    fn test_expiry() {
        let session = SessionState::new();
        assert!(!session.is_expired(Duration::from_secs(60)));
        assert!(session.is_expired(Duration::ZERO));
    }
}
