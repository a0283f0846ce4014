//! Update dispatcher.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::keyboards::{self, ADMIN_MENU_TEXT, BROADCAST_PROMPT, DELETE_PROMPT, SCREENSHOT_PROMPT};
use super::types::{Callback, MenuCommand};
use crate::config::{BotConfig, BotSettings};
use crate::feed::{TaskCard, format_channel_link};
use crate::session::{ConversationState, EditField, SessionError, SessionStore};
use crate::store::{SqliteStore, StoreError, Task, TaskExtra, TaskId, TaskKind, TaskUpdate, UserId};
use crate::telegram::{
    CallbackQuery, InlineKeyboardMarkup, MembershipCheck, Message, MessageId, Messenger,
    RateLimiter, ScreenshotStore, TelegramError, Update,
};
use crate::workflow::{
    BroadcastError, BroadcastPayload, Broadcaster, Decision, ReviewOutcome, RewardError,
    RewardService, SubscriptionOutcome,
};

/// Shown to the user whenever handling fails.
const GENERIC_ERROR: &str = "❌ Something went wrong. Please try again later.";

const TASK_NOT_FOUND: &str = "Task not found!";
const NOT_A_NUMBER: &str = "Please enter a number";
const SAVE_FAILED: &str = "❌ Failed to save changes";
const EMPTY_DESCRIPTION: &str = "The description cannot be empty";
const EMPTY_LINK: &str = "Please enter a link";

/// Errors that abort handling of one update.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Reward workflow error: {0}")]
    Reward(#[from] RewardError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// How a button press is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackAnswer {
    Silent,
    Toast(&'static str),
    Alert(&'static str),
}

/// Where a button press came from.
#[derive(Debug, Clone, Copy)]
struct Origin {
    user_id: UserId,
    chat_id: i64,
    message_id: Option<MessageId>,
}

/// Routes updates to the task feed, the admin tools and the workflows.
pub struct BotHandler<M, C> {
    store: SqliteStore,
    sessions: Arc<SessionStore>,
    config: Arc<BotConfig>,
    messenger: Arc<M>,
    rewards: RewardService<C>,
    broadcaster: Broadcaster<M>,
}

impl<M: Messenger, C: MembershipCheck> BotHandler<M, C> {
    /// Creates a handler.
    #[must_use]
    pub fn new(
        store: SqliteStore,
        config: Arc<BotConfig>,
        messenger: Arc<M>,
        checker: Arc<C>,
        settings: &BotSettings,
    ) -> Self {
        let rewards = RewardService::new(
            store.clone(),
            checker,
            ScreenshotStore::new(settings.screenshots_dir.clone()),
        );
        let broadcaster = Broadcaster::new(
            store.clone(),
            Arc::clone(&messenger),
            RateLimiter::new(settings.broadcast_delay()),
        );

        Self {
            store,
            sessions: Arc::new(SessionStore::new(settings.session_ttl())),
            config,
            messenger,
            rewards,
            broadcaster,
        }
    }

    /// Session store, shared with the runner for expiry sweeps.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one update.
    ///
    /// Failures are logged here and the user gets a short generic message.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;

        if let Some(query) = update.callback_query {
            let query_id = query.id.clone();
            if let Err(e) = self.handle_callback(query).await {
                error!("Failed to handle callback in update {}: {}", update_id, e);
                let _ = self
                    .messenger
                    .answer_callback(&query_id, Some(GENERIC_ERROR), true)
                    .await;
            }
        } else if let Some(message) = update.message {
            let chat_id = message.chat.id;
            if let Err(e) = self.handle_message(message).await {
                error!("Failed to handle message in update {}: {}", update_id, e);
                let _ = self.messenger.send_text(chat_id, GENERIC_ERROR, None).await;
            }
        } else {
            debug!("Ignoring update {} without message or callback", update_id);
        }
    }

    // --- messages ---

    async fn handle_message(&self, message: Message) -> Result<(), HandlerError> {
        let Some(user_id) = message.from.as_ref().map(|u| u.id) else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let state = self.sessions.get(user_id).await.state();
        let is_admin = self.config.is_admin(user_id);

        // While an admin answers a prompt only /start escapes it; any other
        // text, even one that looks like a menu button, is the answer.
        let composing = is_admin
            && (state.expects_admin_text() || state == ConversationState::AwaitingBroadcast);
        let command = message
            .text
            .as_deref()
            .and_then(MenuCommand::parse)
            .filter(|c| !composing || *c == MenuCommand::Start);
        if let Some(command) = command {
            debug!("User {} sent menu command: {}", user_id, command);
            return self.handle_menu(command, user_id, chat_id).await;
        }

        match state {
            ConversationState::AwaitingBroadcast if is_admin => {
                self.handle_broadcast(&message, chat_id, user_id).await
            }
            ConversationState::AwaitingScreenshot => {
                self.handle_screenshot(&message, user_id, chat_id).await
            }
            state if state.expects_admin_text() && is_admin => {
                let Some(text) = message.text.as_deref() else {
                    self.reply(chat_id, "Please answer with text").await?;
                    return Ok(());
                };
                self.handle_admin_text(state, text, user_id, chat_id).await
            }
            ConversationState::Idle => {
                debug!("Ignoring message from {} outside of a conversation", user_id);
                Ok(())
            }
            state => {
                warn!("User {} is in {:?} without permission; resetting", user_id, state);
                self.sessions.clear(user_id).await;
                Ok(())
            }
        }
    }

    async fn handle_menu(
        &self,
        command: MenuCommand,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        match command {
            MenuCommand::Start => {
                info!("/start from user {}", user_id);
                self.sessions.clear(user_id).await;
                // Known users are the broadcast audience.
                self.store.update_balance(user_id, 0.0).await?;

                if self.config.is_admin(user_id) {
                    self.messenger
                        .send_text(chat_id, ADMIN_MENU_TEXT, Some(keyboards::admin_menu().into()))
                        .await?;
                } else {
                    self.messenger
                        .send_text(
                            chat_id,
                            &self.config.welcome_message,
                            Some(keyboards::welcome_keyboard(&self.config).into()),
                        )
                        .await?;
                }
            }
            MenuCommand::MyTasks => {
                let tasks = self.store.available_tasks(user_id).await?;
                let card = self
                    .sessions
                    .update(user_id, |s| {
                        s.show_feed(tasks)
                            .map(|task| TaskCard::render(task, &self.config))
                    })
                    .await;

                match card {
                    Some(card) => {
                        self.messenger
                            .send_text(chat_id, &card.text, Some(card.keyboard.into()))
                            .await?;
                    }
                    None => {
                        self.reply(
                            chat_id,
                            "There are no tasks available right now 😔\nPlease check back later!",
                        )
                        .await?;
                    }
                }
            }
            MenuCommand::Balance => {
                let balance = self.store.balance(user_id).await?;
                let keyboard = keyboards::main_keyboard(&self.config, user_id, balance);
                self.messenger
                    .send_text(
                        chat_id,
                        &format!("💰 Your balance: {}", self.config.money(balance)),
                        Some(keyboard.into()),
                    )
                    .await?;
            }
            MenuCommand::Support => {
                self.reply(chat_id, &format!("Support: {}", self.config.support_link))
                    .await?;
            }
            MenuCommand::AdminPanel => {
                if self.config.is_admin(user_id) {
                    self.sessions.clear(user_id).await;
                    self.messenger
                        .send_text(chat_id, ADMIN_MENU_TEXT, Some(keyboards::admin_menu().into()))
                        .await?;
                } else {
                    debug!("Ignoring admin panel request from {}", user_id);
                }
            }
        }
        Ok(())
    }

    async fn handle_admin_text(
        &self,
        state: ConversationState,
        text: &str,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        match state {
            ConversationState::AwaitingDescription => {
                let description = text.trim();
                if description.is_empty() {
                    self.reply(chat_id, EMPTY_DESCRIPTION).await?;
                    return Ok(());
                }
                self.sessions
                    .update(user_id, |s| s.enter_description(description.to_owned()))
                    .await?;
                self.reply(chat_id, "Enter the task reward:").await?;
            }
            ConversationState::AwaitingReward => {
                let Some(reward) = parse_reward(text) else {
                    self.reply(chat_id, NOT_A_NUMBER).await?;
                    return Ok(());
                };
                let kind = self
                    .sessions
                    .update(user_id, |s| s.enter_reward(reward))
                    .await?;
                let prompt = match kind {
                    TaskKind::Subscribe => "Enter the channel link:",
                    TaskKind::Register => "Enter the registration link:",
                };
                self.reply(chat_id, prompt).await?;
            }
            ConversationState::AwaitingLink => {
                if text.trim().is_empty() {
                    self.reply(chat_id, EMPTY_LINK).await?;
                    return Ok(());
                }
                let draft = self
                    .sessions
                    .update(user_id, |s| {
                        let link = normalize_link(s.draft.kind, text);
                        s.finish_draft(link)
                    })
                    .await?;

                let extra = TaskExtra::with_link(draft.kind, draft.link);
                match self
                    .store
                    .add_task(draft.kind, &draft.description, draft.reward, &extra)
                    .await
                {
                    Ok(id) => {
                        info!("Admin {} created task #{}", user_id, id);
                        self.reply(
                            chat_id,
                            &format!(
                                "✅ Task created!\nID: {id}\nType: {}\nReward: {}",
                                draft.kind,
                                self.config.money(draft.reward)
                            ),
                        )
                        .await?;
                    }
                    Err(e) => {
                        error!("Failed to create task: {}", e);
                        self.reply(chat_id, "❌ Failed to create the task").await?;
                    }
                }
                self.messenger
                    .send_text(chat_id, ADMIN_MENU_TEXT, Some(keyboards::admin_menu().into()))
                    .await?;
            }
            ConversationState::EditingField(_) => {
                let session = self.sessions.get(user_id).await;
                let Some((field, task_id)) = session.edit_target() else {
                    return Ok(());
                };
                self.apply_edit(field, task_id, text, user_id, chat_id).await?;
            }
            other => debug!("No text expected in {:?}", other),
        }
        Ok(())
    }

    async fn apply_edit(
        &self,
        field: EditField,
        task_id: TaskId,
        text: &str,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        let Some(task) = self.store.task_by_id(task_id).await? else {
            self.sessions.update(user_id, |s| s.cancel()).await;
            self.reply(chat_id, TASK_NOT_FOUND).await?;
            return Ok(());
        };

        let update = match field {
            EditField::Position => return self.move_task(task_id, text, user_id, chat_id).await,
            EditField::Description => {
                let description = text.trim();
                if description.is_empty() {
                    self.reply(chat_id, EMPTY_DESCRIPTION).await?;
                    return Ok(());
                }
                TaskUpdate {
                    description: Some(description.to_owned()),
                    ..TaskUpdate::default()
                }
            }
            EditField::Reward => {
                let Some(reward) = parse_reward(text) else {
                    self.reply(chat_id, NOT_A_NUMBER).await?;
                    return Ok(());
                };
                TaskUpdate {
                    reward: Some(reward),
                    ..TaskUpdate::default()
                }
            }
            EditField::Link => {
                if text.trim().is_empty() {
                    self.reply(chat_id, EMPTY_LINK).await?;
                    return Ok(());
                }
                TaskUpdate {
                    extra: Some(relinked(&task, text)),
                    ..TaskUpdate::default()
                }
            }
        };

        let saved = match self.store.update_task(task_id, &update).await {
            Ok(true) => Some("✅ Changes saved!"),
            Ok(false) => None,
            Err(e) => {
                error!("Failed to update task #{}: {}", task_id, e);
                None
            }
        };
        self.close_edit(saved, task_id, user_id, chat_id).await
    }

    async fn move_task(
        &self,
        task_id: TaskId,
        text: &str,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        let Ok(position) = text.trim().parse::<i64>() else {
            self.reply(chat_id, "Please enter a whole number").await?;
            return Ok(());
        };
        if position < 1 {
            self.reply(chat_id, "The position must be greater than 0").await?;
            return Ok(());
        }

        let saved = match self.store.reorder_task(task_id, position).await {
            Ok(()) => {
                info!("Task #{} moved to position {}", task_id, position);
                Some("✅ Task position changed!")
            }
            Err(e) => {
                error!("Failed to reorder task #{}: {}", task_id, e);
                None
            }
        };
        self.close_edit(saved, task_id, user_id, chat_id).await
    }

    /// Reports the outcome of an edit and shows the task's edit menu again.
    async fn close_edit(
        &self,
        saved: Option<&str>,
        task_id: TaskId,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        self.reply(chat_id, saved.unwrap_or(SAVE_FAILED)).await?;
        self.sessions.update(user_id, |s| s.finish_edit()).await?;

        if let Some(task) = self.store.task_by_id(task_id).await? {
            let (text, keyboard) = keyboards::edit_options(&task, &self.config);
            self.messenger
                .send_text(chat_id, &text, Some(keyboard.into()))
                .await?;
        }
        Ok(())
    }

    async fn handle_screenshot(
        &self,
        message: &Message,
        user_id: UserId,
        chat_id: i64,
    ) -> Result<(), HandlerError> {
        let Some(photo) = message.largest_photo() else {
            self.reply(chat_id, "📸 Please send the screenshot as a photo").await?;
            return Ok(());
        };
        let Some(target) = self.sessions.get(user_id).await.screenshot_target else {
            return Ok(());
        };

        let bytes = self.messenger.download_file(&photo.file_id).await?;
        self.rewards
            .submit_screenshot(user_id, target.task_id, &bytes)
            .await?;
        self.sessions
            .update(user_id, |s| s.take_screenshot_target())
            .await?;

        let caption = format!(
            "📝 New screenshot\nUser: {user_id}\nTask #{}\nReward: {}",
            target.task_id,
            self.config.money(target.reward)
        );
        for &admin in &self.config.admin_ids {
            let keyboard = keyboards::review(user_id, target.task_id);
            if let Err(e) = self
                .messenger
                .send_photo(admin, &photo.file_id, Some(&caption), None, Some(keyboard.into()))
                .await
            {
                warn!("Failed to forward screenshot to admin {}: {}", admin, e);
            }
        }

        self.reply(
            chat_id,
            "✅ Screenshot sent for review! Please wait for confirmation.",
        )
        .await
    }

    async fn handle_broadcast(
        &self,
        message: &Message,
        chat_id: i64,
        user_id: UserId,
    ) -> Result<(), HandlerError> {
        let Some(payload) = BroadcastPayload::from_message(message) else {
            self.reply(chat_id, "Please send text, a photo or a video").await?;
            return Ok(());
        };

        self.sessions.update(user_id, |s| s.finish_broadcast()).await?;
        info!("Admin {} started a broadcast", user_id);
        self.broadcaster.run(chat_id, &payload).await?;

        self.messenger
            .send_text(chat_id, ADMIN_MENU_TEXT, Some(keyboards::admin_menu().into()))
            .await?;
        Ok(())
    }

    // --- callbacks ---

    async fn handle_callback(&self, query: CallbackQuery) -> Result<(), HandlerError> {
        let user_id = query.from.id;
        let origin = Origin {
            user_id,
            chat_id: query.message.as_ref().map_or(user_id, |m| m.chat.id),
            message_id: query.message.as_ref().map(|m| m.message_id),
        };

        let data = query.data.as_deref().unwrap_or_default();
        let answer = match data.parse::<Callback>() {
            Ok(callback) if callback.requires_admin() && !self.config.is_admin(user_id) => {
                warn!("User {} tried admin action {}", user_id, callback);
                CallbackAnswer::Alert("⛔ This action is for administrators only")
            }
            Ok(callback) => {
                debug!("User {} pressed {}", user_id, callback);
                self.dispatch(callback, origin).await?
            }
            Err(e) => {
                warn!("{}", e);
                CallbackAnswer::Silent
            }
        };

        let (text, alert) = match answer {
            CallbackAnswer::Silent => (None, false),
            CallbackAnswer::Toast(text) => (Some(text), false),
            CallbackAnswer::Alert(text) => (Some(text), true),
        };
        self.messenger.answer_callback(&query.id, text, alert).await?;
        Ok(())
    }

    async fn dispatch(&self, callback: Callback, origin: Origin) -> Result<CallbackAnswer, HandlerError> {
        let user_id = origin.user_id;

        match callback {
            Callback::Understand => {
                self.delete_origin(origin).await;
                let balance = self.store.balance(user_id).await?;
                let keyboard = keyboards::main_keyboard(&self.config, user_id, balance);
                self.messenger
                    .send_text(origin.chat_id, "Choose an action:", Some(keyboard.into()))
                    .await?;
            }
            Callback::AddTask => {
                self.show(origin, "Choose the task type:", Some(keyboards::task_kinds()))
                    .await?;
            }
            Callback::NewTask(kind) => {
                self.sessions.update(user_id, |s| s.start_draft(kind)).await?;
                self.show(origin, "Enter the task description:", None).await?;
            }
            Callback::ListTasks => {
                let tasks = self.store.all_tasks().await?;
                let text = keyboards::task_list(&tasks, &self.config);
                self.show(origin, &text, Some(keyboards::back_only())).await?;
            }
            Callback::BackToAdmin | Callback::CancelBroadcast => {
                self.sessions.update(user_id, |s| s.cancel()).await;
                self.show(origin, ADMIN_MENU_TEXT, Some(keyboards::admin_menu()))
                    .await?;
            }
            Callback::Broadcast => {
                self.sessions.update(user_id, |s| s.begin_broadcast()).await?;
                self.show(origin, BROADCAST_PROMPT, Some(keyboards::broadcast_menu()))
                    .await?;
            }
            Callback::UserMode => {
                self.sessions.update(user_id, |s| s.cancel()).await;
                self.delete_origin(origin).await;
                let balance = self.store.balance(user_id).await?;
                let keyboard = keyboards::main_keyboard(&self.config, user_id, balance);
                self.messenger
                    .send_text(origin.chat_id, "👤 User mode enabled", Some(keyboard.into()))
                    .await?;
            }
            Callback::Approve { user, task } => {
                return self.review(origin, user, task, Decision::Approve).await;
            }
            Callback::Reject { user, task } => {
                return self.review(origin, user, task, Decision::Reject).await;
            }
            Callback::CheckSubscription(task_id) => {
                return self.check_subscription(origin, task_id).await;
            }
            Callback::NextTask => {
                let card = self
                    .sessions
                    .update(user_id, |s| {
                        s.feed
                            .advance()
                            .map(|task| TaskCard::render(task, &self.config))
                    })
                    .await;
                let Some(card) = card else {
                    return Ok(CallbackAnswer::Toast("No tasks to show"));
                };
                self.show(origin, &card.text, Some(card.keyboard)).await?;
            }
            Callback::SendScreenshot(task_id) => {
                let Some(task) = self.store.task_by_id(task_id).await? else {
                    return Ok(CallbackAnswer::Alert(TASK_NOT_FOUND));
                };
                self.sessions
                    .update(user_id, |s| s.await_screenshot(task.id, task.reward))
                    .await?;
                self.show(origin, SCREENSHOT_PROMPT, None).await?;
            }
            Callback::EditTasks => self.show_edit_list(origin).await?,
            Callback::EditTask(task_id) => {
                let Some(task) = self.store.task_by_id(task_id).await? else {
                    return Ok(CallbackAnswer::Alert(TASK_NOT_FOUND));
                };
                self.sessions
                    .update(user_id, |s| {
                        s.cancel();
                        s.editing_task = Some(task_id);
                    })
                    .await;
                let (text, keyboard) = keyboards::edit_options(&task, &self.config);
                self.show(origin, &text, Some(keyboard)).await?;
            }
            Callback::EditField(field, task_id) => {
                self.sessions
                    .update(user_id, |s| s.begin_edit(field, task_id))
                    .await?;
                self.show(origin, field.prompt(), Some(keyboards::edit_cancel(task_id)))
                    .await?;
            }
            Callback::DeleteTask(task_id) => {
                self.show(origin, DELETE_PROMPT, Some(keyboards::delete_confirmation(task_id)))
                    .await?;
            }
            Callback::ConfirmDelete(task_id) => {
                return match self.store.delete_task(task_id).await {
                    Ok(true) => {
                        info!("Admin {} deleted task #{}", user_id, task_id);
                        self.show_edit_list(origin).await?;
                        Ok(CallbackAnswer::Toast("✅ Task deleted!"))
                    }
                    Ok(false) => Ok(CallbackAnswer::Alert(TASK_NOT_FOUND)),
                    Err(e) => {
                        error!("Failed to delete task #{}: {}", task_id, e);
                        Ok(CallbackAnswer::Alert("❌ Failed to delete the task"))
                    }
                };
            }
        }

        Ok(CallbackAnswer::Silent)
    }

    async fn check_subscription(
        &self,
        origin: Origin,
        task_id: TaskId,
    ) -> Result<CallbackAnswer, HandlerError> {
        let user_id = origin.user_id;
        match self.rewards.check_subscription(user_id, task_id).await {
            Ok(SubscriptionOutcome::Credited { reward, balance }) => {
                self.show(
                    origin,
                    &format!(
                        "✅ Subscription confirmed!\n💎 Received: {}\nPress \"My tasks\" for the next task",
                        self.config.money(reward)
                    ),
                    None,
                )
                .await?;
                let keyboard = keyboards::main_keyboard(&self.config, user_id, balance);
                self.messenger
                    .send_text(origin.chat_id, "💰 Balance updated!", Some(keyboard.into()))
                    .await?;
                Ok(CallbackAnswer::Silent)
            }
            Ok(SubscriptionOutcome::NotSubscribed) => Ok(CallbackAnswer::Alert(
                "❌ You are not subscribed to the channel!",
            )),
            Err(RewardError::TaskNotFound(_)) => Ok(CallbackAnswer::Alert(TASK_NOT_FOUND)),
            Err(e) => {
                error!("Subscription check for task #{} failed: {}", task_id, e);
                Ok(CallbackAnswer::Alert(
                    "An error occurred while checking the subscription",
                ))
            }
        }
    }

    async fn review(
        &self,
        origin: Origin,
        user: UserId,
        task: TaskId,
        decision: Decision,
    ) -> Result<CallbackAnswer, HandlerError> {
        let outcome = match self.rewards.review(user, task, decision).await {
            Ok(outcome) => outcome,
            Err(RewardError::TaskNotFound(_)) => return Ok(CallbackAnswer::Alert(TASK_NOT_FOUND)),
            Err(e) => return Err(e.into()),
        };

        let sent = match outcome {
            ReviewOutcome::Approved { balance, .. } => {
                let keyboard = keyboards::main_keyboard(&self.config, user, balance);
                self.messenger
                    .send_text(
                        user,
                        "✅ Your task was approved! Your balance has been updated",
                        Some(keyboard.into()),
                    )
                    .await
            }
            ReviewOutcome::Rejected => {
                self.messenger
                    .send_text(user, "❌ Your task was rejected", None)
                    .await
            }
        };
        if let Err(e) = sent {
            warn!("Failed to notify user {} about task #{}: {}", user, task, e);
        }

        self.delete_origin(origin).await;
        Ok(CallbackAnswer::Silent)
    }

    async fn show_edit_list(&self, origin: Origin) -> Result<(), HandlerError> {
        let tasks = self.store.all_tasks().await?;
        if tasks.is_empty() {
            self.show(origin, "There are no tasks to edit", Some(keyboards::back_only()))
                .await
        } else {
            self.show(
                origin,
                "📝 Choose a task to edit:",
                Some(keyboards::edit_list(&tasks)),
            )
            .await
        }
    }

    // --- output helpers ---

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), HandlerError> {
        self.messenger.send_text(chat_id, text, None).await?;
        Ok(())
    }

    /// Replaces the message a button belongs to, or sends a new one when
    /// there is none.
    async fn show(
        &self,
        origin: Origin,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), HandlerError> {
        match origin.message_id {
            Some(message_id) => {
                self.messenger
                    .edit_text(origin.chat_id, message_id, text, keyboard)
                    .await?;
            }
            None => {
                self.messenger
                    .send_text(origin.chat_id, text, keyboard.map(Into::into))
                    .await?;
            }
        }
        Ok(())
    }

    async fn delete_origin(&self, origin: Origin) {
        if let Some(message_id) = origin.message_id {
            if let Err(e) = self.messenger.delete_message(origin.chat_id, message_id).await {
                debug!("Could not delete message {}: {}", message_id, e);
            }
        }
    }
}

impl<M, C> std::fmt::Debug for BotHandler<M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotHandler")
            .field("admins", &self.config.admin_ids)
            .finish_non_exhaustive()
    }
}

/// Parses a reward typed by an admin. Accepts a decimal comma.
fn parse_reward(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r >= 0.0)
}

/// Channel links are normalized; registration links are kept as typed.
fn normalize_link(kind: Option<TaskKind>, text: &str) -> String {
    match kind {
        Some(TaskKind::Subscribe) => format_channel_link(text),
        _ => text.trim().to_owned(),
    }
}

/// The task's link bag with the link of its kind replaced.
fn relinked(task: &Task, text: &str) -> TaskExtra {
    let link = normalize_link(Some(task.kind), text);
    let mut extra = task.extra.clone();
    match task.kind {
        TaskKind::Subscribe => extra.channel_link = Some(link),
        TaskKind::Register => extra.reg_link = Some(link),
    }
    extra
}
