//! Reward and approval workflow.
//!
//! Subscription tasks are verified automatically through a
//! [`MembershipCheck`]; registration tasks are verified by an admin
//! looking at a submitted screenshot.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::feed::channel_handle;
use crate::store::{SqliteStore, StoreError, TaskId, TaskKind, UserId};
use crate::telegram::{MembershipCheck, ScreenshotStore};

/// Errors of the reward workflow.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Task #{0} not found")]
    TaskNotFound(TaskId),

    #[error("Task #{task} is a {actual} task")]
    WrongKind { task: TaskId, actual: TaskKind },

    #[error("Task #{0} has no channel link")]
    MissingLink(TaskId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to store screenshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a subscription check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubscriptionOutcome {
    /// The user is subscribed and was paid.
    Credited { reward: f64, balance: f64 },
    /// The user is not subscribed (or the check failed); nothing changed.
    NotSubscribed,
}

/// Admin verdict on a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Result of reviewing a screenshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewOutcome {
    Approved { reward: f64, balance: f64 },
    Rejected,
}

/// Credits rewards for completed tasks.
pub struct RewardService<C> {
    store: SqliteStore,
    checker: Arc<C>,
    screenshots: ScreenshotStore,
}

impl<C: MembershipCheck> RewardService<C> {
    #[must_use]
    pub const fn new(store: SqliteStore, checker: Arc<C>, screenshots: ScreenshotStore) -> Self {
        Self {
            store,
            checker,
            screenshots,
        }
    }

    /// Verifies that the user joined the task's channel and pays them.
    ///
    /// The balance credit and the completion record are written together;
    /// a negative or failed check changes nothing.
    pub async fn check_subscription(
        &self,
        user_id: UserId,
        task_id: TaskId,
    ) -> Result<SubscriptionOutcome, RewardError> {
        let task = self
            .store
            .task_by_id(task_id)
            .await?
            .ok_or(RewardError::TaskNotFound(task_id))?;

        if task.kind != TaskKind::Subscribe {
            return Err(RewardError::WrongKind {
                task: task_id,
                actual: task.kind,
            });
        }

        let handle = task
            .extra
            .channel_link
            .as_deref()
            .map(channel_handle)
            .filter(|h| !h.is_empty())
            .ok_or(RewardError::MissingLink(task_id))?;

        if !self.checker.is_member(&handle, user_id).await {
            info!("User {} is not subscribed to @{}", user_id, handle);
            return Ok(SubscriptionOutcome::NotSubscribed);
        }

        let balance = self
            .store
            .credit_completion(user_id, task_id, task.reward)
            .await?;
        info!(
            "User {} completed task #{} (+{}), balance {}",
            user_id, task_id, task.reward, balance
        );

        Ok(SubscriptionOutcome::Credited {
            reward: task.reward,
            balance,
        })
    }

    /// Stores a screenshot and records a pending completion.
    ///
    /// Returns where the image was written.
    pub async fn submit_screenshot(
        &self,
        user_id: UserId,
        task_id: TaskId,
        bytes: &[u8],
    ) -> Result<PathBuf, RewardError> {
        let path = self.screenshots.save(user_id, task_id, bytes).await?;
        self.store
            .save_screenshot(user_id, task_id, &path.to_string_lossy())
            .await?;
        info!("User {} submitted a screenshot for task #{}", user_id, task_id);
        Ok(path)
    }

    /// Applies an admin's verdict.
    ///
    /// Approval credits the task's current reward. The pending record is
    /// left untouched either way.
    pub async fn review(
        &self,
        user_id: UserId,
        task_id: TaskId,
        decision: Decision,
    ) -> Result<ReviewOutcome, RewardError> {
        match decision {
            Decision::Approve => {
                let reward = self
                    .store
                    .task_reward(task_id)
                    .await?
                    .ok_or(RewardError::TaskNotFound(task_id))?;
                self.store.update_balance(user_id, reward).await?;
                let balance = self.store.balance(user_id).await?;
                info!(
                    "Approved task #{} for user {} (+{}), balance {}",
                    task_id, user_id, reward, balance
                );
                Ok(ReviewOutcome::Approved { reward, balance })
            }
            Decision::Reject => {
                warn!("Rejected task #{} for user {}", task_id, user_id);
                Ok(ReviewOutcome::Rejected)
            }
        }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &SqliteStore {
        &self.store
    }
}

impl<C> std::fmt::Debug for RewardService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardService")
            .field("screenshots", &self.screenshots)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::next_available_task;
    use crate::store::{CompletionStatus, TaskExtra};
    use crate::testing::ScriptedChecker;

    struct Fixture {
        store: SqliteStore,
        checker: Arc<ScriptedChecker>,
        service: RewardService<ScriptedChecker>,
        dir: PathBuf,
    }

    async fn fixture(name: &str) -> Fixture {
        let store = SqliteStore::in_memory().await.unwrap();
        let checker = Arc::new(ScriptedChecker::new());
        let dir = std::env::temp_dir().join(format!("task_bot_reward_{name}_{}", std::process::id()));
        let service = RewardService::new(store.clone(), checker.clone(), ScreenshotStore::new(&dir));
        Fixture {
            store,
            checker,
            service,
            dir,
        }
    }

    #[tokio::test]
    async fn test_subscription_credits_once() {
        let f = fixture("credit").await;
        let extra = TaskExtra::with_link(TaskKind::Subscribe, "@chan");
        let t1 = f
            .store
            .add_task(TaskKind::Subscribe, "Join", 10.0, &extra)
            .await
            .unwrap();

        let next = next_available_task(&f.store, 42).await.unwrap();
        assert_eq!(next.map(|t| t.id), Some(t1));

        f.checker.add_member("chan", 42);
        let outcome = f.service.check_subscription(42, t1).await.unwrap();
        assert_eq!(
            outcome,
            SubscriptionOutcome::Credited {
                reward: 10.0,
                balance: 10.0
            }
        );

        assert!((f.store.balance(42).await.unwrap() - 10.0).abs() < f64::EPSILON);
        assert!(next_available_task(&f.store, 42).await.unwrap().is_none());
        assert_eq!(f.checker.calls(), vec![("chan".to_owned(), 42)]);
    }

    #[tokio::test]
    async fn test_not_subscribed_changes_nothing() {
        let f = fixture("not_subscribed").await;
        let extra = TaskExtra::with_link(TaskKind::Subscribe, "https://t.me/chan");
        let id = f
            .store
            .add_task(TaskKind::Subscribe, "Join", 10.0, &extra)
            .await
            .unwrap();

        let outcome = f.service.check_subscription(7, id).await.unwrap();
        assert_eq!(outcome, SubscriptionOutcome::NotSubscribed);
        assert!(f.store.balance(7).await.unwrap().abs() < f64::EPSILON);
        assert!(f.store.completion_records(7, id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_rejects_bad_tasks() {
        let f = fixture("bad_tasks").await;
        assert!(matches!(
            f.service.check_subscription(1, 99).await,
            Err(RewardError::TaskNotFound(99))
        ));

        let extra = TaskExtra::with_link(TaskKind::Register, "example.com");
        let register = f
            .store
            .add_task(TaskKind::Register, "Sign up", 5.0, &extra)
            .await
            .unwrap();
        assert!(matches!(
            f.service.check_subscription(1, register).await,
            Err(RewardError::WrongKind { .. })
        ));

        let no_link = f
            .store
            .add_task(TaskKind::Subscribe, "Join", 5.0, &TaskExtra::default())
            .await
            .unwrap();
        assert!(matches!(
            f.service.check_subscription(1, no_link).await,
            Err(RewardError::MissingLink(_))
        ));
        assert!(f.checker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_screenshot_then_approval() {
        let f = fixture("approval").await;
        let extra = TaskExtra::with_link(TaskKind::Register, "example.com/join");
        let t2 = f
            .store
            .add_task(TaskKind::Register, "Sign up", 5.0, &extra)
            .await
            .unwrap();

        let path = f.service.submit_screenshot(8, t2, b"jpeg").await.unwrap();
        assert_eq!(path, f.dir.join(format!("8_{t2}.jpg")));

        let records = f.store.completion_records(8, t2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CompletionStatus::Pending);
        assert!(f.store.balance(8).await.unwrap().abs() < f64::EPSILON);

        let outcome = f.service.review(8, t2, Decision::Approve).await.unwrap();
        assert_eq!(
            outcome,
            ReviewOutcome::Approved {
                reward: 5.0,
                balance: 5.0
            }
        );
        assert!((f.store.balance(8).await.unwrap() - 5.0).abs() < f64::EPSILON);

        // The record is not rewritten by the review.
        let records = f.store.completion_records(8, t2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CompletionStatus::Pending);

        tokio::fs::remove_dir_all(&f.dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_pays_nothing() {
        let f = fixture("rejection").await;
        let outcome = f.service.review(3, 1, Decision::Reject).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Rejected);
        assert!(f.store.balance(3).await.unwrap().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_approval_of_deleted_task() {
        let f = fixture("deleted").await;
        assert!(matches!(
            f.service.review(3, 404, Decision::Approve).await,
            Err(RewardError::TaskNotFound(404))
        ));
    }
}
