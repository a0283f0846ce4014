//! SQLite implementation of the task store.

use std::str::FromStr;

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::{
    CompletionRecord, CompletionStatus, StoreError, Task, TaskExtra, TaskId, TaskKind, TaskUpdate,
    UserId,
};

const TASK_COLUMNS: &str =
    "t.id, t.type AS kind, t.description, t.reward, t.order_num, t.extra_data, t.is_active";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    kind: String,
    description: String,
    reward: f64,
    order_num: Option<i64>,
    extra_data: Option<String>,
    is_active: bool,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let extra = match row.extra_data.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => TaskExtra::default(),
        };

        Ok(Self {
            id: row.id,
            kind: row.kind.parse()?,
            description: row.description,
            reward: row.reward,
            order_num: row.order_num.unwrap_or_default(),
            extra,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct CompletionRow {
    user_id: i64,
    task_id: i64,
    status: String,
    screenshot: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<CompletionRow> for CompletionRecord {
    type Error = StoreError;

    fn try_from(row: CompletionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            task_id: row.task_id,
            status: CompletionStatus::from_str(&row.status)?,
            screenshot: row.screenshot,
            created_at: row.created_at.and_utc(),
        })
    }
}

fn into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, StoreError> {
    rows.into_iter().map(Task::try_from).collect()
}

/// Task store backed by a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) the database at `url` and applies pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://bot.db`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected to database at {}", url);
        Ok(store)
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is pinned to one connection that never expires, otherwise
    /// every new connection would see an empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Creates a task at the end of the ordering and returns its id.
    pub async fn add_task(
        &self,
        kind: TaskKind,
        description: &str,
        reward: f64,
        extra: &TaskExtra,
    ) -> Result<TaskId, StoreError> {
        let extra_json = serde_json::to_string(extra)?;
        let mut tx = self.pool.begin().await?;

        let max_order: Option<i64> = sqlx::query_scalar("SELECT MAX(order_num) FROM tasks")
            .fetch_one(&mut *tx)
            .await?;
        let order_num = max_order.unwrap_or(0) + 1;

        let result = sqlx::query(
            "INSERT INTO tasks (type, description, reward, order_num, extra_data) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(kind.as_str())
        .bind(description)
        .bind(reward)
        .bind(order_num)
        .bind(&extra_json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        debug!(task_id = id, order_num, %kind, "Task created");
        Ok(id)
    }

    /// Lowest-ordered active task the user has no completion record for.
    pub async fn next_task(&self, user_id: UserId) -> Result<Option<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t \
             LEFT JOIN completed_tasks ct ON t.id = ct.task_id AND ct.user_id = ?1 \
             WHERE t.is_active = 1 AND ct.task_id IS NULL \
             ORDER BY t.order_num LIMIT 1"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    /// Fetches a task regardless of its active flag.
    pub async fn task_by_id(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    /// Reward of a task, if the task exists.
    pub async fn task_reward(&self, id: TaskId) -> Result<Option<f64>, StoreError> {
        let reward = sqlx::query_scalar("SELECT reward FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reward)
    }

    /// All active tasks in display order.
    pub async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.is_active = 1 ORDER BY t.order_num"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        into_tasks(rows)
    }

    /// Active tasks the user has not touched yet, in display order.
    pub async fn available_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t \
             LEFT JOIN completed_tasks ct ON t.id = ct.task_id AND ct.user_id = ?1 \
             WHERE t.is_active = 1 AND ct.task_id IS NULL \
             ORDER BY t.order_num"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        into_tasks(rows)
    }

    /// Records a submitted screenshot as a pending completion.
    pub async fn save_screenshot(
        &self,
        user_id: UserId,
        task_id: TaskId,
        path: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO completed_tasks (user_id, task_id, screenshot, status) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(path)
        .bind(CompletionStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records an automatically verified completion.
    pub async fn mark_completed(&self, user_id: UserId, task_id: TaskId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO completed_tasks (user_id, task_id, status) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(task_id)
            .bind(CompletionStatus::Completed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Adds `delta` to the user's balance, creating the user when needed.
    pub async fn update_balance(&self, user_id: UserId, delta: f64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (user_id, balance) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
        )
        .bind(user_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Credits `reward` and writes a completed record as one unit.
    ///
    /// Returns the balance after the credit.
    pub async fn credit_completion(
        &self,
        user_id: UserId,
        task_id: TaskId,
        reward: f64,
    ) -> Result<f64, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (user_id, balance) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
        )
        .bind(user_id)
        .bind(reward)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO completed_tasks (user_id, task_id, status) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(task_id)
            .bind(CompletionStatus::Completed.as_str())
            .execute(&mut *tx)
            .await?;

        let balance: f64 = sqlx::query_scalar("SELECT balance FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(balance)
    }

    /// Current balance, zero for unknown users.
    pub async fn balance(&self, user_id: UserId) -> Result<f64, StoreError> {
        let balance: Option<f64> = sqlx::query_scalar("SELECT balance FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance.unwrap_or(0.0))
    }

    /// Every user that has a balance row.
    pub async fn all_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        let ids = sqlx::query_scalar("SELECT user_id FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Completion records of one user for one task, oldest first.
    pub async fn completion_records(
        &self,
        user_id: UserId,
        task_id: TaskId,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        let rows: Vec<CompletionRow> = sqlx::query_as(
            "SELECT user_id, task_id, status, screenshot, timestamp AS created_at \
             FROM completed_tasks WHERE user_id = ?1 AND task_id = ?2 ORDER BY rowid",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CompletionRecord::try_from).collect()
    }

    /// Applies the fields present in `update`.
    ///
    /// Returns `false` without touching the database when the update is
    /// empty, and `false` when no task has that id.
    pub async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<bool, StoreError> {
        if update.is_empty() {
            return Ok(false);
        }

        let extra_json = update.extra.as_ref().map(serde_json::to_string).transpose()?;

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(description) = &update.description {
                fields.push("description = ");
                fields.push_bind_unseparated(description.clone());
            }
            if let Some(reward) = update.reward {
                fields.push("reward = ");
                fields.push_bind_unseparated(reward);
            }
            if let Some(order_num) = update.order_num {
                fields.push("order_num = ");
                fields.push_bind_unseparated(order_num);
            }
            if let Some(extra) = extra_json {
                fields.push("extra_data = ");
                fields.push_bind_unseparated(extra);
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let mut tx = self.pool.begin().await?;
        let result = builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a task together with every completion record that mentions it.
    ///
    /// Returns `false` when the task did not exist.
    pub async fn delete_task(&self, id: TaskId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let records = sqlx::query("DELETE FROM completed_tasks WHERE task_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let tasks = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            task_id = id,
            records = records.rows_affected(),
            "Task deleted"
        );
        Ok(tasks.rows_affected() > 0)
    }

    /// Moves a task to `new_position`, shifting the tasks in between.
    pub async fn reorder_task(&self, id: TaskId, new_position: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Option<i64>> =
            sqlx::query_scalar("SELECT order_num FROM tasks WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(StoreError::TaskNotFound(id))?.unwrap_or_default();

        if new_position > current {
            sqlx::query(
                "UPDATE tasks SET order_num = order_num - 1 \
                 WHERE order_num > ?1 AND order_num <= ?2",
            )
            .bind(current)
            .bind(new_position)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE tasks SET order_num = order_num + 1 \
                 WHERE order_num >= ?1 AND order_num < ?2",
            )
            .bind(new_position)
            .bind(current)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE tasks SET order_num = ?1 WHERE id = ?2")
            .bind(new_position)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(task_id = id, from = current, to = new_position, "Task reordered");
        Ok(())
    }

    /// Hides a task from every feed without deleting its history.
    pub async fn deactivate_task(&self, id: TaskId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tasks SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    async fn add(store: &SqliteStore, kind: TaskKind, description: &str, reward: f64) -> TaskId {
        let extra = TaskExtra::with_link(kind, "https://t.me/chan");
        store.add_task(kind, description, reward, &extra).await.unwrap()
    }

    async fn order_of(store: &SqliteStore) -> Vec<(TaskId, i64)> {
        store
            .all_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.id, t.order_num))
            .collect()
    }

    #[rstest]
    #[tokio::test]
    async fn test_add_task_assigns_increasing_order(#[future] store: SqliteStore) {
        let store = store.await;
        let a = add(&store, TaskKind::Subscribe, "a", 1.0).await;
        let b = add(&store, TaskKind::Register, "b", 2.0).await;
        let c = add(&store, TaskKind::Subscribe, "c", 3.0).await;

        assert_eq!(order_of(&store).await, vec![(a, 1), (b, 2), (c, 3)]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_add_task_after_gap(#[future] store: SqliteStore) {
        let store = store.await;
        let a = add(&store, TaskKind::Subscribe, "a", 1.0).await;
        let update = TaskUpdate {
            order_num: Some(7),
            ..TaskUpdate::default()
        };
        assert!(store.update_task(a, &update).await.unwrap());

        let b = add(&store, TaskKind::Subscribe, "b", 1.0).await;
        assert_eq!(order_of(&store).await, vec![(a, 7), (b, 8)]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_task_round_trips_extra(#[future] store: SqliteStore) {
        let store = store.await;
        let extra = TaskExtra::with_link(TaskKind::Register, "example.com/join");
        let id = store
            .add_task(TaskKind::Register, "Sign up", 5.0, &extra)
            .await
            .unwrap();

        let task = store.task_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.kind, TaskKind::Register);
        assert_eq!(task.link(), "example.com/join");
        assert!((task.reward - 5.0).abs() < f64::EPSILON);
        assert!(task.is_active);
        assert_eq!(store.task_reward(id).await.unwrap(), Some(5.0));
        assert!(store.task_by_id(id + 100).await.unwrap().is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn test_next_task_skips_any_completion_record(#[future] store: SqliteStore) {
        let store = store.await;
        let first = add(&store, TaskKind::Subscribe, "first", 1.0).await;
        let second = add(&store, TaskKind::Register, "second", 1.0).await;
        let third = add(&store, TaskKind::Subscribe, "third", 1.0).await;

        assert_eq!(store.next_task(42).await.unwrap().map(|t| t.id), Some(first));

        store.mark_completed(42, first).await.unwrap();
        assert_eq!(store.next_task(42).await.unwrap().map(|t| t.id), Some(second));

        store.save_screenshot(42, second, "screenshots/42_2.jpg").await.unwrap();
        assert_eq!(store.next_task(42).await.unwrap().map(|t| t.id), Some(third));

        store.mark_completed(42, third).await.unwrap();
        assert!(store.next_task(42).await.unwrap().is_none());

        // Other users are unaffected.
        assert_eq!(store.next_task(7).await.unwrap().map(|t| t.id), Some(first));
    }

    #[rstest]
    #[tokio::test]
    async fn test_available_tasks_excludes_inactive(#[future] store: SqliteStore) {
        let store = store.await;
        let a = add(&store, TaskKind::Subscribe, "a", 1.0).await;
        let b = add(&store, TaskKind::Subscribe, "b", 1.0).await;

        assert!(store.deactivate_task(a).await.unwrap());
        let ids: Vec<TaskId> = store
            .available_tasks(1)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![b]);
        assert!(store.task_by_id(a).await.unwrap().is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn test_balance_accumulates(#[future] store: SqliteStore) {
        let store = store.await;
        assert!(store.balance(42).await.unwrap().abs() < f64::EPSILON);

        for delta in [10.0, 2.5, 0.5, 7.0] {
            store.update_balance(42, delta).await.unwrap();
        }
        assert!((store.balance(42).await.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(store.all_user_ids().await.unwrap(), vec![42]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_credit_completion_is_one_unit(#[future] store: SqliteStore) {
        let store = store.await;
        let id = add(&store, TaskKind::Subscribe, "join", 10.0).await;

        let balance = store.credit_completion(42, id, 10.0).await.unwrap();
        assert!((balance - 10.0).abs() < f64::EPSILON);

        let records = store.completion_records(42, id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, CompletionStatus::Completed);
        assert!(records[0].screenshot.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn test_duplicate_screenshots_are_kept(#[future] store: SqliteStore) {
        let store = store.await;
        let id = add(&store, TaskKind::Register, "reg", 5.0).await;

        store.save_screenshot(3, id, "screenshots/3_1.jpg").await.unwrap();
        store.save_screenshot(3, id, "screenshots/3_1.jpg").await.unwrap();

        let records = store.completion_records(3, id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == CompletionStatus::Pending));
        assert_eq!(records[0].screenshot.as_deref(), Some("screenshots/3_1.jpg"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_task_partial(#[future] store: SqliteStore) {
        let store = store.await;
        let id = add(&store, TaskKind::Subscribe, "old", 1.0).await;

        assert!(!store.update_task(id, &TaskUpdate::default()).await.unwrap());

        let update = TaskUpdate {
            description: Some("new".to_owned()),
            extra: Some(TaskExtra::with_link(TaskKind::Subscribe, "https://t.me/other")),
            ..TaskUpdate::default()
        };
        assert!(store.update_task(id, &update).await.unwrap());

        let task = store.task_by_id(id).await.unwrap().unwrap();
        assert_eq!(task.description, "new");
        assert_eq!(task.link(), "https://t.me/other");
        assert!((task.reward - 1.0).abs() < f64::EPSILON);

        assert!(!store.update_task(999, &update).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_task_cascades(#[future] store: SqliteStore) {
        let store = store.await;
        let id = add(&store, TaskKind::Register, "reg", 5.0).await;
        let other = add(&store, TaskKind::Register, "keep", 5.0).await;
        store.save_screenshot(1, id, "a.jpg").await.unwrap();
        store.mark_completed(2, id).await.unwrap();
        store.mark_completed(2, other).await.unwrap();

        assert!(store.delete_task(id).await.unwrap());
        assert!(store.task_by_id(id).await.unwrap().is_none());
        assert!(store.completion_records(1, id).await.unwrap().is_empty());
        assert!(store.completion_records(2, id).await.unwrap().is_empty());
        assert_eq!(store.completion_records(2, other).await.unwrap().len(), 1);

        assert!(!store.delete_task(id).await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn test_reorder_moves_up(#[future] store: SqliteStore) {
        let store = store.await;
        let mut ids = Vec::new();
        for name in ["t1", "t2", "t3", "t4", "t5"] {
            ids.push(add(&store, TaskKind::Subscribe, name, 1.0).await);
        }

        store.reorder_task(ids[2], 1).await.unwrap();

        let order = order_of(&store).await;
        let positions: Vec<i64> = order.iter().map(|(_, o)| *o).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        let sequence: Vec<TaskId> = order.iter().map(|(id, _)| *id).collect();
        assert_eq!(sequence, vec![ids[2], ids[0], ids[1], ids[3], ids[4]]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_reorder_moves_down(#[future] store: SqliteStore) {
        let store = store.await;
        let mut ids = Vec::new();
        for name in ["t1", "t2", "t3", "t4"] {
            ids.push(add(&store, TaskKind::Subscribe, name, 1.0).await);
        }

        store.reorder_task(ids[0], 3).await.unwrap();

        let sequence: Vec<TaskId> = order_of(&store).await.iter().map(|(id, _)| *id).collect();
        assert_eq!(sequence, vec![ids[1], ids[2], ids[0], ids[3]]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_reorder_missing_task(#[future] store: SqliteStore) {
        let store = store.await;
        assert!(matches!(
            store.reorder_task(77, 1).await,
            Err(StoreError::TaskNotFound(77))
        ));
    }
}
