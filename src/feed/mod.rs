//! Task feed: which task a user sees next and how links are shown.

mod card;

pub use card::TaskCard;

use crate::store::{SqliteStore, StoreError, Task, UserId};

/// Returns the active task with the lowest order index the user has no
/// completion record for.
pub async fn next_available_task(
    store: &SqliteStore,
    user_id: UserId,
) -> Result<Option<Task>, StoreError> {
    store.next_task(user_id).await
}

/// Snapshot of a user's available tasks with a cursor.
///
/// The snapshot is taken once when the feed is opened and is not refreshed
/// while the user cycles through it.
#[derive(Debug, Clone, Default)]
pub struct TaskFeed {
    tasks: Vec<Task>,
    cursor: usize,
}

impl TaskFeed {
    #[must_use]
    pub const fn new(tasks: Vec<Task>) -> Self {
        Self { tasks, cursor: 0 }
    }

    /// Task under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Task> {
        self.tasks.get(self.cursor)
    }

    /// Moves to the next task, wrapping around after the last one.
    pub fn advance(&mut self) -> Option<&Task> {
        if self.tasks.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.tasks.len();
        self.current()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Extracts the channel handle from a link: the last non-empty path
/// segment with any `@` removed.
///
/// `https://t.me/chan`, `t.me/chan/`, `@chan` and `chan` all give `chan`.
#[must_use]
pub fn channel_handle(link: &str) -> String {
    link.trim()
        .split('/')
        .rfind(|segment| !segment.is_empty())
        .unwrap_or_default()
        .replace('@', "")
}

/// Normalizes a channel given by an admin into a full link.
///
/// Full `http(s)://` links are kept; a bare name, with or without `@`,
/// becomes `https://t.me/<name>`.
#[must_use]
pub fn format_channel_link(raw: &str) -> String {
    let link = raw.trim();
    if link.is_empty() {
        return String::new();
    }
    if link.starts_with("https://") || link.starts_with("http://") {
        return link.to_owned();
    }
    format!("https://t.me/{}", link.trim_start_matches('@'))
}

/// Registration links are stored as typed; a missing scheme gets `https://`.
#[must_use]
pub fn registration_url(raw: &str) -> String {
    let link = raw.trim();
    if link.starts_with("https://") || link.starts_with("http://") {
        link.to_owned()
    } else {
        format!("https://{link}")
    }
}

/// Truncates a string for display, adding "..." if anything was cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
