//! In-memory session store keyed by user.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use super::SessionState;
use crate::store::UserId;

/// Holds the [`SessionState`] of every user with a conversation in progress.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, SessionState>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store whose sessions expire after `ttl` of inactivity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Idle lifetime of a session.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a copy of the user's session, or a fresh one.
    ///
    /// An expired session is treated as absent.
    pub async fn get(&self, user_id: UserId) -> SessionState {
        let sessions = self.sessions.read().await;
        sessions
            .get(&user_id)
            .filter(|s| !s.is_expired(self.ttl))
            .cloned()
            .unwrap_or_default()
    }

    /// Stores `session` for the user, replacing any previous one.
    pub async fn put(&self, user_id: UserId, mut session: SessionState) {
        session.touch();
        self.sessions.write().await.insert(user_id, session);
    }

    /// Forgets the user's session.
    pub async fn clear(&self, user_id: UserId) {
        self.sessions.write().await.remove(&user_id);
    }

    /// Runs `f` against the user's session under the write lock and returns
    /// its result. The session is created if missing and reset if expired.
    pub async fn update<F, R>(&self, user_id: UserId, f: F) -> R
    where
        F: FnOnce(&mut SessionState) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_default();
        if session.is_expired(self.ttl) {
            *session = SessionState::default();
        }
        let result = f(session);
        session.touch();
        result
    }

    /// Drops every session idle for longer than the lifetime.
    ///
    /// Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Swept {} expired sessions", removed);
        }
        removed
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConversationState;
    use crate::store::TaskKind;

    #[tokio::test]
    async fn test_get_missing_returns_idle() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert_eq!(store.get(1).await.state(), ConversationState::Idle);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = SessionStore::new(Duration::from_secs(60));
        let mut session = SessionState::new();
        session.start_draft(TaskKind::Subscribe).unwrap();
        store.put(7, session).await;

        assert_eq!(store.get(7).await.state(), ConversationState::AwaitingDescription);
        assert_eq!(store.len().await, 1);

        store.clear(7).await;
        assert_eq!(store.get(7).await.state(), ConversationState::Idle);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_creates_and_returns() {
        let store = SessionStore::new(Duration::from_secs(60));
        let result = store
            .update(3, |s| s.await_screenshot(11, 2.5))
            .await;
        assert!(result.is_ok());
        assert_eq!(store.get(3).await.state(), ConversationState::AwaitingScreenshot);
    }

    #[tokio::test]
    async fn test_expired_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        store
            .update(5, |s| s.start_draft(TaskKind::Register))
            .await
            .unwrap();

        assert_eq!(store.get(5).await.state(), ConversationState::Idle);
        assert_eq!(store.sweep_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_sessions() {
        let store = SessionStore::new(Duration::from_secs(3600));
        store.put(1, SessionState::new()).await;
        store.put(2, SessionState::new()).await;
        assert_eq!(store.sweep_expired().await, 0);
        assert_eq!(store.len().await, 2);
    }
}
