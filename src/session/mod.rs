//! Per-user conversation sessions.
//!
//! Sessions live in memory only. A restart forgets every conversation in
//! progress, and sessions idle for longer than the configured lifetime are
//! swept away.

mod state;
mod store;

pub use state::{
    CompletedDraft, ConversationState, EditField, ScreenshotTarget, SessionError, SessionEvent,
    SessionState, TaskDraft,
};
pub use store::SessionStore;
