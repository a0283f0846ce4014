//! Command handling module.
//!
//! Inline buttons and reply-keyboard texts are parsed once into typed
//! commands ([`Callback`], [`MenuCommand`]) and dispatched by
//! [`BotHandler`].

mod handler;
mod keyboards;
mod types;

pub use handler::{BotHandler, HandlerError};
pub use types::{
    ADMIN_PANEL_LABEL, BALANCE_PREFIX, Callback, MY_TASKS_LABEL, MenuCommand, SUPPORT_LABEL,
    UnknownCallback,
};
