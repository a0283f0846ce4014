//! Task Bot Library
//!
//! A Telegram bot that hands out paid micro-tasks.
//!
//! This crate provides the core functionality for:
//! - Storing tasks, completions and balances in SQLite
//! - Showing each user the tasks they have not completed yet
//! - Paying for channel subscriptions and reviewed screenshots
//! - Letting administrators manage tasks and broadcast messages

pub mod commands;
pub mod config;
pub mod feed;
pub mod runner;
pub mod session;
pub mod store;
pub mod telegram;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
