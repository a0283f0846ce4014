//! Reward crediting and message broadcasting.

mod broadcast;
mod reward;

pub use broadcast::{BroadcastError, BroadcastPayload, BroadcastReport, Broadcaster};
pub use reward::{Decision, ReviewOutcome, RewardError, RewardService, SubscriptionOutcome};
