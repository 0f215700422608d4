//! Command handling module.
//!
//! Processes user commands sent to the bot via chat messages.
//! Commands use the `!` prefix by default.

mod cooldown;
mod handler;
mod resolver;
mod types;

pub use cooldown::CooldownTracker;
pub use handler::{CommandHandler, EMPTY_LEADERBOARD, GENERIC_FAILURE, UNKNOWN_USER};
pub use resolver::{NameResolver, UserResolutionError};
pub use types::{BotCommand, CommandResult, Invoker};
