//! Telegram client wrapper module.
//!
//! Connects the command handler to Telegram: signs in as a bot, streams
//! incoming messages and sends the replies.

mod client;
mod names;

pub use client::{RawUpdatesReceiver, TelegramBot, TelegramError};
pub use names::DisplayNameDirectory;
