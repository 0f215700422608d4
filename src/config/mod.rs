//! Configuration module for the balance bot.
//!
//! Handles loading of bot settings and Telegram API credentials
//! from the environment.

mod settings;

pub use settings::{BotSettings, ConfigError, TelegramConfig};
