//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ledger::Balance;

/// Telegram API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token issued by `@BotFather`.
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.db")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `TG_BOT_TOKEN` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Creates configuration from variables supplied by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_id: i32 = required_var(&lookup, "TG_API_ID")?
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ConfigError::InvalidApiId)?;

        let api_hash = required_var(&lookup, "TG_API_HASH")?;
        let bot_token = required_var(&lookup, "TG_BOT_TOKEN")?;

        let session_path = lookup("TG_SESSION_PATH").map_or_else(default_session_path, PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path,
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("session_path", &self.session_path)
            .finish()
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path to the balances JSON file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Command prefix for bot commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Amount credited by each `earn`.
    #[serde(default = "default_earn_amount")]
    pub earn_amount: Balance,

    /// Number of users shown on the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// Seconds a user must wait before repeating a command.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Upper bound for a single ledger file operation, in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("balances.json")
}

fn default_command_prefix() -> String {
    "!".to_owned()
}

fn default_earn_amount() -> Balance {
    100
}

fn default_leaderboard_size() -> usize {
    10
}

fn default_cooldown() -> u64 {
    3
}

fn default_io_timeout_ms() -> u64 {
    2000
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            command_prefix: default_command_prefix(),
            earn_amount: default_earn_amount(),
            leaderboard_size: default_leaderboard_size(),
            cooldown_secs: default_cooldown(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    ///
    /// Unset variables fall back to defaults; set but unparsable numbers
    /// are errors.
    pub fn from_env_with_defaults() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Creates bot settings from variables supplied by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let command_prefix = lookup("COMMAND_PREFIX")
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_command_prefix);

        let leaderboard_size =
            parse_var(&lookup, "LEADERBOARD_SIZE")?.unwrap_or_else(default_leaderboard_size);
        if leaderboard_size == 0 {
            return Err(ConfigError::MustBePositive("LEADERBOARD_SIZE"));
        }

        Ok(Self {
            ledger_path: lookup("LEDGER_PATH").map_or_else(default_ledger_path, PathBuf::from),
            command_prefix,
            earn_amount: parse_var(&lookup, "EARN_AMOUNT")?.unwrap_or_else(default_earn_amount),
            leaderboard_size,
            cooldown_secs: parse_var(&lookup, "COMMAND_COOLDOWN")?.unwrap_or_else(default_cooldown),
            io_timeout_ms: parse_var(&lookup, "LEDGER_IO_TIMEOUT_MS")?
                .unwrap_or_else(default_io_timeout_ms),
        })
    }

    /// Returns the ledger I/O timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required_var(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingEnvVar(name))
}

fn parse_var<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid value for {name}: {value:?} (expected a non-negative integer)")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BotSettings::default();
        assert_eq!(settings.command_prefix, "!");
        assert_eq!(settings.earn_amount, 100);
        assert_eq!(settings.leaderboard_size, 10);
        assert_eq!(settings.cooldown_secs, 3);
        assert_eq!(settings.ledger_path, PathBuf::from("balances.json"));
        assert_eq!(settings.io_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: BotSettings =
            serde_json::from_str(r#"{"earn_amount": 250, "command_prefix": "/"}"#).unwrap();
        assert_eq!(settings.earn_amount, 250);
        assert_eq!(settings.command_prefix, "/");
        assert_eq!(settings.leaderboard_size, 10);
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned(), "1:token".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(config.session_path, PathBuf::from("session.db"));
    }

    #[test]
    fn test_telegram_config_debug_hides_secrets() {
        let config = TelegramConfig::new(1, "hash-secret".to_owned(), "token-secret".to_owned());
        let debug = format!("{config:?}");
        assert!(!debug.contains("hash-secret"));
        assert!(!debug.contains("token-secret"));
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_telegram_config_from_lookup() {
        let config = TelegramConfig::from_lookup(lookup_from(&[
            ("TG_API_ID", "12345"),
            ("TG_API_HASH", "abc123"),
            ("TG_BOT_TOKEN", "1:token"),
            ("TG_SESSION_PATH", "data/bot.db"),
        ]))
        .unwrap();
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.bot_token, "1:token");
        assert_eq!(config.session_path, PathBuf::from("data/bot.db"));
    }

    #[test]
    fn test_telegram_config_missing_vars() {
        let err = TelegramConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("TG_API_ID")));

        let err = TelegramConfig::from_lookup(lookup_from(&[
            ("TG_API_ID", "1"),
            ("TG_API_HASH", "abc"),
            ("TG_BOT_TOKEN", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("TG_BOT_TOKEN")));
    }

    #[test]
    fn test_telegram_config_invalid_api_id() {
        for raw in ["abc", "-5", "0"] {
            let err = TelegramConfig::from_lookup(lookup_from(&[
                ("TG_API_ID", raw),
                ("TG_API_HASH", "abc"),
                ("TG_BOT_TOKEN", "1:token"),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidApiId), "{raw}");
        }
    }

    #[test]
    fn test_settings_from_empty_lookup_uses_defaults() {
        let settings = BotSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.command_prefix, "!");
        assert_eq!(settings.earn_amount, 100);
        assert_eq!(settings.leaderboard_size, 10);
        assert_eq!(settings.io_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_settings_from_lookup_overrides() {
        let settings = BotSettings::from_lookup(lookup_from(&[
            ("LEDGER_PATH", "/tmp/ledger.json"),
            ("COMMAND_PREFIX", " / "),
            ("EARN_AMOUNT", "250"),
            ("LEADERBOARD_SIZE", "5"),
            ("COMMAND_COOLDOWN", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.ledger_path, PathBuf::from("/tmp/ledger.json"));
        assert_eq!(settings.command_prefix, "/");
        assert_eq!(settings.earn_amount, 250);
        assert_eq!(settings.leaderboard_size, 5);
        assert_eq!(settings.cooldown_secs, 0);
    }

    #[test]
    fn test_settings_invalid_number() {
        let err = BotSettings::from_lookup(lookup_from(&[("EARN_AMOUNT", "-10")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { name: "EARN_AMOUNT", ref value } if value == "-10"
        ));
    }

    #[test]
    fn test_settings_reject_empty_leaderboard() {
        let err = BotSettings::from_lookup(lookup_from(&[("LEADERBOARD_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::MustBePositive("LEADERBOARD_SIZE")));
    }
}
