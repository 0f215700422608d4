//! Command types and definitions.

use std::fmt;

use crate::ledger::UserId;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BotCommand {
    /// Show the invoking user's balance.
    Balance,

    /// Credit the fixed earn amount to the invoking user.
    Earn,

    /// Show the users with the highest balances.
    Leaderboard,

    /// Show recent changes to the bot.
    Changelog,

    /// Show help information.
    Help,

    /// Show information about the bot.
    Info,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not a valid command. Arguments after
    /// the command word are ignored.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let text = text.trim();

        let after_prefix = text.strip_prefix(prefix)?.trim_start();
        let cmd = after_prefix
            .split_whitespace()
            .next()?
            .to_lowercase();

        match cmd.as_str() {
            "balance" | "bal" | "money" => Some(Self::Balance),
            "earn" | "work" => Some(Self::Earn),
            "leaderboard" | "lb" | "top" => Some(Self::Leaderboard),
            "changelog" | "updates" | "changes" | "patch" => Some(Self::Changelog),
            "help" | "h" | "?" => Some(Self::Help),
            "info" | "about" | "version" => Some(Self::Info),
            _ => None,
        }
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Earn => "earn",
            Self::Leaderboard => "leaderboard",
            Self::Changelog => "changelog",
            Self::Help => "help",
            Self::Info => "info",
        }
    }

    /// Returns all available commands with their aliases and descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("balance", "(bal, money)", "Show your balance"),
            ("earn", "(work)", "Earn some money"),
            ("leaderboard", "(lb, top)", "Show the richest users"),
            ("changelog", "(updates, changes, patch)", "Show recent bot changes"),
            ("info", "(about, version)", "Show bot information"),
            ("help", "(h, ?)", "Show this help message"),
        ]
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The user who sent a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    /// Ledger key of the user.
    pub id: UserId,

    /// Name used to address the user in replies.
    pub display_name: String,
}

impl Invoker {
    /// Creates a new invoker.
    #[must_use]
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
