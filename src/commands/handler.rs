//! Command handler implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::cooldown::CooldownTracker;
use super::resolver::NameResolver;
use super::types::{BotCommand, CommandResult, Invoker};
use crate::config::BotSettings;
use crate::ledger::{Balance, LedgerStore};

/// Reply sent when a command fails for an internal reason.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

/// Reply sent by the leaderboard when nobody has a balance.
pub const EMPTY_LEADERBOARD: &str = "No one has earned any money yet!";

/// Placeholder for users whose display name cannot be resolved.
pub const UNKNOWN_USER: &str = "Unknown";

const CHANGELOG: &str = "Changelog:\n\
    - Added balance, earn and leaderboard commands\n\
    - Balances are saved safely when several users earn at once\n\
    - Leaderboard no longer fails when a user cannot be found\n\
    - Added changelog, help and info commands\n\
    - Added per-user command cooldowns";

/// Handles bot commands against the balance ledger.
pub struct CommandHandler<R> {
    /// Command prefix (e.g., "!").
    prefix: String,

    /// Amount credited by `earn`.
    earn_amount: Balance,

    /// Number of entries shown by `leaderboard`.
    leaderboard_size: usize,

    /// Balance storage.
    store: Arc<LedgerStore>,

    /// Display name lookup for leaderboard entries.
    resolver: Arc<R>,

    /// Per-user command cooldowns.
    cooldowns: CooldownTracker,

    /// When the handler was created.
    started_at: DateTime<Utc>,
}

impl<R: NameResolver> CommandHandler<R> {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(settings: &BotSettings, store: Arc<LedgerStore>, resolver: Arc<R>) -> Self {
        Self {
            prefix: settings.command_prefix.clone(),
            earn_amount: settings.earn_amount,
            leaderboard_size: settings.leaderboard_size,
            store,
            resolver,
            cooldowns: CooldownTracker::from_secs(settings.cooldown_secs),
            started_at: Utc::now(),
        }
    }

    /// Returns the command prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn try_handle(&self, invoker: &Invoker, message_text: &str) -> Option<CommandResult> {
        let command = BotCommand::parse(message_text, &self.prefix)?;

        debug!("Handling command {} from user {}", command, invoker.id);

        if let Err(remaining) = self.cooldowns.try_acquire(&invoker.id, command).await {
            let secs = remaining.as_millis().div_ceil(1000);
            return Some(CommandResult::error(format!(
                "Please wait {secs}s before using {command} again."
            )));
        }

        let result = self.execute(command, invoker).await;
        info!(
            "Command {} by user {}: success={}",
            command, invoker.id, result.success
        );

        Some(result)
    }

    /// Executes a parsed command.
    async fn execute(&self, command: BotCommand, invoker: &Invoker) -> CommandResult {
        match command {
            BotCommand::Balance => self.handle_balance(invoker).await,
            BotCommand::Earn => self.handle_earn(invoker).await,
            BotCommand::Leaderboard => self.handle_leaderboard().await,
            BotCommand::Changelog => CommandResult::success(CHANGELOG),
            BotCommand::Help => self.handle_help(),
            BotCommand::Info => self.handle_info(),
        }
    }

    async fn handle_balance(&self, invoker: &Invoker) -> CommandResult {
        match self.store.balance_of(&invoker.id).await {
            Ok(balance) => CommandResult::success(format!(
                "{}, your balance is ${balance}.",
                invoker.display_name
            )),
            Err(e) => {
                error!("Failed to read balance of user {}: {}", invoker.id, e);
                CommandResult::error(GENERIC_FAILURE)
            }
        }
    }

    async fn handle_earn(&self, invoker: &Invoker) -> CommandResult {
        let earned = self.earn_amount;

        match self.store.credit(&invoker.id, earned).await {
            Ok(balance) => CommandResult::success(format!(
                "{}, you earned ${earned}! Your new balance is ${balance}.",
                invoker.display_name
            )),
            Err(e) => {
                error!("Failed to credit user {}: {}", invoker.id, e);
                CommandResult::error(GENERIC_FAILURE)
            }
        }
    }

    async fn handle_leaderboard(&self) -> CommandResult {
        let ranked = match self.store.top(self.leaderboard_size).await {
            Ok(ranked) => ranked,
            Err(e) => {
                error!("Failed to load leaderboard: {}", e);
                return CommandResult::error(GENERIC_FAILURE);
            }
        };

        if ranked.is_empty() {
            return CommandResult::success(EMPTY_LEADERBOARD);
        }

        let mut lines = vec!["Leaderboard:".to_owned()];

        for (position, (user, balance)) in ranked.iter().enumerate() {
            let name = match self.resolver.resolve(user).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("{}", e);
                    UNKNOWN_USER.to_owned()
                }
            };
            lines.push(format!("{}. {name}: ${balance}", position + 1));
        }

        CommandResult::success(lines.join("\n"))
    }

    fn handle_help(&self) -> CommandResult {
        let mut lines = vec![
            format!("Balance Bot Commands (prefix: {})", self.prefix),
            String::new(),
        ];

        for (cmd, aliases, desc) in BotCommand::all_commands() {
            let alias_str = if aliases.is_empty() {
                String::new()
            } else {
                format!(" {aliases}")
            };
            lines.push(format!("  {}{cmd}{alias_str} - {desc}", self.prefix));
        }

        CommandResult::success(lines.join("\n"))
    }

    fn handle_info(&self) -> CommandResult {
        let version = env!("CARGO_PKG_VERSION");
        let uptime_secs = u64::try_from((Utc::now() - self.started_at).num_seconds()).unwrap_or(0);

        let message = format!(
            "Balance Bot v{version}\n\
             Running since {} (up {})\n\
             Earn amount: ${}",
            self.started_at.format("%Y-%m-%d %H:%M UTC"),
            format_duration(uptime_secs),
            self.earn_amount,
        );
        CommandResult::success(message)
    }
}

impl<R> std::fmt::Debug for CommandHandler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("prefix", &self.prefix)
            .field("earn_amount", &self.earn_amount)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Formats a duration in seconds to a human-readable string.
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {mins}m")
        }
    }
}
