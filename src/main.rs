//! Balance Bot - Main Entry Point
//!
//! A Telegram bot that lets users earn currency and compare balances.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use balance_bot::commands::CommandHandler;
use balance_bot::config::{BotSettings, TelegramConfig};
use balance_bot::ledger::LedgerStore;
use balance_bot::telegram::{DisplayNameDirectory, TelegramBot};

/// Telegram bot that keeps a per-user balance ledger.
#[derive(Parser, Debug)]
#[command(name = "balance_bot")]
#[command(about = "Chat bot with balance, earn and leaderboard commands")]
#[command(version)]
struct Args {
    /// Path to the balances JSON file (overrides `LEDGER_PATH`).
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let mut settings = BotSettings::from_env_with_defaults()
        .context("Failed to load bot settings from environment")?;
    if let Some(ledger) = args.ledger {
        settings.ledger_path = ledger;
    }

    let store = Arc::new(
        LedgerStore::new(&settings.ledger_path).with_io_timeout(settings.io_timeout()),
    );

    // A broken ledger is reported but does not stop the bot; commands reply
    // with a failure message until the file is fixed.
    match store.load().await {
        Ok(ledger) => info!(
            "Loaded ledger {} ({} users)",
            settings.ledger_path.display(),
            ledger.len()
        ),
        Err(e) => error!("Ledger is not readable: {}", e),
    }

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    let directory = Arc::new(DisplayNameDirectory::new());
    let handler = Arc::new(CommandHandler::new(
        &settings,
        Arc::clone(&store),
        Arc::clone(&directory),
    ));

    info!("Starting balance bot...");
    info!(
        "Command prefix: {} (earn: {}, cooldown: {}s)",
        settings.command_prefix, settings.earn_amount, settings.cooldown_secs
    );
    info!("Bot is running. Use Ctrl+C to stop.");

    let result = bot.run(handler, directory).await;

    // Cleanup
    info!("Shutting down...");
    bot.disconnect();

    result.context("Update loop failed")
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
