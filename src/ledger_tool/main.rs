//! Offline inspection and administration of the balance ledger file.
//!
//! Works on the same JSON file the bot uses. Run it while the bot is
//! stopped when granting balances, since the bot only serializes writers
//! inside its own process.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;

use balance_bot::ledger::{Balance, LedgerStore, UserId};

/// Balance ledger maintenance tool.
#[derive(Parser, Debug)]
#[command(name = "ledger_tool")]
#[command(about = "Inspects and edits the balance bot ledger file")]
#[command(version)]
struct Args {
    /// Path to the balances JSON file.
    #[arg(short, long, default_value = "balances.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the ledger file is well-formed.
    Validate,

    /// Show the balance of one user.
    Show {
        /// User ID.
        user: String,
    },

    /// Show the users with the highest balances.
    Top {
        /// Number of users to show.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Credit an amount to a user.
    Grant {
        /// User ID.
        user: String,

        /// Amount to credit.
        amount: Balance,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let store = LedgerStore::new(&args.file);

    match args.command {
        Command::Validate => validate(&store).await,
        Command::Show { user } => show(&store, &user).await,
        Command::Top { limit } => top(&store, limit).await,
        Command::Grant { user, amount, yes } => grant(&store, &user, amount, yes).await,
    }
}

async fn validate(store: &LedgerStore) -> ExitCode {
    println!("Validating: {}", store.path().display());

    match store.load().await {
        Ok(ledger) => {
            println!("✓ Ledger is valid");
            println!("  Users: {}", ledger.len());
            println!("  Total balance: ${}", ledger.total());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn show(store: &LedgerStore, raw_user: &str) -> ExitCode {
    let Some(user) = parse_user(raw_user) else {
        return ExitCode::FAILURE;
    };

    match store.balance_of(&user).await {
        Ok(balance) => {
            println!("{user}: ${balance}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn top(store: &LedgerStore, limit: usize) -> ExitCode {
    let ranked = match store.top(limit).await {
        Ok(ranked) => ranked,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    if ranked.is_empty() {
        println!("No one has earned any money yet!");
        return ExitCode::SUCCESS;
    }

    for (position, (user, balance)) in ranked.iter().enumerate() {
        println!("{:>3}. {user}: ${balance}", position + 1);
    }

    ExitCode::SUCCESS
}

async fn grant(store: &LedgerStore, raw_user: &str, amount: Balance, yes: bool) -> ExitCode {
    let Some(user) = parse_user(raw_user) else {
        return ExitCode::FAILURE;
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Credit ${amount} to user {user}?"))
            .default(false)
            .interact();

        match confirmed {
            Ok(true) => {}
            Ok(false) => {
                println!("Cancelled.");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("✗ Failed to read confirmation: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    match store.credit(&user, amount).await {
        Ok(balance) => {
            println!("✓ Credited ${amount} to {user}. New balance: ${balance}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_user(raw: &str) -> Option<UserId> {
    match UserId::parse(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            eprintln!("✗ {e}");
            None
        }
    }
}
