//! Telegram client wrapper for the command bot.

use std::sync::Arc;

use grammers_client::client::UpdatesConfiguration;
use grammers_client::peer::Peer;
use grammers_client::update::Update;
use grammers_client::{Client, InvocationError, SenderPool, sender};
use grammers_session::storages::SqliteSession;
use grammers_session::updates::UpdatesLike;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::DisplayNameDirectory;
use crate::commands::{CommandHandler, Invoker};
use crate::config::TelegramConfig;
use crate::ledger::UserId;

/// Raw update channel handed out by the sender pool.
pub type RawUpdatesReceiver = mpsc::UnboundedReceiver<UpdatesLike>;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),

    #[error("Update loop is already running")]
    AlreadyRunning,
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        Self::Invocation(err.to_string())
    }
}

/// High-level Telegram bot wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Update channel, taken by [`TelegramBot::run`].
    updates: Mutex<Option<RawUpdatesReceiver>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram and signs in with the bot token if needed.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let bot = Self {
            client,
            handle: handle.thin,
            updates: Mutex::new(Some(updates)),
            _pool_task: pool_task,
        };

        if bot.is_authorized().await? {
            info!("Connected to Telegram with existing session");
        } else {
            bot.sign_in(&config.bot_token, &config.api_hash).await?;
        }

        Ok(bot)
    }

    /// Checks if the client is authorized.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Signs in as a bot.
    async fn sign_in(&self, bot_token: &str, api_hash: &str) -> Result<(), TelegramError> {
        info!("Signing in with bot token {}...", mask_token(bot_token));

        self.client
            .bot_sign_in(bot_token, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))?;

        info!("Successfully signed in!");
        Ok(())
    }

    /// Processes incoming messages until Ctrl+C.
    ///
    /// Each message is handled on its own task. Replies go back to the chat
    /// the command came from.
    pub async fn run(
        &self,
        handler: Arc<CommandHandler<DisplayNameDirectory>>,
        directory: Arc<DisplayNameDirectory>,
    ) -> Result<(), TelegramError> {
        let Some(updates) = self.updates.lock().await.take() else {
            return Err(TelegramError::AlreadyRunning);
        };

        let mut stream = self
            .client
            .stream_updates(
                updates,
                UpdatesConfiguration {
                    catch_up: false,
                    ..Default::default()
                },
            )
            .await;

        info!("Listening for commands (prefix: {})", handler.prefix());

        loop {
            let update = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping update loop");
                    break;
                }
                update = stream.next() => update?,
            };

            let Update::NewMessage(message) = update else {
                continue;
            };
            if message.outgoing() {
                continue;
            }

            let handler = Arc::clone(&handler);
            let directory = Arc::clone(&directory);

            tokio::spawn(async move {
                let text = message.text().to_owned();
                if !text.starts_with(handler.prefix()) {
                    return;
                }

                // Groups and channels posting as themselves have no balance
                let Some(sender @ Peer::User(_)) = message.sender() else {
                    debug!("Ignoring command not sent by a user");
                    return;
                };
                let user = match UserId::try_from(sender.id().bare_id()) {
                    Ok(user) => user,
                    Err(e) => {
                        debug!("Ignoring command from unusable sender id: {}", e);
                        return;
                    }
                };
                let display_name = sender
                    .name()
                    .map_or_else(|| user.to_string(), ToOwned::to_owned);

                directory.remember(&user, &display_name).await;

                let invoker = Invoker::new(user, display_name);
                let Some(result) = handler.try_handle(&invoker, &text).await else {
                    return;
                };

                if let Err(e) = message.reply(result.message).await {
                    warn!("Failed to send reply to user {}: {}", invoker.id, e);
                }
            });
        }

        stream.sync_update_state();
        Ok(())
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Masks a bot token for logging (keeps the bot id part).
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) if !bot_id.is_empty() => format!("{bot_id}:****"),
        _ => "****".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("123456:ABC-DEF"), "123456:****");
        assert_eq!(mask_token("no-colon"), "****");
        assert_eq!(mask_token(":secret"), "****");
    }
}
