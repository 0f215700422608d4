//! Per-user command cooldowns.
//!
//! Keeps one user from spamming the same command. Each (user, command) pair
//! may be used once per window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use super::BotCommand;
use crate::ledger::UserId;

/// Tracks the last use of each command by each user.
#[derive(Debug)]
pub struct CooldownTracker {
    /// Minimum duration between two uses of a command by one user.
    window: Duration,

    /// Last accepted use per (user, command).
    last_used: Mutex<HashMap<(UserId, BotCommand), Instant>>,
}

impl CooldownTracker {
    /// Creates a tracker with the specified window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a tracker from seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Records a use of `command` by `user` if the cooldown has passed.
    ///
    /// Returns the time left to wait when the use is rejected.
    pub async fn try_acquire(&self, user: &UserId, command: BotCommand) -> Result<(), Duration> {
        if self.window.is_zero() {
            return Ok(());
        }

        let mut last_used = self.last_used.lock().await;
        let now = Instant::now();

        last_used.retain(|_, used_at| now.duration_since(*used_at) < self.window);

        let key = (user.clone(), command);
        if let Some(used_at) = last_used.get(&key) {
            let remaining = self.window - now.duration_since(*used_at);
            debug!("User {} on cooldown for {} ({:?} left)", user, command, remaining);
            return Err(remaining);
        }

        last_used.insert(key, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_first_use_allowed() {
        let tracker = CooldownTracker::from_secs(3);
        assert!(tracker.try_acquire(&uid("1"), BotCommand::Earn).await.is_ok());
    }

    #[tokio::test]
    async fn test_repeat_use_rejected() {
        let tracker = CooldownTracker::from_secs(60);
        let user = uid("1");

        tracker.try_acquire(&user, BotCommand::Earn).await.unwrap();
        let remaining = tracker.try_acquire(&user, BotCommand::Earn).await.unwrap_err();
        assert!(remaining > Duration::ZERO);
        assert!(remaining <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cooldown_is_per_user_and_command() {
        let tracker = CooldownTracker::from_secs(60);

        tracker.try_acquire(&uid("1"), BotCommand::Earn).await.unwrap();
        assert!(tracker.try_acquire(&uid("2"), BotCommand::Earn).await.is_ok());
        assert!(tracker.try_acquire(&uid("1"), BotCommand::Balance).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_cooldown_allows_again() {
        let tracker = CooldownTracker::new(Duration::from_millis(20));
        let user = uid("1");

        tracker.try_acquire(&user, BotCommand::Earn).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(tracker.try_acquire(&user, BotCommand::Earn).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_window_disables_cooldown() {
        let tracker = CooldownTracker::from_secs(0);
        let user = uid("1");

        tracker.try_acquire(&user, BotCommand::Earn).await.unwrap();
        assert!(tracker.try_acquire(&user, BotCommand::Earn).await.is_ok());
    }
}
