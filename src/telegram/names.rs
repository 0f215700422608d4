//! Directory of display names seen by the bot.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::commands::{NameResolver, UserResolutionError};
use crate::ledger::UserId;

/// Remembers the latest display name of every user who messaged the bot.
///
/// Bots cannot look up arbitrary users by id, so leaderboard names come from
/// messages observed since startup.
#[derive(Debug, Default)]
pub struct DisplayNameDirectory {
    names: RwLock<HashMap<UserId, String>>,
}

impl DisplayNameDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the display name of `user`, replacing any previous one.
    pub async fn remember(&self, user: &UserId, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut names = self.names.write().await;
        if names.get(user).map(String::as_str) != Some(name) {
            names.insert(user.clone(), name.to_owned());
        }
    }
}

#[async_trait]
impl NameResolver for DisplayNameDirectory {
    async fn resolve(&self, user: &UserId) -> Result<String, UserResolutionError> {
        self.names
            .read()
            .await
            .get(user)
            .cloned()
            .ok_or_else(|| UserResolutionError::Unknown(user.clone()))
    }
}
