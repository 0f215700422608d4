//! Display name lookup for stored user identifiers.

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::UserId;

/// Errors that can occur while resolving a display name.
#[derive(Debug, Error)]
pub enum UserResolutionError {
    #[error("Unknown user: {0}")]
    Unknown(UserId),
}

/// Turns ledger keys into names that can be shown in replies.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns the display name of `user`.
    async fn resolve(&self, user: &UserId) -> Result<String, UserResolutionError>;
}
