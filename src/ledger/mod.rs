//! Balance ledger module.
//!
//! Holds the per-user balance mapping and its JSON file persistence.

mod store;
mod types;

pub use store::{DEFAULT_IO_TIMEOUT, LedgerStore, StorageError};
pub use types::{Balance, Ledger, LedgerError, MAX_USER_ID_DIGITS, UserId, UserIdError};
