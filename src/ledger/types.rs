//! Ledger data types.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::StorageError;

/// Amount of currency held by a user.
pub type Balance = u64;

/// Maximum number of digits accepted in a user identifier.
pub const MAX_USER_ID_DIGITS: usize = 20;

/// Errors produced when a raw identifier is not a valid [`UserId`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("User ID is empty")]
    Empty,

    #[error("User ID must contain only digits: {0:?}")]
    NotNumeric(String),

    #[error("User ID is too long: {length} digits (max: {MAX_USER_ID_DIGITS})")]
    TooLong { length: usize },

    #[error("User ID must be positive, got {0}")]
    NotPositive(i64),

    #[error("User ID {raw:?} is not in canonical form (expected {canonical:?})")]
    NonCanonical { raw: String, canonical: String },
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Crediting {amount} to user {user} would overflow the balance")]
    Overflow { user: UserId, amount: Balance },
}

/// Validated external user identifier, used as the ledger key.
///
/// Identifiers are positive numeric platform ids, stored without leading
/// zeros. Keys read from disk must already be in that form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parses and normalizes a raw identifier.
    ///
    /// Surrounding whitespace and leading zeros are dropped, so `" 042"`
    /// and `"42"` are the same user.
    pub fn parse(raw: &str) -> Result<Self, UserIdError> {
        let id = raw.trim();

        if id.is_empty() {
            return Err(UserIdError::Empty);
        }
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(UserIdError::NotNumeric(id.to_owned()));
        }

        let digits = id.trim_start_matches('0');
        if digits.is_empty() {
            return Err(UserIdError::NotPositive(0));
        }
        if digits.len() > MAX_USER_ID_DIGITS {
            return Err(UserIdError::TooLong {
                length: digits.len(),
            });
        }

        Ok(Self(digits.to_owned()))
    }

    /// Parses an identifier that must already be canonical.
    pub fn parse_canonical(raw: &str) -> Result<Self, UserIdError> {
        let id = Self::parse(raw)?;
        if id.0 != raw {
            return Err(UserIdError::NonCanonical {
                raw: raw.to_owned(),
                canonical: id.0,
            });
        }
        Ok(id)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = UserIdError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        if id <= 0 {
            return Err(UserIdError::NotPositive(id));
        }
        Ok(Self(id.to_string()))
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_canonical(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from user to balance.
///
/// Serialized as a plain JSON object: `{"42": 200}`. Iteration follows
/// ascending key order. Deserialization rejects repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    balances: BTreeMap<UserId, Balance>,
}

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the balance of `user`, or 0 when the user has no record.
    #[must_use]
    pub fn get_balance(&self, user: &UserId) -> Balance {
        self.balances.get(user).copied().unwrap_or(0)
    }

    /// Adds `amount` to the balance of `user` and returns the new balance.
    pub fn credit(&mut self, user: &UserId, amount: Balance) -> Result<Balance, LedgerError> {
        let current = self.get_balance(user);
        let updated = current.checked_add(amount).ok_or_else(|| LedgerError::Overflow {
            user: user.clone(),
            amount,
        })?;

        self.balances.insert(user.clone(), updated);
        Ok(updated)
    }

    /// Returns up to `limit` entries sorted by balance, highest first.
    ///
    /// Ties keep the ledger's iteration order.
    #[must_use]
    pub fn rank(&self, limit: usize) -> Vec<(UserId, Balance)> {
        let mut entries: Vec<(UserId, Balance)> = self
            .balances
            .iter()
            .map(|(user, balance)| (user.clone(), *balance))
            .collect();

        // Stable sort, so equal balances stay in key order
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(limit);
        entries
    }

    /// Returns the sum of all balances, saturating at `Balance::MAX`.
    #[must_use]
    pub fn total(&self) -> Balance {
        self.balances
            .values()
            .fold(0, |acc: Balance, b| acc.saturating_add(*b))
    }

    /// Returns the number of users with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Checks if no user has a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl<'de> Deserialize<'de> for Ledger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LedgerVisitor;

        impl<'de> Visitor<'de> for LedgerVisitor {
            type Value = Ledger;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of user IDs to balances")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Ledger, A::Error> {
                let mut balances = BTreeMap::new();

                while let Some((user, balance)) = map.next_entry::<UserId, Balance>()? {
                    if balances.contains_key(&user) {
                        return Err(de::Error::custom(format!("duplicate user ID {user}")));
                    }
                    balances.insert(user, balance);
                }

                Ok(Ledger { balances })
            }
        }

        deserializer.deserialize_map(LedgerVisitor)
    }
}

impl FromIterator<(UserId, Balance)> for Ledger {
    fn from_iter<I: IntoIterator<Item = (UserId, Balance)>>(iter: I) -> Self {
        Self {
            balances: iter.into_iter().collect(),
        }
    }
}
