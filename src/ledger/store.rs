//! File-backed ledger storage.
//!
//! The ledger lives in a single JSON document that is read in full before
//! every operation and replaced in full after every mutation. Writes go to a
//! uniquely named temporary file in the same directory which is then renamed
//! over the target, so a reader never observes a partially written mapping.
//!
//! All writers inside the process are serialized by one lock. The lock guard
//! travels into the blocking task doing the file work, so it is only released
//! once that work has finished, even when the caller stopped waiting. A write
//! whose caller timed out is dropped before it replaces the file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::{Balance, Ledger, LedgerError, UserId};

/// Default upper bound for a single file operation.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can occur while reading or writing the ledger file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read ledger file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write ledger file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Ledger {operation} on {path} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        path: PathBuf,
        timeout: Duration,
    },

    #[error("Ledger {operation} task failed: {message}")]
    Task {
        operation: &'static str,
        message: String,
    },
}

/// Durable balance storage backed by one JSON file.
#[derive(Debug)]
pub struct LedgerStore {
    /// Location of the ledger file.
    path: PathBuf,

    /// Upper bound for each file operation.
    io_timeout: Duration,

    /// Single-writer lock.
    write_lock: Arc<Mutex<()>>,
}

impl LedgerStore {
    /// Creates a store for the ledger file at `path`.
    ///
    /// Nothing is read until the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sets the upper bound for each file operation.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Returns the path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted ledger.
    ///
    /// A missing file is an empty ledger. A file that exists but does not
    /// hold a well-formed mapping is a [`StorageError::Corrupt`].
    pub async fn load(&self) -> Result<Ledger, StorageError> {
        let path = self.path.clone();
        self.run_blocking("load", &CommitGate::default(), move || read_ledger(&path))
            .await
    }

    /// Replaces the persisted ledger with `ledger`.
    ///
    /// On [`StorageError::Timeout`] the file is left as it was.
    pub async fn save(&self, ledger: &Ledger) -> Result<(), StorageError> {
        let guard = self.acquire_writer("save").await?;

        let path = self.path.clone();
        let ledger = ledger.clone();
        let gate = Arc::new(CommitGate::default());
        let task_gate = Arc::clone(&gate);

        self.run_blocking("save", &gate, move || {
            let _guard = guard;
            commit_ledger(&path, &ledger, &task_gate)
        })
        .await
    }

    /// Returns the stored balance of `user`.
    pub async fn balance_of(&self, user: &UserId) -> Result<Balance, StorageError> {
        Ok(self.load().await?.get_balance(user))
    }

    /// Returns up to `limit` users ordered by balance, highest first.
    pub async fn top(&self, limit: usize) -> Result<Vec<(UserId, Balance)>, StorageError> {
        Ok(self.load().await?.rank(limit))
    }

    /// Credits `amount` to `user` and persists the result.
    ///
    /// Load, credit and save run as one blocking task holding the writer
    /// lock, so concurrent credits never overwrite each other. An error
    /// means the credit was not applied.
    pub async fn credit(&self, user: &UserId, amount: Balance) -> Result<Balance, LedgerError> {
        let guard = self.acquire_writer("credit").await?;

        let path = self.path.clone();
        let task_user = user.clone();
        let gate = Arc::new(CommitGate::default());
        let task_gate = Arc::clone(&gate);

        let balance = self
            .run_blocking("credit", &gate, move || {
                let _guard = guard;
                let mut ledger = read_ledger(&path)?;
                let balance = ledger.credit(&task_user, amount)?;
                commit_ledger(&path, &ledger, &task_gate)?;
                Ok::<_, LedgerError>(balance)
            })
            .await?;

        debug!("Credited {} to user {} (balance: {})", amount, user, balance);
        Ok(balance)
    }

    /// Waits for the writer lock, bounded by `io_timeout`.
    async fn acquire_writer(
        &self,
        operation: &'static str,
    ) -> Result<OwnedMutexGuard<()>, StorageError> {
        tokio::time::timeout(self.io_timeout, Arc::clone(&self.write_lock).lock_owned())
            .await
            .map_err(|_| self.timeout_error(operation))
    }

    /// Runs a file operation on the blocking pool, bounded by `io_timeout`.
    ///
    /// On timeout the gate is closed so a pending write never lands. If the
    /// write already landed, its result is reported instead of the timeout.
    async fn run_blocking<T, E, F>(
        &self,
        operation: &'static str,
        gate: &CommitGate,
        f: F,
    ) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let mut task = tokio::task::spawn_blocking(f);

        let joined = match tokio::time::timeout(self.io_timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if gate.abandon() => task.await,
            Err(_) => {
                warn!("Ledger {} timed out after {:?}", operation, self.io_timeout);
                return Err(self.timeout_error(operation).into());
            }
        };

        match joined {
            Ok(result) => result,
            Err(join_err) => Err(StorageError::Task {
                operation,
                message: join_err.to_string(),
            }
            .into()),
        }
    }

    fn timeout_error(&self, operation: &'static str) -> StorageError {
        StorageError::Timeout {
            operation,
            path: self.path.clone(),
            timeout: self.io_timeout,
        }
    }
}

/// Progress of one write, shared between the caller and the blocking task.
#[derive(Debug, Default)]
struct CommitGate(std::sync::Mutex<GateState>);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum GateState {
    #[default]
    Pending,
    Committed,
    Abandoned,
}

impl CommitGate {
    /// Runs `commit` unless the caller has abandoned the write.
    fn commit<F>(&self, path: &Path, commit: F) -> Result<(), StorageError>
    where
        F: FnOnce() -> Result<(), StorageError>,
    {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == GateState::Abandoned {
            return Err(StorageError::Write {
                path: path.to_owned(),
                source: std::io::Error::new(ErrorKind::TimedOut, "write abandoned after timeout"),
            });
        }

        commit()?;
        *state = GateState::Committed;
        Ok(())
    }

    /// Abandons a pending write. Returns `true` if it had already committed.
    fn abandon(&self) -> bool {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == GateState::Committed {
            return true;
        }
        *state = GateState::Abandoned;
        false
    }
}

/// Reads a ledger file synchronously. A missing file yields an empty ledger.
fn read_ledger(path: &Path) -> Result<Ledger, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Ledger file {} not found, starting empty", path.display());
            return Ok(Ledger::new());
        }
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_owned(),
                source,
            });
        }
    };

    serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
        path: path.to_owned(),
        source,
    })
}

/// Serializes the ledger into a fresh temporary file beside `path` and
/// renames it over `path` if the gate still allows it.
fn commit_ledger(path: &Path, ledger: &Ledger, gate: &CommitGate) -> Result<(), StorageError> {
    let write_err = |source: std::io::Error| StorageError::Write {
        path: path.to_owned(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(ledger)
        .map_err(|e| write_err(std::io::Error::other(e)))?;

    let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
    staged.write_all(&json).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;

    // Dropping an unpersisted NamedTempFile removes it
    gate.commit(path, || {
        staged
            .persist(path)
            .map(|_| ())
            .map_err(|e| write_err(e.error))
    })?;

    debug!("Saved ledger with {} users to {}", ledger.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn store_in(dir: &TempDir) -> LedgerStore {
        LedgerStore::new(dir.path().join("balances.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let ledger = store.load().await.unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.get_balance(&uid("99")), 0);
    }

    #[tokio::test]
    async fn test_credit_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let user = uid("42");

        let mut ledger = store.load().await.unwrap();
        let before = ledger.get_balance(&user);
        ledger.credit(&user, 250).unwrap();
        store.save(&ledger).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.get_balance(&user), before + 250);
        assert_eq!(reloaded, ledger);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.credit(&uid("1"), 10).await.unwrap();

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_store_credit_twice() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let user = uid("42");

        assert_eq!(store.credit(&user, 100).await.unwrap(), 100);
        assert_eq!(store.credit(&user, 100).await.unwrap(), 200);
        assert_eq!(store.balance_of(&user).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(
            store.load().await,
            Err(StorageError::Corrupt { .. })
        ));
        assert!(matches!(
            store.credit(&uid("1"), 100).await,
            Err(LedgerError::Storage(StorageError::Corrupt { .. }))
        ));
        // The corrupt file is left untouched
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_negative_balance_on_disk_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"1": -100}"#).unwrap();

        assert!(matches!(
            store.load().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("balances.json");
        let store = LedgerStore::new(&path);

        store.credit(&uid("5"), 1).await.unwrap();
        store.credit(&uid("6"), 1).await.unwrap();

        assert!(path.exists());
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_concurrent_credits_lose_no_updates() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        let mut tasks = Vec::new();
        for i in 0..40_u32 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let user = uid(if i % 2 == 0 { "1" } else { "2" });
                store.credit(&user, 100).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let ledger = store.load().await.unwrap();
        assert_eq!(ledger.get_balance(&uid("1")), 2000);
        assert_eq!(ledger.get_balance(&uid("2")), 2000);
    }

    #[tokio::test]
    async fn test_top_limits_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for i in 1..=12_u64 {
            store.credit(&uid(&i.to_string()), i * 10).await.unwrap();
        }

        let top = store.top(10).await.unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0], (uid("12"), 120));
        assert_eq!(top[9], (uid("3"), 30));
    }

    #[tokio::test]
    async fn test_writes_time_out_while_writer_is_busy() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).with_io_timeout(Duration::from_millis(50));

        let held = store.write_lock.lock().await;
        assert!(matches!(
            store.credit(&uid("1"), 100).await,
            Err(LedgerError::Storage(StorageError::Timeout {
                operation: "credit",
                ..
            }))
        ));
        assert!(matches!(
            store.save(&Ledger::new()).await,
            Err(StorageError::Timeout {
                operation: "save",
                ..
            })
        ));
        drop(held);

        assert_eq!(store.balance_of(&uid("1")).await.unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_timed_out_credits_are_not_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("balances.json");
        let user = uid("42");
        LedgerStore::new(&path).credit(&user, 100).await.unwrap();

        let store = Arc::new(LedgerStore::new(&path).with_io_timeout(Duration::from_nanos(1)));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let user = user.clone();
            tasks.push(tokio::spawn(async move { store.credit(&user, 100).await }));
        }

        let mut applied = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => applied += 1,
                Err(e) => assert!(
                    matches!(e, LedgerError::Storage(StorageError::Timeout { .. })),
                    "unexpected error: {e}"
                ),
            }
        }

        // Wait for any blocking task still holding the writer lock
        drop(store.write_lock.lock().await);

        let balance = LedgerStore::new(&path).balance_of(&user).await.unwrap();
        assert_eq!(balance, 100 + 100 * applied);
    }
}
