use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::sync::Arc;

use crate::changelog::{ChangeSetKey, CheckSum, RanChangeSet};
use crate::dialect::Dialect;
use crate::errors::ShiftResult;
use crate::lock::LockRecord;
use crate::sqlgen::Sql;

/// Statement execution and transaction control.
pub trait ConnectionProvider: Send + Sync {
    /// The capability descriptor of the connected database.
    fn dialect(&self) -> Dialect;

    /// Executes one statement.
    fn execute(&self, sql: &Sql) -> ShiftResult<()>;

    /// Opens a transaction. History writes made before
    /// [`commit`](ConnectionProvider::commit) belong to it.
    fn begin(&self) -> ShiftResult<()>;

    fn commit(&self) -> ShiftResult<()>;

    /// Discards the open transaction.
    fn rollback(&self) -> ShiftResult<()>;

    fn close(&self) -> ShiftResult<()>;
}

/// Persistence of the change history table.
pub trait ChangeHistoryProvider: Send + Sync {
    /// Creates the history table if it does not exist. Idempotent.
    fn init_history(&self) -> ShiftResult<()>;

    /// All rows, ordered by execution order.
    fn ran_change_sets(&self) -> ShiftResult<Vec<RanChangeSet>>;

    fn append(&self, record: &RanChangeSet) -> ShiftResult<()>;

    /// Replaces the row with the same key (rerun changesets).
    fn rewrite(&self, record: &RanChangeSet) -> ShiftResult<()>;

    fn update_checksum(&self, key: &ChangeSetKey, checksum: Option<&CheckSum>) -> ShiftResult<()>;

    fn update_tag(&self, key: &ChangeSetKey, tag: &str) -> ShiftResult<()>;

    fn delete(&self, key: &ChangeSetKey) -> ShiftResult<()>;

    /// Nulls every checksum whose version is below `current_version`.
    ///
    /// # Returns
    ///
    /// The number of rows changed.
    fn upgrade_legacy_checksums(&self, current_version: u32) -> ShiftResult<usize>;

    /// Nulls every stored checksum.
    fn clear_checksums(&self) -> ShiftResult<()>;
}

/// The single-row lock table.
pub trait LockProvider: Send + Sync {
    /// Creates the lock table and its row if absent. Idempotent.
    fn init_lock(&self) -> ShiftResult<()>;

    /// Atomically flips the row from unlocked to locked for `holder`.
    ///
    /// # Returns
    ///
    /// `true` when this call took the lock, `false` when it was held.
    fn try_acquire(&self, holder: &str, granted_at: DateTime<Utc>) -> ShiftResult<bool>;

    /// Unconditionally resets the row to unlocked.
    fn release(&self) -> ShiftResult<()>;

    /// Reads the row without changing it.
    fn current_lock(&self) -> ShiftResult<Option<LockRecord>>;
}

/// A store implementing every contract the engine needs.
pub trait DatabaseProvider: ConnectionProvider + ChangeHistoryProvider + LockProvider {}

impl<T: ConnectionProvider + ChangeHistoryProvider + LockProvider> DatabaseProvider for T {}

/// Shared handle to a [`DatabaseProvider`].
#[derive(Clone)]
pub struct Database {
    inner: Arc<dyn DatabaseProvider>,
}

impl Database {
    pub fn new<T: DatabaseProvider + 'static>(inner: T) -> Self {
        Database {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Database {
    type Target = Arc<dyn DatabaseProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
