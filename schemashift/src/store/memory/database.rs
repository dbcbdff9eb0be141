use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::changelog::{ChangeSetKey, CheckSum, RanChangeSet};
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::dialect::Dialect;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::lock::LockRecord;
use crate::sqlgen::Sql;
use crate::store::{ChangeHistoryProvider, ConnectionProvider, LockProvider};

#[derive(Clone, Default)]
struct InMemoryState {
    history: Vec<RanChangeSet>,
    statements: Vec<String>,
}

/// A database kept entirely in process memory.
///
/// Statements are recorded, not interpreted. History writes and recorded
/// statements are transactional; the lock row is not, as in a real store
/// where the lock is updated outside the migration transaction.
///
/// Clones share state, which lets several coordinators contend for one lock.
#[derive(Clone)]
pub struct InMemoryDatabase {
    inner: Arc<InMemoryDatabaseInner>,
}

impl InMemoryDatabase {
    pub fn new(dialect: Dialect) -> Self {
        InMemoryDatabase {
            inner: Arc::new(InMemoryDatabaseInner::new(dialect)),
        }
    }

    /// Makes every later statement containing `fragment` fail.
    pub fn fail_on(&self, fragment: &str) {
        self.inner.failures.write_with(|it| it.push(fragment.to_string()));
    }

    pub fn clear_failures(&self) {
        self.inner.failures.write_with(|it| it.clear());
    }

    /// Statements executed and committed (or executed outside a transaction).
    pub fn executed_statements(&self) -> Vec<String> {
        self.inner.state.read_with(|it| it.statements.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Inserts a history row directly, bypassing the engine.
    pub fn seed_history(&self, record: RanChangeSet) {
        self.inner.state.write_with(|it| it.history.push(record));
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        InMemoryDatabase::new(Dialect::generic())
    }
}

impl ConnectionProvider for InMemoryDatabase {
    fn dialect(&self) -> Dialect {
        self.inner.dialect.clone()
    }

    fn execute(&self, sql: &Sql) -> ShiftResult<()> {
        self.inner.execute(sql)
    }

    fn begin(&self) -> ShiftResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> ShiftResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> ShiftResult<()> {
        self.inner.rollback()
    }

    fn close(&self) -> ShiftResult<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl ChangeHistoryProvider for InMemoryDatabase {
    fn init_history(&self) -> ShiftResult<()> {
        self.inner.history_created.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn ran_change_sets(&self) -> ShiftResult<Vec<RanChangeSet>> {
        self.inner.check_history()?;
        let mut history = self.inner.state.read_with(|it| it.history.clone());
        history.sort_by_key(|it| (it.order_executed(), it.executed_at()));
        Ok(history)
    }

    fn append(&self, record: &RanChangeSet) -> ShiftResult<()> {
        self.inner.check_history()?;
        self.inner.state.write_with(|it| it.history.push(record.clone()));
        Ok(())
    }

    fn rewrite(&self, record: &RanChangeSet) -> ShiftResult<()> {
        self.inner.update_row(record.key(), |row| *row = record.clone())
    }

    fn update_checksum(&self, key: &ChangeSetKey, checksum: Option<&CheckSum>) -> ShiftResult<()> {
        self.inner.update_row(key, |row| row.set_checksum(checksum.cloned()))
    }

    fn update_tag(&self, key: &ChangeSetKey, tag: &str) -> ShiftResult<()> {
        self.inner.update_row(key, |row| row.set_tag(tag))
    }

    fn delete(&self, key: &ChangeSetKey) -> ShiftResult<()> {
        self.inner.check_history()?;
        self.inner
            .state
            .write_with(|it| it.history.retain(|row| row.key() != key));
        Ok(())
    }

    fn upgrade_legacy_checksums(&self, current_version: u32) -> ShiftResult<usize> {
        self.inner.check_history()?;
        Ok(self.inner.state.write_with(|it| {
            let mut changed = 0;
            for row in it.history.iter_mut() {
                if row.checksum().is_some_and(|c| c.version() < current_version) {
                    row.set_checksum(None);
                    changed += 1;
                }
            }
            changed
        }))
    }

    fn clear_checksums(&self) -> ShiftResult<()> {
        self.inner.check_history()?;
        self.inner.state.write_with(|it| {
            for row in it.history.iter_mut() {
                row.set_checksum(None);
            }
        });
        Ok(())
    }
}

impl LockProvider for InMemoryDatabase {
    fn init_lock(&self) -> ShiftResult<()> {
        let mut lock = self.inner.lock.lock();
        if lock.is_none() {
            *lock = Some(LockRecord::unlocked());
        }
        Ok(())
    }

    fn try_acquire(&self, holder: &str, granted_at: DateTime<Utc>) -> ShiftResult<bool> {
        let mut lock = self.inner.lock.lock();
        match lock.as_ref() {
            None => Err(ShiftError::new(
                "Lock table does not exist",
                ErrorKind::LockError,
            )),
            Some(record) if record.is_locked() => Ok(false),
            Some(_) => {
                *lock = Some(LockRecord::locked(holder, granted_at));
                Ok(true)
            }
        }
    }

    fn release(&self) -> ShiftResult<()> {
        let mut lock = self.inner.lock.lock();
        if lock.is_some() {
            *lock = Some(LockRecord::unlocked());
        }
        Ok(())
    }

    fn current_lock(&self) -> ShiftResult<Option<LockRecord>> {
        Ok(self.inner.lock.lock().clone())
    }
}

struct InMemoryDatabaseInner {
    dialect: Dialect,
    closed: AtomicBool,
    history_created: AtomicBool,
    state: Atomic<InMemoryState>,
    snapshot: Mutex<Option<InMemoryState>>,
    lock: Mutex<Option<LockRecord>>,
    failures: Atomic<Vec<String>>,
}

impl InMemoryDatabaseInner {
    fn new(dialect: Dialect) -> Self {
        InMemoryDatabaseInner {
            dialect,
            closed: AtomicBool::new(false),
            history_created: AtomicBool::new(false),
            state: atomic(InMemoryState::default()),
            snapshot: Mutex::new(None),
            lock: Mutex::new(None),
            failures: atomic(Vec::new()),
        }
    }

    fn check_open(&self) -> ShiftResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(ShiftError::new(
                "In-memory database is closed",
                ErrorKind::BackendError,
            ));
        }
        Ok(())
    }

    fn check_history(&self) -> ShiftResult<()> {
        self.check_open()?;
        if !self.history_created.load(Ordering::Relaxed) {
            return Err(ShiftError::new(
                "Change history table does not exist",
                ErrorKind::BackendError,
            ));
        }
        Ok(())
    }

    fn execute(&self, sql: &Sql) -> ShiftResult<()> {
        self.check_open()?;
        let failing = self
            .failures
            .read_with(|it| it.iter().find(|f| sql.text().contains(f.as_str())).cloned());
        if let Some(fragment) = failing {
            log::error!("Simulated failure on '{}' (matched '{}')", sql.text(), fragment);
            return Err(ShiftError::new(
                &format!("Simulated failure executing '{}'", sql.text()),
                ErrorKind::BackendError,
            ));
        }
        self.state
            .write_with(|it| it.statements.push(sql.text().to_string()));
        Ok(())
    }

    fn begin(&self) -> ShiftResult<()> {
        self.check_open()?;
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_some() {
            return Err(ShiftError::new(
                "A transaction is already open",
                ErrorKind::InvalidOperation,
            ));
        }
        *snapshot = Some(self.state.read_with(|it| it.clone()));
        Ok(())
    }

    fn commit(&self) -> ShiftResult<()> {
        match self.snapshot.lock().take() {
            Some(_) => Ok(()),
            None => Err(ShiftError::new(
                "No transaction to commit",
                ErrorKind::InvalidOperation,
            )),
        }
    }

    fn rollback(&self) -> ShiftResult<()> {
        match self.snapshot.lock().take() {
            Some(saved) => {
                self.state.write_with(|it| *it = saved);
                Ok(())
            }
            None => Err(ShiftError::new(
                "No transaction to roll back",
                ErrorKind::InvalidOperation,
            )),
        }
    }

    fn update_row(&self, key: &ChangeSetKey, update: impl FnOnce(&mut RanChangeSet)) -> ShiftResult<()> {
        self.check_history()?;
        self.state.write_with(|it| {
            match it.history.iter_mut().find(|row| row.key() == key) {
                Some(row) => {
                    update(row);
                    Ok(())
                }
                None => Err(ShiftError::new(
                    &format!("No history row for {}", key),
                    ErrorKind::BackendError,
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ExecType;

    fn record(id: &str, order: i64) -> RanChangeSet {
        RanChangeSet::new(
            ChangeSetKey::new(id, "bob", "changelog.yaml"),
            Some(CheckSum::compute(id)),
            Utc::now(),
            order,
            ExecType::Executed,
        )
    }

    fn database() -> InMemoryDatabase {
        let db = InMemoryDatabase::default();
        db.init_history().unwrap();
        db
    }

    #[test]
    fn test_history_requires_init() {
        let db = InMemoryDatabase::default();
        assert!(db.ran_change_sets().is_err());
        db.init_history().unwrap();
        db.init_history().unwrap();
        assert!(db.ran_change_sets().unwrap().is_empty());
    }

    #[test]
    fn test_ran_change_sets_ordered() {
        let db = database();
        db.append(&record("2", 2)).unwrap();
        db.append(&record("1", 1)).unwrap();
        let ids: Vec<String> = db
            .ran_change_sets()
            .unwrap()
            .iter()
            .map(|it| it.key().id().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_rollback_restores_history_and_statements() {
        let db = database();
        db.append(&record("1", 1)).unwrap();
        db.begin().unwrap();
        db.execute(&Sql::new("CREATE TABLE t (x INT)")).unwrap();
        db.append(&record("2", 2)).unwrap();
        db.rollback().unwrap();

        assert_eq!(db.ran_change_sets().unwrap().len(), 1);
        assert!(db.executed_statements().is_empty());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let db = database();
        db.begin().unwrap();
        db.execute(&Sql::new("CREATE TABLE t (x INT)")).unwrap();
        db.append(&record("1", 1)).unwrap();
        db.commit().unwrap();
        assert_eq!(db.executed_statements(), vec!["CREATE TABLE t (x INT)"]);
        assert!(db.commit().is_err());
    }

    #[test]
    fn test_nested_begin_refused() {
        let db = database();
        db.begin().unwrap();
        let err = db.begin().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_fail_on_fragment() {
        let db = database();
        db.fail_on("DROP");
        let err = db.execute(&Sql::new("DROP TABLE t")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
        db.clear_failures();
        assert!(db.execute(&Sql::new("DROP TABLE t")).is_ok());
    }

    #[test]
    fn test_update_checksum_and_tag() {
        let db = database();
        let row = record("1", 1);
        db.append(&row).unwrap();
        db.update_checksum(row.key(), None).unwrap();
        db.update_tag(row.key(), "v1").unwrap();
        let stored = &db.ran_change_sets().unwrap()[0];
        assert!(stored.checksum().is_none());
        assert_eq!(stored.tag(), Some("v1"));

        let missing = ChangeSetKey::new("9", "bob", "changelog.yaml");
        assert!(db.update_tag(&missing, "v2").is_err());
    }

    #[test]
    fn test_upgrade_legacy_checksums() {
        let db = database();
        let legacy = RanChangeSet::new(
            ChangeSetKey::new("old", "bob", "changelog.yaml"),
            Some(CheckSum::parse("7:abcdef").unwrap()),
            Utc::now(),
            1,
            ExecType::Executed,
        );
        db.append(&legacy).unwrap();
        db.append(&record("new", 2)).unwrap();

        assert_eq!(db.upgrade_legacy_checksums(9).unwrap(), 1);
        let rows = db.ran_change_sets().unwrap();
        assert!(rows[0].checksum().is_none());
        assert!(rows[1].checksum().is_some());
    }

    #[test]
    fn test_lock_compare_and_set() {
        let db = InMemoryDatabase::default();
        assert!(db.try_acquire("a", Utc::now()).is_err());
        db.init_lock().unwrap();
        assert!(db.try_acquire("a", Utc::now()).unwrap());
        assert!(!db.try_acquire("b", Utc::now()).unwrap());
        assert_eq!(
            db.current_lock().unwrap().and_then(|it| it.locked_by().map(|s| s.to_string())),
            Some("a".to_string())
        );
        db.release().unwrap();
        assert!(db.try_acquire("b", Utc::now()).unwrap());
    }

    #[test]
    fn test_lock_survives_transaction_rollback() {
        let db = database();
        db.init_lock().unwrap();
        db.begin().unwrap();
        assert!(db.try_acquire("a", Utc::now()).unwrap());
        db.rollback().unwrap();
        assert!(db.current_lock().unwrap().is_some_and(|it| it.is_locked()));
    }

    #[test]
    fn test_closed_database_refuses_work() {
        let db = database();
        db.close().unwrap();
        assert!(db.is_closed());
        assert!(db.execute(&Sql::new("SELECT 1")).is_err());
    }
}
