use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::changelog::{ChangeSet, ChangeSetKey, RanChangeSet, RunFilter};
use crate::dialect::Dialect;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::executor::{ExecutionEngine, OutputSink, RunMode, RunReport};
use crate::history::{ChangeHistoryStore, RunStatus};
use crate::lock::{LockCoordinator, LockRecord};
use crate::rollback::{RollbackPlan, RollbackPlanner, RollbackReport, RollbackTarget};
use crate::shift_builder::ShiftBuilder;
use crate::shift_config::ShiftConfig;
use crate::sqlgen::SqlGeneratorRegistry;
use crate::store::Database;

/// Entry point: applies, previews and rolls back changelogs against one
/// database.
///
/// Clones share the same database, registry and lock coordinator.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::change::{ChangeOperation, ColumnConfig};
/// use schemashift::changelog::{ChangeSet, RunFilter};
/// use schemashift::shift::Shift;
///
/// let shift = Shift::builder().open()?;
/// let changelog = vec![ChangeSet::new("1", "bob", "db/changelog.yaml").add_operation(
///     ChangeOperation::create_table("users", vec![ColumnConfig::new("id", "INT").primary_key()]),
/// )];
/// let report = shift.update(&changelog, &RunFilter::none())?;
/// assert_eq!(report.applied().len(), 1);
/// ```
#[derive(Clone)]
pub struct Shift {
    inner: Arc<ShiftInner>,
}

impl Shift {
    pub fn builder() -> ShiftBuilder {
        ShiftBuilder::new()
    }

    pub(crate) fn open(config: ShiftConfig) -> ShiftResult<Shift> {
        let database = config.database().ok_or_else(|| {
            ShiftError::new("No database module loaded", ErrorKind::InvalidOperation)
        })?;

        let mut registry = SqlGeneratorRegistry::standard();
        for generator in config.generators() {
            registry.register(generator);
        }
        config.freeze();

        let lock = LockCoordinator::new(database.clone(), &config.holder_identity());
        let shift = Shift {
            inner: Arc::new(ShiftInner {
                history: ChangeHistoryStore::new(database.clone()),
                database,
                registry,
                lock,
                config,
                closed: AtomicBool::new(false),
            }),
        };

        if let Err(err) = shift.inner.history.init() {
            log::error!("Failed to initialize the change history: {}", err);
            let _ = shift.inner.database.close();
            return Err(ShiftError::new_with_cause(
                "Failed to initialize the change history",
                ErrorKind::BackendError,
                err,
            ));
        }
        log::info!(
            "Opened schemashift on {} as {}",
            shift.inner.database.dialect(),
            shift.inner.lock.holder()
        );
        Ok(shift)
    }

    /// Applies every due changeset.
    ///
    /// # Errors
    ///
    /// The error that stopped the run. Changesets before the failing one
    /// stay applied and recorded.
    pub fn update(&self, change_sets: &[ChangeSet], filter: &RunFilter) -> ShiftResult<RunReport> {
        self.inner.check_open()?;
        self.inner
            .engine()
            .run(change_sets, filter, RunMode::Apply)?
            .into_result()
    }

    /// Renders the SQL `update` would execute into `sink`.
    pub fn update_sql(
        &self,
        change_sets: &[ChangeSet],
        filter: &RunFilter,
        sink: &mut dyn OutputSink,
    ) -> ShiftResult<RunReport> {
        self.inner.check_open()?;
        self.inner
            .engine()
            .run(change_sets, filter, RunMode::Output(sink))?
            .into_result()
    }

    /// Records every due changeset as ran without executing it.
    pub fn changelog_sync(&self, change_sets: &[ChangeSet], filter: &RunFilter) -> ShiftResult<RunReport> {
        self.inner.check_open()?;
        self.inner
            .engine()
            .run(change_sets, filter, RunMode::MarkRan)?
            .into_result()
    }

    /// Changesets the next `update` would run.
    pub fn status(
        &self,
        change_sets: &[ChangeSet],
        filter: &RunFilter,
    ) -> ShiftResult<Vec<(ChangeSetKey, RunStatus)>> {
        self.inner.check_open()?;
        self.inner.engine().status(change_sets, filter)
    }

    pub fn validate(&self, change_sets: &[ChangeSet], filter: &RunFilter) -> ShiftResult<()> {
        self.inner.check_open()?;
        self.inner.engine().validate(change_sets, filter)
    }

    /// Checks and returns the rollback of `target` without running it.
    pub fn rollback_plan(&self, change_sets: &[ChangeSet], target: &RollbackTarget) -> ShiftResult<RollbackPlan> {
        self.inner.check_open()?;
        self.inner.planner().plan(change_sets, target)
    }

    pub fn rollback(&self, change_sets: &[ChangeSet], target: &RollbackTarget) -> ShiftResult<RollbackReport> {
        self.inner.check_open()?;
        self.inner.planner().rollback(change_sets, target)?.into_result()
    }

    /// Renders the rollback of `target` into `sink`.
    pub fn rollback_sql(
        &self,
        change_sets: &[ChangeSet],
        target: &RollbackTarget,
        sink: &mut dyn OutputSink,
    ) -> ShiftResult<RollbackReport> {
        self.inner.check_open()?;
        self.inner
            .planner()
            .preview(change_sets, target, sink)?
            .into_result()
    }

    /// Tags the most recently applied changeset.
    pub fn tag(&self, tag: &str) -> ShiftResult<()> {
        self.inner.check_open()?;
        self.inner.with_lock(|| self.inner.history.tag(tag))
    }

    pub fn tag_exists(&self, tag: &str) -> ShiftResult<bool> {
        self.inner.check_open()?;
        self.inner.history.tag_exists(tag)
    }

    /// The change history, oldest first.
    pub fn history(&self) -> ShiftResult<Vec<RanChangeSet>> {
        self.inner.check_open()?;
        self.inner.history.ran_change_sets()
    }

    /// Nulls every stored checksum; the next run recomputes them.
    pub fn clear_checksums(&self) -> ShiftResult<()> {
        self.inner.check_open()?;
        self.inner.with_lock(|| self.inner.history.clear_checksums())
    }

    /// The current lock holder, if any.
    pub fn list_locks(&self) -> ShiftResult<Option<LockRecord>> {
        self.inner.check_open()?;
        self.inner.lock.list_locks()
    }

    /// Releases the lock whoever holds it. The only way to recover from a
    /// lock left behind by a crashed process.
    pub fn release_locks(&self) -> ShiftResult<()> {
        self.inner.check_open()?;
        self.inner.lock.force_release_lock()
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.database.dialect()
    }

    pub fn registry(&self) -> &SqlGeneratorRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ShiftConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    pub fn close(&self) -> ShiftResult<()> {
        if self.inner.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        log::info!("Closing schemashift");
        self.inner.database.close()
    }
}

struct ShiftInner {
    config: ShiftConfig,
    database: Database,
    registry: SqlGeneratorRegistry,
    lock: LockCoordinator,
    history: ChangeHistoryStore,
    closed: AtomicBool,
}

impl ShiftInner {
    fn engine(&self) -> ExecutionEngine<'_> {
        ExecutionEngine::new(&self.database, &self.registry, &self.lock, &self.config)
    }

    fn planner(&self) -> RollbackPlanner<'_> {
        RollbackPlanner::new(&self.database, &self.registry, &self.lock, &self.config)
    }

    fn check_open(&self) -> ShiftResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(ShiftError::new(
                "Schemashift is closed",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn with_lock<T>(&self, action: impl FnOnce() -> ShiftResult<T>) -> ShiftResult<T> {
        let guard = self.lock.ensure_lock(
            self.config.lock_wait_timeout(),
            self.config.lock_poll_interval(),
        )?;
        let result = action();
        guard.release()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeOperation, ColumnConfig, OperationKind};
    use crate::common::PRIORITY_DATABASE;
    use crate::executor::StringSink;
    use crate::sqlgen::{Sql, SqlGenerator, SqlGeneratorProvider, ValidationErrors};
    use crate::store::memory::InMemoryDatabase;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    /// Renders raw SQL slowly and records how many renders overlap.
    #[derive(Default)]
    struct SlowSqlGenerator {
        inside: AtomicUsize,
        max_inside: AtomicUsize,
        total: AtomicUsize,
    }

    impl SqlGeneratorProvider for Arc<SlowSqlGenerator> {
        fn name(&self) -> &str {
            "slow-sql"
        }

        fn operation_kind(&self) -> OperationKind {
            OperationKind::RawSql
        }

        fn priority(&self) -> i32 {
            PRIORITY_DATABASE
        }

        fn supports(&self, _dialect: &Dialect) -> bool {
            true
        }

        fn validate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
            ValidationErrors::new()
        }

        fn generate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inside.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
            self.inside.fetch_sub(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Sql::new("SELECT 1")])
        }
    }

    fn create_table(id: &str, table: &str) -> ChangeSet {
        ChangeSet::new(id, "bob", "changelog.yaml").add_operation(ChangeOperation::create_table(
            table,
            vec![ColumnConfig::new("id", "INT").primary_key()],
        ))
    }

    #[test]
    fn test_update_and_history() {
        let shift = Shift::builder().open().unwrap();
        let changelog = [create_table("1", "a"), create_table("2", "b")];
        let report = shift.update(&changelog, &RunFilter::none()).unwrap();
        assert_eq!(report.applied().len(), 2);
        assert_eq!(shift.history().unwrap().len(), 2);
        assert!(shift.status(&changelog, &RunFilter::none()).unwrap().is_empty());
    }

    #[test]
    fn test_update_error_surfaces() {
        let shift = Shift::builder().open().unwrap();
        shift.update(&[create_table("1", "a")], &RunFilter::none()).unwrap();

        let changed = create_table("1", "renamed");
        let err = shift.update(&[changed], &RunFilter::none()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ChecksumMismatch);
        assert!(shift.list_locks().unwrap().is_none());
    }

    #[test]
    fn test_tag_and_rollback() {
        let shift = Shift::builder().open().unwrap();
        shift.update(&[create_table("1", "a")], &RunFilter::none()).unwrap();
        shift.tag("v1").unwrap();
        assert!(shift.tag_exists("v1").unwrap());

        let changelog = [create_table("1", "a"), create_table("2", "b")];
        shift.update(&changelog, &RunFilter::none()).unwrap();

        let mut sink = StringSink::new();
        shift
            .rollback_sql(&changelog, &RollbackTarget::Tag("v1".to_string()), &mut sink)
            .unwrap();
        assert_eq!(sink.as_str().matches("DROP TABLE").count(), 1);

        let report = shift
            .rollback(&changelog, &RollbackTarget::Tag("v1".to_string()))
            .unwrap();
        assert_eq!(report.rolled_back().len(), 1);
        assert_eq!(shift.history().unwrap().len(), 1);
    }

    #[test]
    fn test_update_sql_and_sync() {
        let shift = Shift::builder().open().unwrap();
        let changelog = [create_table("1", "a")];
        let mut sink = StringSink::new();
        shift
            .update_sql(&changelog, &RunFilter::none(), &mut sink)
            .unwrap();
        assert!(sink.as_str().contains("CREATE TABLE a"));
        assert!(shift.history().unwrap().is_empty());

        shift.changelog_sync(&changelog, &RunFilter::none()).unwrap();
        assert_eq!(shift.history().unwrap().len(), 1);
        assert!(shift.update(&changelog, &RunFilter::none()).unwrap().applied().is_empty());
    }

    #[test]
    fn test_release_locks_recovers_abandoned_lock() {
        let memory = InMemoryDatabase::default();
        let shift = Shift::builder()
            .load_module(memory.clone())
            .lock_wait_timeout(Duration::from_millis(50))
            .lock_poll_interval(Duration::from_millis(10))
            .open()
            .unwrap();
        let crashed = LockCoordinator::new(Database::new(memory), "crashed-node");
        crashed.acquire_lock().unwrap();

        let err = shift
            .update(&[create_table("1", "a")], &RunFilter::none())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::LockTimeout);

        assert_eq!(
            shift.list_locks().unwrap().unwrap().locked_by(),
            Some("crashed-node")
        );
        shift.release_locks().unwrap();
        shift.update(&[create_table("1", "a")], &RunFilter::none()).unwrap();
    }

    #[test]
    fn test_clones_never_run_together() {
        let slow = Arc::new(SlowSqlGenerator::default());
        let shift = Shift::builder()
            .register_generator(SqlGenerator::new(slow.clone()))
            .lock_wait_timeout(Duration::from_secs(10))
            .lock_poll_interval(Duration::from_millis(10))
            .open()
            .unwrap();
        let first = ChangeSet::new("1", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql("SELECT 1"));
        let second = ChangeSet::new("2", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql("SELECT 2"));

        let a = {
            let shift = shift.clone();
            let changelog = vec![first.clone()];
            thread::spawn(move || shift.update(&changelog, &RunFilter::none()))
        };
        awaitility::at_most(Duration::from_secs(5))
            .until(|| slow.inside.load(Ordering::SeqCst) == 1);
        let b = {
            let shift = shift.clone();
            let changelog = vec![first, second];
            thread::spawn(move || shift.update(&changelog, &RunFilter::none()))
        };

        let a = a.join().unwrap().unwrap();
        let b = b.join().unwrap().unwrap();
        assert_eq!(a.applied().len(), 1);
        assert_eq!(b.applied().len(), 1);
        assert!(a.lock_released() && b.lock_released());
        assert_eq!(slow.total.load(Ordering::SeqCst), 2);
        assert_eq!(slow.max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(shift.history().unwrap().len(), 2);
        assert!(shift.list_locks().unwrap().is_none());
    }

    #[test]
    fn test_clear_checksums_then_backfill() {
        let shift = Shift::builder().open().unwrap();
        let changelog = [create_table("1", "a")];
        shift.update(&changelog, &RunFilter::none()).unwrap();
        shift.clear_checksums().unwrap();
        assert!(shift.history().unwrap()[0].checksum().is_none());

        shift.update(&changelog, &RunFilter::none()).unwrap();
        assert!(shift.history().unwrap()[0].checksum().is_some());
    }

    #[test]
    fn test_closed_refuses_work() {
        let shift = Shift::builder().open().unwrap();
        shift.close().unwrap();
        assert!(shift.is_closed());
        let err = shift.history().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(shift.close().is_ok());
    }

    #[test]
    fn test_registry_holds_standard_generators() {
        let shift = Shift::builder().open().unwrap();
        let standard = SqlGeneratorRegistry::standard().generators().len();
        assert_eq!(shift.registry().generators().len(), standard);
    }
}
