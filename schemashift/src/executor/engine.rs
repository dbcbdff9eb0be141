use itertools::Itertools;
use uuid::Uuid;

use super::{OutputSink, RunReport, SkipReason};
use crate::changelog::{ChangeSet, ChangeSetKey, ExecType, RunFilter};
use crate::dialect::Dialect;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::history::{ChangeHistoryStore, RunStatus};
use crate::lock::LockCoordinator;
use crate::shift_config::ShiftConfig;
use crate::sqlgen::{Sql, SqlGeneratorRegistry};
use crate::store::Database;

/// What a run does with the changesets that are due.
pub enum RunMode<'s> {
    /// Execute statements and record history.
    Apply,
    /// Render statements to the sink. Nothing is executed or recorded.
    Output(&'s mut dyn OutputSink),
    /// Record due changesets as `MARK_RAN` without executing them.
    MarkRan,
}

impl RunMode<'_> {
    fn is_preview(&self) -> bool {
        matches!(self, RunMode::Output(_))
    }
}

struct PlannedChangeSet<'c> {
    change_set: &'c ChangeSet,
    status: RunStatus,
    skip: Option<SkipReason>,
}

/// Drives a run: lock, status derivation, validation, execution, history.
///
/// Changesets execute strictly in the order given, each in its own
/// transaction together with its history row. The first failure stops the
/// run. The lock is released on every path once it was taken.
pub struct ExecutionEngine<'a> {
    database: &'a Database,
    registry: &'a SqlGeneratorRegistry,
    lock: &'a LockCoordinator,
    config: &'a ShiftConfig,
    history: ChangeHistoryStore,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(
        database: &'a Database,
        registry: &'a SqlGeneratorRegistry,
        lock: &'a LockCoordinator,
        config: &'a ShiftConfig,
    ) -> Self {
        ExecutionEngine {
            database,
            registry,
            lock,
            config,
            history: ChangeHistoryStore::new(database.clone()),
        }
    }

    /// Runs `change_sets` in `mode`.
    ///
    /// # Arguments
    ///
    /// * `change_sets` - The changelog, in execution order
    /// * `filter` - Requested contexts and label expression; no contexts runs
    ///   only unrestricted changesets
    /// * `mode` - Apply, preview into a sink, or mark as ran
    ///
    /// # Returns
    ///
    /// A report of what ran, what was skipped and what failed. Only a lock
    /// timeout is returned as an error, since nothing was touched then.
    pub fn run(
        &self,
        change_sets: &[ChangeSet],
        filter: &RunFilter,
        mut mode: RunMode<'_>,
    ) -> ShiftResult<RunReport> {
        let guard = self.lock.ensure_lock(
            self.config.lock_wait_timeout(),
            self.config.lock_poll_interval(),
        )?;

        let deployment_id = Uuid::new_v4().simple().to_string();
        let mut report = RunReport::new(&deployment_id);
        if let Err(err) = self.run_locked(change_sets, filter, &mut mode, &mut report) {
            log::error!("Run aborted: {}", err);
            report.record_failure(None, err);
        }

        report.set_lock_released(guard.release().is_ok());
        log::info!("Run {} finished: {}", deployment_id, report);
        Ok(report)
    }

    /// Changesets the next run would execute, with their status. Takes no
    /// lock and writes nothing.
    pub fn status(
        &self,
        change_sets: &[ChangeSet],
        filter: &RunFilter,
    ) -> ShiftResult<Vec<(ChangeSetKey, RunStatus)>> {
        self.history.init()?;
        let plan = self.plan(change_sets, filter, false)?;
        Ok(plan
            .into_iter()
            .filter(|it| it.skip.is_none())
            .map(|it| (it.change_set.key().clone(), it.status))
            .collect())
    }

    /// Checks a changelog without running it: duplicate identities, checksum
    /// drift and every due operation against the resolver.
    pub fn validate(&self, change_sets: &[ChangeSet], filter: &RunFilter) -> ShiftResult<()> {
        self.history.init()?;
        let plan = self.plan(change_sets, filter, false)?;
        self.validate_plan(&plan, &self.database.dialect())
    }

    fn run_locked(
        &self,
        change_sets: &[ChangeSet],
        filter: &RunFilter,
        mode: &mut RunMode<'_>,
        report: &mut RunReport,
    ) -> ShiftResult<()> {
        let preview = mode.is_preview();
        self.history.init()?;

        let mut plan = self.plan(change_sets, filter, !preview)?;
        if let RunMode::MarkRan = mode {
            for planned in plan.iter_mut() {
                if planned.skip.is_none() && planned.status == RunStatus::AlreadyRun {
                    planned.skip = Some(SkipReason::AlreadyRan);
                }
            }
        } else {
            self.validate_plan(&plan, &self.database.dialect())?;
        }

        let mut order = self.history.next_order()?;
        for planned in &plan {
            let change_set = planned.change_set;
            if let Some(reason) = planned.skip {
                log::debug!("Skipping {}: {}", change_set, reason);
                report.record_skipped(change_set.key(), reason);
                continue;
            }

            let outcome = match mode {
                RunMode::Apply => self.apply(change_set, planned.status, order, report.deployment_id()),
                RunMode::Output(sink) => self.render(change_set, &mut **sink).map(|_| ExecType::Executed),
                RunMode::MarkRan => self.mark_ran(change_set, planned.status, order, report.deployment_id()),
            };

            match outcome {
                Ok(exec_type) => {
                    report.record_applied(change_set.key(), exec_type);
                    order += 1;
                }
                Err(err) => {
                    log::error!("Changeset {} failed: {}", change_set, err);
                    report.record_failure(Some(change_set.key()), err);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Derives the status of every changeset and decides which ones are due.
    /// A checksum mismatch anywhere fails the whole plan. Missing checksums
    /// are written back only once every changeset has passed, and only when
    /// `backfill` is set.
    fn plan<'c>(
        &self,
        change_sets: &'c [ChangeSet],
        filter: &RunFilter,
        backfill: bool,
    ) -> ShiftResult<Vec<PlannedChangeSet<'c>>> {
        check_duplicates(change_sets)?;

        let ran = self.history.ran_by_key()?;
        let mut plan = Vec::with_capacity(change_sets.len());
        let mut missing_checksums = Vec::new();
        for change_set in change_sets {
            let decision = self
                .history
                .run_status(change_set, ran.get(change_set.key()))?;
            if decision.needs_backfill {
                missing_checksums.push(change_set);
            }

            let status = decision.status;
            let skip = if !change_set.context_expression().matches(filter.contexts()) {
                Some(SkipReason::ContextMismatch)
            } else if !filter.labels().matches(change_set.get_labels()) {
                Some(SkipReason::LabelMismatch)
            } else if status == RunStatus::AlreadyRun && !change_set.is_always_run() {
                Some(SkipReason::AlreadyRan)
            } else {
                None
            };

            plan.push(PlannedChangeSet {
                change_set,
                status,
                skip,
            });
        }

        if backfill {
            self.history.upgrade_legacy_checksums()?;
            for change_set in missing_checksums {
                self.history.backfill_checksum(change_set)?;
            }
        }
        Ok(plan)
    }

    /// Validates every operation of every due changeset and reports all
    /// problems at once.
    fn validate_plan(&self, plan: &[PlannedChangeSet<'_>], dialect: &Dialect) -> ShiftResult<()> {
        let mut unsupported = Vec::new();
        let mut invalid = Vec::new();

        for planned in plan.iter().filter(|it| it.skip.is_none()) {
            let key = planned.change_set.key();
            for operation in planned.change_set.operations() {
                match self.registry.validate(operation, dialect) {
                    Ok(validation) => {
                        for warning in validation.warnings() {
                            log::warn!("{}: {}: {}", key, operation.kind(), warning);
                        }
                        for error in validation.errors() {
                            invalid.push(format!("{}: {}: {}", key, operation.kind(), error));
                        }
                    }
                    Err(err) if err.kind() == &ErrorKind::UnsupportedOperation => {
                        unsupported.push(format!("{}: {}", key, err.message()));
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if !unsupported.is_empty() {
            log::error!("Unsupported operations for {}: {:?}", dialect, unsupported);
            return Err(ShiftError::new(
                &unsupported.join("; "),
                ErrorKind::UnsupportedOperation,
            ));
        }
        if !invalid.is_empty() {
            log::error!("Validation failed with {} errors", invalid.len());
            return Err(ShiftError::new(
                &format!("Validation failed: {}", invalid.join("; ")),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }

    fn generate(&self, change_set: &ChangeSet, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let mut statements = Vec::new();
        for operation in change_set.operations() {
            statements.extend(self.registry.generate(operation, dialect)?);
        }
        Ok(statements)
    }

    /// Executes one changeset and records it in a single transaction.
    fn apply(
        &self,
        change_set: &ChangeSet,
        status: RunStatus,
        order: i64,
        deployment_id: &str,
    ) -> ShiftResult<ExecType> {
        let dialect = self.database.dialect();
        let statements = self.generate(change_set, &dialect)?;
        let exec_type = match status {
            RunStatus::NotRun => ExecType::Executed,
            _ => ExecType::Reran,
        };
        let record = self
            .history
            .record_for(change_set, exec_type, order, deployment_id)?;

        log::info!("Executing changeset {} ({})", change_set, status);
        self.database.begin()?;
        let outcome = (|| -> ShiftResult<()> {
            for sql in &statements {
                log::debug!("Executing: {}", sql);
                self.database.execute(sql)?;
            }
            match status {
                RunStatus::NotRun => self.history.append(&record)?,
                _ => self.history.rewrite(&record)?,
            }
            self.database.commit()
        })();

        match outcome {
            Ok(()) => {
                log::info!("Changeset {} ran successfully", change_set);
                Ok(exec_type)
            }
            Err(err) => {
                if let Err(rollback_err) = self.database.rollback() {
                    log::error!("Could not roll back {}: {}", change_set, rollback_err);
                }
                Err(ShiftError::new_with_cause(
                    &format!("Changeset {} failed: {}", change_set, err.message()),
                    ErrorKind::ExecutionFailure,
                    err,
                ))
            }
        }
    }

    fn render(&self, change_set: &ChangeSet, sink: &mut dyn OutputSink) -> ShiftResult<()> {
        let statements = self.generate(change_set, &self.database.dialect())?;
        sink.append(&format!("-- Changeset {}\n", change_set))?;
        if let Some(comments) = change_set.get_comments() {
            sink.append(&format!("-- {}\n", comments))?;
        }
        for sql in &statements {
            sink.append(&format!("{}\n", sql))?;
        }
        sink.append("\n")
    }

    fn mark_ran(
        &self,
        change_set: &ChangeSet,
        status: RunStatus,
        order: i64,
        deployment_id: &str,
    ) -> ShiftResult<ExecType> {
        let record = self
            .history
            .record_for(change_set, ExecType::MarkRan, order, deployment_id)?;
        log::info!("Marking changeset {} as ran", change_set);
        match status {
            RunStatus::NotRun => self.history.append(&record)?,
            _ => self.history.rewrite(&record)?,
        }
        Ok(ExecType::MarkRan)
    }
}

fn check_duplicates(change_sets: &[ChangeSet]) -> ShiftResult<()> {
    let duplicates = change_sets
        .iter()
        .map(|it| it.key())
        .duplicates()
        .map(|it| it.to_string())
        .collect::<Vec<_>>();
    if duplicates.is_empty() {
        return Ok(());
    }

    log::error!("Duplicate changesets found: {:?}", duplicates);
    Err(ShiftError::new(
        &format!("Duplicate changeset identifiers: {}", duplicates.join(", ")),
        ErrorKind::DuplicateChangeSet,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeOperation, ColumnConfig};
    use crate::changelog::{ContextExpression, Contexts, LabelExpression, Labels, RanChangeSet};
    use crate::executor::StringSink;
    use crate::store::memory::InMemoryDatabase;
    use std::time::Duration;

    struct Fixture {
        memory: InMemoryDatabase,
        database: Database,
        registry: SqlGeneratorRegistry,
        lock: LockCoordinator,
        config: ShiftConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let memory = InMemoryDatabase::default();
            let database = Database::new(memory.clone());
            let config = ShiftConfig::new();
            config.set_lock_wait_timeout(Duration::from_millis(100)).unwrap();
            config.set_lock_poll_interval(Duration::from_millis(10)).unwrap();
            Fixture {
                lock: LockCoordinator::new(database.clone(), "test-runner"),
                memory,
                database,
                registry: SqlGeneratorRegistry::standard(),
                config,
            }
        }

        fn engine(&self) -> ExecutionEngine<'_> {
            ExecutionEngine::new(&self.database, &self.registry, &self.lock, &self.config)
        }

        fn apply(&self, change_sets: &[ChangeSet]) -> RunReport {
            self.engine()
                .run(change_sets, &RunFilter::none(), RunMode::Apply)
                .unwrap()
        }

        fn history(&self) -> Vec<RanChangeSet> {
            ChangeHistoryStore::new(self.database.clone())
                .ran_change_sets()
                .unwrap()
        }
    }

    fn insert(id: &str) -> ChangeSet {
        ChangeSet::new(id, "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql(&format!("INSERT INTO t VALUES ({})", id)))
    }

    #[test]
    fn test_runs_in_order_and_records_history() {
        let fixture = Fixture::new();
        let report = fixture.apply(&[insert("1"), insert("2")]);

        assert!(report.is_success());
        assert!(report.lock_released());
        assert_eq!(
            fixture.memory.executed_statements(),
            vec!["INSERT INTO t VALUES (1)", "INSERT INTO t VALUES (2)"]
        );
        let history = fixture.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key().id(), "1");
        assert_eq!(history[1].key().id(), "2");
        assert_eq!(history[0].exec_type(), ExecType::Executed);
        assert_eq!(history[0].deployment_id(), Some(report.deployment_id()));
        assert!(fixture.lock.list_locks().unwrap().is_none());
    }

    #[test]
    fn test_second_run_is_noop() {
        let fixture = Fixture::new();
        let changelog = [insert("1"), insert("2")];
        fixture.apply(&changelog);
        let second = fixture.apply(&changelog);

        assert!(second.is_success());
        assert!(second.applied().is_empty());
        assert_eq!(second.skipped().len(), 2);
        assert_eq!(fixture.memory.executed_statements().len(), 2);
        assert_eq!(fixture.history().len(), 2);
    }

    #[test]
    fn test_checksum_mismatch_stops_before_any_statement() {
        let fixture = Fixture::new();
        fixture.apply(&[insert("1")]);

        let mutated = ChangeSet::new("1", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql("INSERT INTO t VALUES (100)"));
        let report = fixture.apply(&[mutated, insert("2")]);

        let failure = report.failure().unwrap();
        assert_eq!(failure.error().kind(), &ErrorKind::ChecksumMismatch);
        assert!(report.lock_released());
        assert_eq!(fixture.memory.executed_statements().len(), 1);
        assert_eq!(fixture.history().len(), 1);
    }

    #[test]
    fn test_run_on_change_reruns_and_rewrites() {
        let fixture = Fixture::new();
        fixture.apply(&[insert("1").run_on_change(true)]);

        let changed = ChangeSet::new("1", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql("INSERT INTO t VALUES (100)"))
            .run_on_change(true);
        let report = fixture.apply(&[changed.clone()]);

        assert_eq!(report.applied()[0].1, ExecType::Reran);
        let history = fixture.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].exec_type(), ExecType::Reran);
        assert_eq!(history[0].checksum(), Some(&changed.checksum().unwrap()));
    }

    #[test]
    fn test_always_run_executes_every_time() {
        let fixture = Fixture::new();
        let changelog = [insert("1").always_run(true)];
        fixture.apply(&changelog);
        fixture.apply(&changelog);
        fixture.apply(&changelog);

        assert_eq!(fixture.memory.executed_statements().len(), 3);
        assert_eq!(fixture.history().len(), 1);
    }

    #[test]
    fn test_context_filtering() {
        let fixture = Fixture::new();
        let restricted = insert("1").context(ContextExpression::parse("test").unwrap());
        let changelog = [restricted, insert("2")];

        let report = fixture.apply(&changelog);
        assert_eq!(report.applied().len(), 1);
        assert_eq!(report.skipped()[0].1, SkipReason::ContextMismatch);

        let report = fixture
            .engine()
            .run(&changelog, &RunFilter::new(Contexts::new(["TEST"])), RunMode::Apply)
            .unwrap();
        assert_eq!(report.applied_keys()[0].id(), "1");
        assert_eq!(fixture.history().len(), 2);
    }

    #[test]
    fn test_label_filtering() {
        let fixture = Fixture::new();
        let billing = insert("1").labels(Labels::new(["billing"]));
        let reports = insert("2").labels(Labels::new(["reports"]));
        let changelog = [billing, reports, insert("3")];

        let filter = RunFilter::none().with_labels(LabelExpression::parse("billing").unwrap());
        let report = fixture
            .engine()
            .run(&changelog, &filter, RunMode::Apply)
            .unwrap();
        let applied: Vec<&str> = report.applied().iter().map(|(key, _)| key.id()).collect();
        assert_eq!(applied, vec!["1", "3"]);
        assert_eq!(report.skipped()[0].1, SkipReason::LabelMismatch);

        let filter = RunFilter::none().with_labels(LabelExpression::parse("@reports").unwrap());
        let report = fixture
            .engine()
            .run(&changelog, &filter, RunMode::Apply)
            .unwrap();
        assert_eq!(report.applied_keys()[0].id(), "2");
        assert_eq!(report.applied().len(), 1);
        assert_eq!(fixture.history().len(), 3);
    }

    #[test]
    fn test_failure_rolls_back_changeset_and_stops_run() {
        let fixture = Fixture::new();
        fixture.memory.fail_on("broken");
        let failing = ChangeSet::new("2", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::sql("INSERT INTO t VALUES (20)"))
            .add_operation(ChangeOperation::sql("INSERT INTO broken VALUES (21)"));

        let report = fixture.apply(&[insert("1"), failing, insert("3")]);

        let failure = report.failure().unwrap();
        assert_eq!(failure.change_set().unwrap().id(), "2");
        assert_eq!(failure.error().kind(), &ErrorKind::ExecutionFailure);
        assert_eq!(failure.error().root_cause().kind(), &ErrorKind::BackendError);
        assert!(report.lock_released());

        assert_eq!(
            fixture.memory.executed_statements(),
            vec!["INSERT INTO t VALUES (1)"]
        );
        let history = fixture.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].key().id(), "1");
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_validation_errors_collected_before_execution() {
        let fixture = Fixture::new();
        let invalid_a = ChangeSet::new("2", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::create_table("a", vec![]));
        let invalid_b = ChangeSet::new("3", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::create_table("", vec![ColumnConfig::new("id", "INT")]));

        let report = fixture.apply(&[insert("1"), invalid_a, invalid_b]);
        let error = report.failure().unwrap().error();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
        assert!(error.message().contains("changelog.yaml::2::bob"));
        assert!(error.message().contains("changelog.yaml::3::bob"));
        assert!(fixture.memory.executed_statements().is_empty());
        assert!(fixture.history().is_empty());
    }

    #[test]
    fn test_unsupported_operation_reported() {
        let memory = InMemoryDatabase::new(Dialect::sqlite_version(3, 20));
        let database = Database::new(memory.clone());
        let registry = SqlGeneratorRegistry::standard();
        let lock = LockCoordinator::new(database.clone(), "test-runner");
        let config = ShiftConfig::new();
        let engine = ExecutionEngine::new(&database, &registry, &lock, &config);

        let rename = ChangeSet::new("1", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::rename_column("t", "a", "b", None));
        let report = engine
            .run(&[rename], &RunFilter::none(), RunMode::Apply)
            .unwrap();
        assert_eq!(
            report.failure().unwrap().error().kind(),
            &ErrorKind::UnsupportedOperation
        );
        assert!(memory.executed_statements().is_empty());
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let fixture = Fixture::new();
        let report = fixture.apply(&[insert("1"), insert("1")]);
        assert_eq!(
            report.failure().unwrap().error().kind(),
            &ErrorKind::DuplicateChangeSet
        );
        assert!(fixture.memory.executed_statements().is_empty());
    }

    #[test]
    fn test_preview_renders_without_history() {
        let fixture = Fixture::new();
        let mut sink = StringSink::new();
        let report = fixture
            .engine()
            .run(
                &[insert("1").comments("first row"), insert("2")],
                &RunFilter::none(),
                RunMode::Output(&mut sink),
            )
            .unwrap();

        assert!(report.is_success());
        assert!(report.lock_released());
        let text = sink.into_string();
        assert!(text.contains("-- Changeset changelog.yaml::1::bob\n-- first row\nINSERT INTO t VALUES (1);"));
        assert!(text.contains("INSERT INTO t VALUES (2);"));
        assert!(fixture.memory.executed_statements().is_empty());
        assert!(fixture.history().is_empty());
    }

    #[test]
    fn test_preview_skips_ran_changesets() {
        let fixture = Fixture::new();
        fixture.apply(&[insert("1")]);

        let mut sink = StringSink::new();
        fixture
            .engine()
            .run(&[insert("1"), insert("2")], &RunFilter::none(), RunMode::Output(&mut sink))
            .unwrap();
        assert!(!sink.as_str().contains("VALUES (1)"));
        assert!(sink.as_str().contains("VALUES (2)"));
    }

    #[test]
    fn test_mark_ran_records_without_executing() {
        let fixture = Fixture::new();
        fixture.apply(&[insert("1")]);

        let report = fixture
            .engine()
            .run(&[insert("1"), insert("2")], &RunFilter::none(), RunMode::MarkRan)
            .unwrap();
        assert_eq!(report.applied().len(), 1);
        assert_eq!(fixture.memory.executed_statements().len(), 1);

        let history = fixture.history();
        assert_eq!(history[1].key().id(), "2");
        assert_eq!(history[1].exec_type(), ExecType::MarkRan);
        assert!(fixture.apply(&[insert("1"), insert("2")]).applied().is_empty());
    }

    #[test]
    fn test_null_checksum_backfilled_without_execution() {
        let fixture = Fixture::new();
        let change_set = insert("1");
        fixture.apply(&[]);
        fixture.memory.seed_history(RanChangeSet::new(
            change_set.key().clone(),
            None,
            chrono::Utc::now(),
            1,
            ExecType::Executed,
        ));

        let report = fixture.apply(&[change_set.clone()]);
        assert!(report.applied().is_empty());
        assert!(fixture.memory.executed_statements().is_empty());
        assert_eq!(
            fixture.history()[0].checksum(),
            Some(&change_set.checksum().unwrap())
        );
    }

    #[test]
    fn test_mismatch_later_in_changelog_leaves_null_checksum() {
        let fixture = Fixture::new();
        fixture.apply(&[]);
        let (first, second) = (insert("1"), insert("2"));
        fixture.memory.seed_history(RanChangeSet::new(
            first.key().clone(),
            None,
            chrono::Utc::now(),
            1,
            ExecType::Executed,
        ));
        fixture.memory.seed_history(RanChangeSet::new(
            second.key().clone(),
            Some(insert("99").checksum().unwrap()),
            chrono::Utc::now(),
            2,
            ExecType::Executed,
        ));

        let report = fixture.apply(&[first.clone(), second]);
        let failure = report.failure().unwrap();
        assert_eq!(failure.error().kind(), &ErrorKind::ChecksumMismatch);
        assert!(fixture.memory.executed_statements().is_empty());

        let history = fixture.history();
        assert_eq!(history[0].key(), first.key());
        assert!(history[0].checksum().is_none());
    }

    #[test]
    fn test_lock_timeout_touches_nothing() {
        let fixture = Fixture::new();
        let other = LockCoordinator::new(fixture.database.clone(), "other-node");
        assert!(other.acquire_lock().unwrap());

        let err = fixture
            .engine()
            .run(&[insert("1")], &RunFilter::none(), RunMode::Apply)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::LockTimeout);
        assert!(err.message().contains("other-node"));
        assert!(fixture.memory.executed_statements().is_empty());
        assert_eq!(
            fixture.lock.list_locks().unwrap().unwrap().locked_by(),
            Some("other-node")
        );
    }

    #[test]
    fn test_status_lists_due_changesets() {
        let fixture = Fixture::new();
        fixture.apply(&[insert("1")]);

        let status = fixture
            .engine()
            .status(&[insert("1"), insert("2")], &RunFilter::none())
            .unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].0.id(), "2");
        assert_eq!(status[0].1, RunStatus::NotRun);
        assert!(fixture.lock.list_locks().unwrap().is_none());
    }

    #[test]
    fn test_validate_reports_without_running() {
        let fixture = Fixture::new();
        let invalid = ChangeSet::new("1", "bob", "changelog.yaml")
            .add_operation(ChangeOperation::create_table("a", vec![]));
        let err = fixture
            .engine()
            .validate(&[invalid], &RunFilter::none())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(fixture.engine().validate(&[insert("1")], &RunFilter::none()).is_ok());
    }
}
