use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use super::RollbackTarget;
use crate::changelog::{ChangeSet, ChangeSetKey, RanChangeSet};
use crate::dialect::Dialect;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::executor::{OutputSink, RunFailure};
use crate::history::ChangeHistoryStore;
use crate::lock::LockCoordinator;
use crate::shift_config::ShiftConfig;
use crate::sqlgen::{split_statements, Sql, SqlGeneratorRegistry};
use crate::store::Database;

/// Statements undoing one changeset.
#[derive(Debug, Clone)]
pub struct RollbackStep {
    key: ChangeSetKey,
    statements: Vec<Sql>,
    literal: bool,
}

impl RollbackStep {
    pub fn key(&self) -> &ChangeSetKey {
        &self.key
    }

    pub fn statements(&self) -> &[Sql] {
        &self.statements
    }

    /// Whether the statements come from author-supplied rollback text.
    pub fn is_literal(&self) -> bool {
        self.literal
    }
}

/// Checked rollback of a target, most recent changeset first.
#[derive(Debug, Clone)]
pub struct RollbackPlan {
    target: RollbackTarget,
    steps: Vec<RollbackStep>,
}

impl RollbackPlan {
    pub fn target(&self) -> &RollbackTarget {
        &self.target
    }

    pub fn steps(&self) -> &[RollbackStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of a rollback.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    rolled_back: Vec<ChangeSetKey>,
    failure: Option<RunFailure>,
    lock_released: bool,
}

impl RollbackReport {
    fn new() -> Self {
        RollbackReport {
            rolled_back: Vec::new(),
            failure: None,
            lock_released: false,
        }
    }

    /// Changesets undone (or rendered, in preview), in rollback order.
    pub fn rolled_back(&self) -> &[ChangeSetKey] {
        &self.rolled_back
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn lock_released(&self) -> bool {
        self.lock_released
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(self) -> ShiftResult<RollbackReport> {
        match self.failure {
            Some(failure) => Err(failure.error().clone()),
            None => Ok(self),
        }
    }
}

impl Display for RollbackReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rolled back", self.rolled_back.len())?;
        if let Some(failure) = &self.failure {
            write!(f, ", failed: {}", failure.error())?;
        }
        write!(
            f,
            ", lock {}",
            if self.lock_released { "released" } else { "not released" }
        )
    }
}

/// Plans and executes rollbacks against the change history.
pub struct RollbackPlanner<'a> {
    database: &'a Database,
    registry: &'a SqlGeneratorRegistry,
    lock: &'a LockCoordinator,
    config: &'a ShiftConfig,
    history: ChangeHistoryStore,
}

impl<'a> RollbackPlanner<'a> {
    pub fn new(
        database: &'a Database,
        registry: &'a SqlGeneratorRegistry,
        lock: &'a LockCoordinator,
        config: &'a ShiftConfig,
    ) -> Self {
        RollbackPlanner {
            database,
            registry,
            lock,
            config,
            history: ChangeHistoryStore::new(database.clone()),
        }
    }

    /// Selects the rows `target` names and prepares their rollback
    /// statements. Every selected changeset is checked before the plan is
    /// returned, so a plan is either complete or an error.
    ///
    /// # Errors
    ///
    /// * `RollbackTargetNotFound` - the tag is not in the history
    /// * `NonInvertibleChangeSet` - a selected changeset has no literal
    ///   rollback and an operation without an inverse, or is no longer
    ///   declared by `change_sets`
    pub fn plan(&self, change_sets: &[ChangeSet], target: &RollbackTarget) -> ShiftResult<RollbackPlan> {
        self.history.init()?;
        let rows = self.history.ran_change_sets()?;
        let declared: HashMap<&ChangeSetKey, &ChangeSet> =
            change_sets.iter().map(|it| (it.key(), it)).collect();
        let dialect = self.database.dialect();

        let mut steps = Vec::new();
        let mut problems = Vec::new();

        if let RollbackTarget::Future = target {
            let ran: HashSet<&ChangeSetKey> = rows.iter().map(|it| it.key()).collect();
            for change_set in change_sets.iter().rev().filter(|it| !ran.contains(it.key())) {
                match self.step_for(change_set, &dialect) {
                    Ok(step) => steps.push(step),
                    Err(err) => problems.push(err),
                }
            }
        } else {
            for row in select_rows(&rows, target)?.into_iter().rev() {
                if ChangeHistoryStore::is_tag_marker(row.key()) {
                    steps.push(RollbackStep {
                        key: row.key().clone(),
                        statements: Vec::new(),
                        literal: false,
                    });
                    continue;
                }

                match declared.get(row.key()) {
                    Some(change_set) => match self.step_for(change_set, &dialect) {
                        Ok(step) => steps.push(step),
                        Err(err) => problems.push(err),
                    },
                    None => problems.push(ShiftError::new(
                        &format!(
                            "{} is in the change history but not in the changelog, it cannot be rolled back",
                            row.key()
                        ),
                        ErrorKind::NonInvertibleChangeSet,
                    )),
                }
            }
        }

        if let Some(first) = problems.first() {
            if problems.len() == 1 || problems.iter().any(|it| it.kind() != first.kind()) {
                return Err(first.clone());
            }
            let messages: Vec<&str> = problems.iter().map(|it| it.message()).collect();
            return Err(ShiftError::new(&messages.join("; "), first.kind().clone()));
        }

        log::debug!("Rollback to {} has {} steps", target, steps.len());
        Ok(RollbackPlan {
            target: target.clone(),
            steps,
        })
    }

    /// Rolls back to `target` under the lock.
    pub fn rollback(&self, change_sets: &[ChangeSet], target: &RollbackTarget) -> ShiftResult<RollbackReport> {
        if let RollbackTarget::Future = target {
            return Err(ShiftError::new(
                "Future rollback can only be previewed",
                ErrorKind::InvalidOperation,
            ));
        }
        self.run(change_sets, target, None)
    }

    /// Renders the rollback of `target` into `sink` under the lock, without
    /// executing it or touching history.
    pub fn preview(
        &self,
        change_sets: &[ChangeSet],
        target: &RollbackTarget,
        sink: &mut dyn OutputSink,
    ) -> ShiftResult<RollbackReport> {
        self.run(change_sets, target, Some(sink))
    }

    fn run(
        &self,
        change_sets: &[ChangeSet],
        target: &RollbackTarget,
        sink: Option<&mut dyn OutputSink>,
    ) -> ShiftResult<RollbackReport> {
        let guard = self.lock.ensure_lock(
            self.config.lock_wait_timeout(),
            self.config.lock_poll_interval(),
        )?;

        log::info!("Rolling back to {}", target);
        let mut report = RollbackReport::new();
        match self.plan(change_sets, target) {
            Ok(plan) => self.execute_plan(&plan, sink, &mut report),
            Err(err) => {
                log::error!("Rollback to {} refused: {}", target, err);
                report.failure = Some(RunFailure::new(None, err));
            }
        }

        report.lock_released = guard.release().is_ok();
        log::info!("Rollback to {} finished: {}", target, report);
        Ok(report)
    }

    fn execute_plan(&self, plan: &RollbackPlan, mut sink: Option<&mut dyn OutputSink>, report: &mut RollbackReport) {
        for step in plan.steps() {
            let outcome = match sink.as_deref_mut() {
                Some(sink) => render(step, sink),
                None => self.execute_step(step),
            };
            match outcome {
                Ok(()) => report.rolled_back.push(step.key.clone()),
                Err(err) => {
                    log::error!("Rollback of {} failed: {}", step.key, err);
                    report.failure = Some(RunFailure::new(Some(&step.key), err));
                    return;
                }
            }
        }
    }

    fn execute_step(&self, step: &RollbackStep) -> ShiftResult<()> {
        log::info!("Rolling back changeset {}", step.key);
        self.database.begin()?;
        let outcome = (|| -> ShiftResult<()> {
            for sql in &step.statements {
                log::debug!("Executing: {}", sql);
                self.database.execute(sql)?;
            }
            self.history.delete(&step.key)?;
            self.database.commit()
        })();

        if let Err(err) = outcome {
            if let Err(rollback_err) = self.database.rollback() {
                log::error!("Could not roll back transaction for {}: {}", step.key, rollback_err);
            }
            return Err(ShiftError::new_with_cause(
                &format!("Rollback of {} failed: {}", step.key, err.message()),
                ErrorKind::ExecutionFailure,
                err,
            ));
        }
        Ok(())
    }

    /// Literal rollback text wins over derived inverses.
    fn step_for(&self, change_set: &ChangeSet, dialect: &Dialect) -> ShiftResult<RollbackStep> {
        if let Some(text) = change_set.rollback_text() {
            let delimiter = dialect.statement_delimiter();
            let statements = if self.config.split_rollback_statements() {
                split_statements(text)
                    .iter()
                    .map(|it| Sql::new(it).with_end_delimiter(delimiter))
                    .collect()
            } else {
                vec![Sql::new(text).with_end_delimiter(delimiter)]
            };
            return Ok(RollbackStep {
                key: change_set.key().clone(),
                statements,
                literal: true,
            });
        }

        let mut statements = Vec::new();
        for operation in change_set.operations().iter().rev() {
            let generated = self
                .registry
                .generate_rollback(operation, dialect)
                .map_err(|err| {
                    ShiftError::new_with_cause(
                        &format!("{} cannot be rolled back: {}", change_set, err.message()),
                        err.kind().clone(),
                        err,
                    )
                })?;
            statements.extend(generated);
        }
        Ok(RollbackStep {
            key: change_set.key().clone(),
            statements,
            literal: false,
        })
    }
}

fn select_rows<'r>(rows: &'r [RanChangeSet], target: &RollbackTarget) -> ShiftResult<&'r [RanChangeSet]> {
    match target {
        RollbackTarget::Tag(tag) => match rows.iter().rposition(|it| it.tag() == Some(tag.as_str())) {
            Some(index) => Ok(&rows[index + 1..]),
            None => {
                log::error!("Could not find tag '{}' in the change history", tag);
                Err(ShiftError::new(
                    &format!("Could not find tag '{}' in the change history", tag),
                    ErrorKind::RollbackTargetNotFound,
                ))
            }
        },
        RollbackTarget::Date(date) => {
            let first = rows
                .iter()
                .position(|it| it.executed_at() > *date)
                .unwrap_or(rows.len());
            Ok(&rows[first..])
        }
        RollbackTarget::Count(count) => Ok(&rows[rows.len().saturating_sub(*count)..]),
        RollbackTarget::Future => Ok(&[]),
    }
}

fn render(step: &RollbackStep, sink: &mut dyn OutputSink) -> ShiftResult<()> {
    sink.append(&format!("-- Rolling back changeset {}\n", step.key))?;
    for sql in &step.statements {
        sink.append(&format!("{}\n", sql))?;
    }
    sink.append("\n")
}
