use std::fmt::{Display, Formatter};

use crate::changelog::{ChangeSetKey, ExecType};
use crate::errors::{ShiftError, ShiftResult};

/// Why a changeset was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRan,
    ContextMismatch,
    LabelMismatch,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyRan => write!(f, "already ran"),
            SkipReason::ContextMismatch => write!(f, "context does not match"),
            SkipReason::LabelMismatch => write!(f, "labels do not match"),
        }
    }
}

/// The error that stopped a run, and the changeset it happened in when it
/// happened while executing one.
#[derive(Debug, Clone)]
pub struct RunFailure {
    change_set: Option<ChangeSetKey>,
    error: ShiftError,
}

impl RunFailure {
    pub(crate) fn new(change_set: Option<&ChangeSetKey>, error: ShiftError) -> Self {
        RunFailure {
            change_set: change_set.cloned(),
            error,
        }
    }

    pub fn change_set(&self) -> Option<&ChangeSetKey> {
        self.change_set.as_ref()
    }

    pub fn error(&self) -> &ShiftError {
        &self.error
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone)]
pub struct RunReport {
    deployment_id: String,
    applied: Vec<(ChangeSetKey, ExecType)>,
    skipped: Vec<(ChangeSetKey, SkipReason)>,
    failure: Option<RunFailure>,
    lock_released: bool,
}

impl RunReport {
    pub(crate) fn new(deployment_id: &str) -> Self {
        RunReport {
            deployment_id: deployment_id.to_string(),
            applied: Vec::new(),
            skipped: Vec::new(),
            failure: None,
            lock_released: false,
        }
    }

    pub(crate) fn record_applied(&mut self, key: &ChangeSetKey, exec_type: ExecType) {
        self.applied.push((key.clone(), exec_type));
    }

    pub(crate) fn record_skipped(&mut self, key: &ChangeSetKey, reason: SkipReason) {
        self.skipped.push((key.clone(), reason));
    }

    pub(crate) fn record_failure(&mut self, change_set: Option<&ChangeSetKey>, error: ShiftError) {
        self.failure = Some(RunFailure::new(change_set, error));
    }

    pub(crate) fn set_lock_released(&mut self, released: bool) {
        self.lock_released = released;
    }

    /// Identifier shared by every history row this run wrote.
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Changesets handled in this run, in order, with how they were recorded.
    pub fn applied(&self) -> &[(ChangeSetKey, ExecType)] {
        &self.applied
    }

    pub fn applied_keys(&self) -> Vec<&ChangeSetKey> {
        self.applied.iter().map(|(key, _)| key).collect()
    }

    pub fn skipped(&self) -> &[(ChangeSetKey, SkipReason)] {
        &self.skipped
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

    /// The report itself when the run succeeded, otherwise the error that
    /// stopped it.
    pub fn into_result(self) -> ShiftResult<RunReport> {
        match self.failure {
            Some(failure) => Err(failure.error),
            None => Ok(self),
        }
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} applied, {} skipped",
            self.applied.len(),
            self.skipped.len()
        )?;
        if let Some(failure) = &self.failure {
            match &failure.change_set {
                Some(key) => write!(f, ", failed at {}: {}", key, failure.error)?,
                None => write!(f, ", failed: {}", failure.error)?,
            }
        }
        write!(
            f,
            ", lock {}",
            if self.lock_released { "released" } else { "not released" }
        )
    }
}
