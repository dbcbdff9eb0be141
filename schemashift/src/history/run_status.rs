use std::fmt::{Display, Formatter};

use crate::changelog::{ChangeSet, RanChangeSet};
use crate::errors::{ErrorKind, ShiftError, ShiftResult};

/// Whether and why a changeset should execute on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotRun,
    AlreadyRun,
    Rerun,
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::NotRun => write!(f, "NOT_RUN"),
            RunStatus::AlreadyRun => write!(f, "ALREADY_RUN"),
            RunStatus::Rerun => write!(f, "RERUN"),
        }
    }
}

/// Result of comparing a changeset with its history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: RunStatus,
    /// The stored checksum is missing and must be written back.
    pub needs_backfill: bool,
}

/// Derives the run status of `change_set` from its history row.
///
/// | history row | stored checksum | run on change | outcome              |
/// |-------------|-----------------|---------------|----------------------|
/// | absent      |                 |               | `NotRun`             |
/// | present     | null or legacy  |               | `AlreadyRun`, backfill |
/// | present     | matches         |               | `AlreadyRun`         |
/// | present     | differs         | yes           | `Rerun`              |
/// | present     | differs         | no            | `ChecksumMismatch` error |
pub fn decide_run_status(change_set: &ChangeSet, ran: Option<&RanChangeSet>) -> ShiftResult<StatusDecision> {
    let Some(ran) = ran else {
        return Ok(StatusDecision {
            status: RunStatus::NotRun,
            needs_backfill: false,
        });
    };

    // a checksum from an older algorithm cannot be compared, it is recomputed
    let stored = match ran.checksum() {
        Some(stored) if stored.is_current() => stored,
        _ => {
            return Ok(StatusDecision {
                status: RunStatus::AlreadyRun,
                needs_backfill: true,
            })
        }
    };

    if change_set.is_checksum_valid(stored)? {
        return Ok(StatusDecision {
            status: RunStatus::AlreadyRun,
            needs_backfill: false,
        });
    }

    if change_set.is_run_on_change() {
        return Ok(StatusDecision {
            status: RunStatus::Rerun,
            needs_backfill: false,
        });
    }

    Err(ShiftError::new(
        &format!(
            "Checksum validation failed: {} was {} but is now {}",
            change_set.key(),
            stored,
            change_set.checksum()?
        ),
        ErrorKind::ChecksumMismatch,
    ))
}
