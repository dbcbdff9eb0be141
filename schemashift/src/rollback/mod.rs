//! Reversal of applied changesets.
//!
//! The planner selects history rows for a target, derives or reads the
//! rollback statements for each and checks the whole batch before anything
//! runs. Each changeset is then undone in its own transaction together with
//! the deletion of its history row.
mod planner;
mod target;

pub use planner::*;
pub use target::*;
