//! # Schemashift - Changelog Execution Engine
//!
//! Schemashift applies ordered, identified units of schema change
//! ("changesets") to a relational database, remembers which ones ran, keeps
//! two processes from migrating the same database at once, and reverses
//! applied changes on request.
//!
//! ## Key Features
//!
//! - **Idempotent runs**: a changeset runs once; its checksum detects later edits
//! - **Cross-process lock**: a single row in a lock table, taken with an atomic conditional update
//! - **Dialect-aware SQL**: generator candidates scored by specialization, resolved per dialect
//! - **Atomic changesets**: statements and the history row commit together
//! - **Rollback**: to a tag, a date or a count, with a whole-batch pre-check
//! - **Preview**: render SQL for updates and rollbacks without executing it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schemashift::change::{ChangeOperation, ColumnConfig};
//! use schemashift::changelog::{ChangeSet, RunFilter};
//! use schemashift::rollback::RollbackTarget;
//! use schemashift::shift::Shift;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let shift = Shift::builder().open()?;
//!
//! let changelog = vec![
//!     ChangeSet::new("1", "bob", "db/changelog.yaml").add_operation(ChangeOperation::create_table(
//!         "users",
//!         vec![ColumnConfig::new("id", "INTEGER").primary_key()],
//!     )),
//!     ChangeSet::new("2", "bob", "db/changelog.yaml").add_operation(ChangeOperation::add_column(
//!         "users",
//!         vec![ColumnConfig::new("email", "VARCHAR(255)")],
//!     )),
//! ];
//!
//! shift.update(&changelog, &RunFilter::none())?;
//! shift.rollback(&changelog, &RollbackTarget::Count(1))?;
//! shift.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`change`] - Change operations and their inverses
//! - [`changelog`] - Changesets, checksums, context and label filters, history records
//! - [`common`] - Constants and shared type utilities
//! - [`dialect`] - Database capability descriptors
//! - [`errors`] - Error types and result definitions
//! - [`executor`] - The execution engine and run reports
//! - [`history`] - Change history access and run-status derivation
//! - [`lock`] - The changelog lock coordinator
//! - [`rollback`] - Rollback planning and execution
//! - [`shift`] - The `Shift` entry point
//! - [`shift_builder`] - Builder for `Shift`
//! - [`shift_config`] - Configuration
//! - [`sqlgen`] - Generator candidates and the resolving registry
//! - [`store`] - Store contracts and the in-memory store

pub mod change;
pub mod changelog;
pub mod common;
pub mod dialect;
pub mod errors;
pub mod executor;
pub mod history;
pub mod lock;
pub mod rollback;
pub mod shift;
pub mod shift_builder;
pub mod shift_config;
pub mod sqlgen;
pub mod store;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
