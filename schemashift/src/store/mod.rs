//! Store contracts consumed by the engine and the in-memory implementation.
//!
//! A backing store implements three provider traits: statement execution
//! with transaction control, the change history, and the single-row lock.
//! [`Database`] bundles an implementation of all three behind one handle.
mod database;
mod database_module;
pub mod memory;

pub use database::*;
pub use database_module::*;
