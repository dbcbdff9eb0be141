//! The execution engine: applies a changelog under the lock, one changeset
//! per transaction, and reports what happened.
mod engine;
mod report;
mod sink;

pub use engine::*;
pub use report::*;
pub use sink::*;
