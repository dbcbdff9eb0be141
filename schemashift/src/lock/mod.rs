//! Cross-process mutual exclusion over the change history.
//!
//! The lock is one row in a table owned by the store. Acquisition is an
//! atomic conditional update at the store, so two processes pointed at the
//! same database exclude each other without sharing memory.
mod coordinator;
mod lock_record;

pub use coordinator::*;
pub use lock_record::*;
