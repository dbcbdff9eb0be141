//! Change operations: the schema mutation primitives a changeset is made of.
//!
//! Operations are plain data. SQL is produced for them by the generator
//! registry in [`crate::sqlgen`], never by the operations themselves.
mod column;
mod object;
mod operation;

pub use column::*;
pub use object::*;
pub use operation::*;
