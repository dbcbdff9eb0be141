//! Statement generation: turning change operations into dialect SQL.
//!
//! Generators are registered as candidates into a [`SqlGeneratorRegistry`].
//! For an `(operation, dialect)` pair the registry keeps the candidates of
//! the operation's kind whose dialect predicate holds and picks the highest
//! specialization score, the earliest registration winning ties.
mod generator;
pub mod generators;
mod registry;
mod sql;
mod validation;

pub use generator::*;
pub use registry::*;
pub use sql::*;
pub use validation::*;
