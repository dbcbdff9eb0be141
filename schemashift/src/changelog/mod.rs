//! Changelog data model: changesets as handed over by a changelog parser,
//! their checksums, the context and label filters of a run, and the history
//! records written for them once they have run.
mod change_set;
mod checksum;
mod context;
mod filter;
mod labels;
mod ran_change_set;

pub use change_set::*;
pub use checksum::*;
pub use context::*;
pub use filter::*;
pub use labels::*;
pub use ran_change_set::*;
