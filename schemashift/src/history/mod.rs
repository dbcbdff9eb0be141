//! The change history: which changesets ran, with which checksum, and what
//! a changeset's run status is given that record.
mod history_store;
mod run_status;

pub use history_store::*;
pub use run_status::*;
