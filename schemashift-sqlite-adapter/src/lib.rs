//! SQLite adapter for schemashift.
//!
//! Keeps the change history and the changelog lock in two ordinary tables of
//! the target database and runs changeset statements over one connection.
//!
//! ```rust,ignore
//! use schemashift::shift::Shift;
//! use schemashift_sqlite_adapter::SqliteModule;
//!
//! let module = SqliteModule::with_config().db_path("app.db").build();
//! let shift = Shift::builder().load_module(module).open()?;
//! ```
mod config;
mod database;
mod module;
mod wrapper;

pub use config::*;
pub use database::*;
pub use module::*;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
