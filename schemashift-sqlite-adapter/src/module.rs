use crate::config::SqliteConfig;
use crate::database::SqliteDatabase;
use schemashift::errors::{ErrorKind, ShiftError, ShiftResult};
use schemashift::store::{Database, DatabaseModule};
use std::time::Duration;

/// Module opening a [`SqliteDatabase`] for a [`Shift`](schemashift::shift::Shift).
///
/// ```rust,ignore
/// let module = SqliteModule::with_config()
///     .db_path("app.db")
///     .changelog_table("SCHEMA_HISTORY")
///     .busy_timeout(Duration::from_secs(1))
///     .build();
/// ```
pub struct SqliteModule {
    store_config: SqliteConfig,
}

impl SqliteModule {
    #[inline]
    pub fn with_config() -> SqliteModuleBuilder {
        SqliteModuleBuilder::new()
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.store_config
    }
}

impl DatabaseModule for SqliteModule {
    fn database(&self) -> ShiftResult<Database> {
        check_table_name(&self.store_config.changelog_table())?;
        check_table_name(&self.store_config.lock_table())?;
        if self.store_config.changelog_table() == self.store_config.lock_table() {
            return Err(ShiftError::new(
                "Change history and lock tables must have different names",
                ErrorKind::ValidationError,
            ));
        }

        let database = SqliteDatabase::open(self.store_config.clone())?;
        Ok(Database::new(database))
    }
}

pub struct SqliteModuleBuilder {
    store_config: SqliteConfig,
}

impl SqliteModuleBuilder {
    #[inline]
    pub fn new() -> SqliteModuleBuilder {
        SqliteModuleBuilder {
            store_config: SqliteConfig::new(),
        }
    }

    pub fn db_path(self, path: &str) -> Self {
        self.store_config.set_db_path(path);
        self
    }

    pub fn changelog_table(self, table: &str) -> Self {
        self.store_config.set_changelog_table(table);
        self
    }

    pub fn lock_table(self, table: &str) -> Self {
        self.store_config.set_lock_table(table);
        self
    }

    /// How long a statement waits while another connection holds the
    /// database write lock.
    pub fn busy_timeout(self, timeout: Duration) -> Self {
        self.store_config.set_busy_timeout(timeout);
        self
    }

    pub fn build(self) -> SqliteModule {
        SqliteModule {
            store_config: self.store_config,
        }
    }
}

impl Default for SqliteModuleBuilder {
    fn default() -> Self {
        SqliteModuleBuilder::new()
    }
}

// Table names are interpolated into statements, so only plain identifiers pass.
fn check_table_name(name: &str) -> ShiftResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        log::error!("Rejected table name '{}'", name);
        Err(ShiftError::new(
            &format!("'{}' is not a valid table name", name),
            ErrorKind::ValidationError,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemashift::store::ConnectionProvider;

    #[test]
    fn test_builder_sets_config() {
        let module = SqliteModule::with_config()
            .db_path(":memory:")
            .changelog_table("SCHEMA_HISTORY")
            .lock_table("SCHEMA_LOCK")
            .busy_timeout(Duration::from_millis(100))
            .build();

        assert_eq!(module.config().changelog_table(), "SCHEMA_HISTORY");
        assert_eq!(module.config().lock_table(), "SCHEMA_LOCK");
        assert_eq!(module.config().busy_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_in_memory_module_opens() {
        let module = SqliteModule::with_config().build();
        let database = module.database().unwrap();
        assert_eq!(database.dialect().short_name(), "sqlite");
        database.close().unwrap();
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let module = SqliteModule::with_config()
            .changelog_table("history; DROP TABLE users")
            .build();
        let err = module.database().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_same_table_names_are_rejected() {
        let module = SqliteModule::with_config()
            .changelog_table("T")
            .lock_table("T")
            .build();
        assert!(module.database().is_err());
    }
}
