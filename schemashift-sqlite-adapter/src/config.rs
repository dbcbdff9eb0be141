use schemashift::common::{
    atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_CHANGELOG_TABLE, DEFAULT_LOCK_TABLE,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default time a statement waits on a database locked by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store configuration.
///
/// Cloneable and shared: clones see the same values. Set through
/// [`SqliteModuleBuilder`](crate::SqliteModuleBuilder) before the database
/// is opened.
#[derive(Clone)]
pub struct SqliteConfig {
    inner: Arc<SqliteConfigInner>,
}

impl SqliteConfig {
    #[inline]
    pub fn new() -> SqliteConfig {
        SqliteConfig {
            inner: Arc::new(SqliteConfigInner::new()),
        }
    }

    /// Path of the database file. `:memory:` opens a private in-memory database.
    pub fn db_path(&self) -> String {
        self.inner.db_path.read_with(|it| it.clone())
    }

    pub fn changelog_table(&self) -> String {
        self.inner.changelog_table.read_with(|it| it.clone())
    }

    pub fn lock_table(&self) -> String {
        self.inner.lock_table.read_with(|it| it.clone())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.busy_timeout_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_db_path(&self, path: &str) {
        self.inner.db_path.write_with(|it| *it = path.to_string());
    }

    pub(crate) fn set_changelog_table(&self, table: &str) {
        self.inner
            .changelog_table
            .write_with(|it| *it = table.to_string());
    }

    pub(crate) fn set_lock_table(&self, table: &str) {
        self.inner.lock_table.write_with(|it| *it = table.to_string());
    }

    pub(crate) fn set_busy_timeout(&self, timeout: Duration) {
        self.inner
            .busy_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig::new()
    }
}

struct SqliteConfigInner {
    db_path: Atomic<String>,
    changelog_table: Atomic<String>,
    lock_table: Atomic<String>,
    busy_timeout_ms: AtomicU64,
}

impl SqliteConfigInner {
    fn new() -> Self {
        SqliteConfigInner {
            db_path: atomic(":memory:".to_string()),
            changelog_table: atomic(DEFAULT_CHANGELOG_TABLE.to_string()),
            lock_table: atomic(DEFAULT_LOCK_TABLE.to_string()),
            busy_timeout_ms: AtomicU64::new(DEFAULT_BUSY_TIMEOUT.as_millis() as u64),
        }
    }
}
