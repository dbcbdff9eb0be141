//! Configuration of a [`Shift`](crate::shift::Shift) instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_LOCK_POLL_INTERVAL, DEFAULT_LOCK_WAIT_TIMEOUT};
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::sqlgen::SqlGenerator;
use crate::store::{Database, DatabaseModule};

/// Settings shared by the engine, the rollback planner and the lock
/// coordinator.
///
/// Values can be changed until the owning `Shift` is opened; after that the
/// configuration is frozen and setters return `InvalidOperation`.
#[derive(Clone)]
pub struct ShiftConfig {
    inner: Arc<ShiftConfigInner>,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ShiftConfig {
    pub fn new() -> Self {
        ShiftConfig {
            inner: Arc::new(ShiftConfigInner::new()),
        }
    }

    /// How long a run waits for the changelog lock.
    pub fn lock_wait_timeout(&self) -> Duration {
        self.inner.lock_wait_timeout.read_with(|it| *it)
    }

    pub fn set_lock_wait_timeout(&self, timeout: Duration) -> ShiftResult<()> {
        self.inner.check_mutable("Lock wait timeout")?;
        self.inner.lock_wait_timeout.write_with(|it| *it = timeout);
        Ok(())
    }

    /// Pause between two lock attempts.
    pub fn lock_poll_interval(&self) -> Duration {
        self.inner.lock_poll_interval.read_with(|it| *it)
    }

    pub fn set_lock_poll_interval(&self, interval: Duration) -> ShiftResult<()> {
        self.inner.check_mutable("Lock poll interval")?;
        if interval.is_zero() {
            log::error!("Lock poll interval cannot be zero");
            return Err(ShiftError::new(
                "Lock poll interval cannot be zero",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.lock_poll_interval.write_with(|it| *it = interval);
        Ok(())
    }

    /// Identity written into the lock row while this instance holds it.
    pub fn holder_identity(&self) -> String {
        self.inner.holder_identity.read_with(|it| it.clone())
    }

    pub fn set_holder_identity(&self, identity: &str) -> ShiftResult<()> {
        self.inner.check_mutable("Holder identity")?;
        if identity.trim().is_empty() {
            log::error!("Holder identity cannot be empty");
            return Err(ShiftError::new(
                "Holder identity cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        self.inner
            .holder_identity
            .write_with(|it| *it = identity.trim().to_string());
        Ok(())
    }

    /// Whether literal rollback text is split into separate statements.
    pub fn split_rollback_statements(&self) -> bool {
        self.inner.split_rollback_statements.load(Ordering::Relaxed)
    }

    pub fn set_split_rollback_statements(&self, split: bool) -> ShiftResult<()> {
        self.inner.check_mutable("Rollback statement splitting")?;
        self.inner
            .split_rollback_statements
            .store(split, Ordering::Relaxed);
        Ok(())
    }

    /// Resolves the database from `module`. Only one module can be loaded.
    pub fn load_module<T: DatabaseModule>(&self, module: T) -> ShiftResult<()> {
        self.inner.check_mutable("Database module")?;
        let database = module.database()?;
        self.inner.database.set(database).map_err(|_| {
            log::error!("A database module is already loaded");
            ShiftError::new(
                "A database module is already loaded",
                ErrorKind::InvalidOperation,
            )
        })
    }

    pub fn database(&self) -> Option<Database> {
        self.inner.database.get().cloned()
    }

    /// Adds a generator candidate registered after the built-in ones.
    pub fn add_generator(&self, generator: SqlGenerator) -> ShiftResult<()> {
        self.inner.check_mutable("Generator list")?;
        self.inner.generators.write_with(|it| it.push(generator));
        Ok(())
    }

    pub fn generators(&self) -> Vec<SqlGenerator> {
        self.inner.generators.read_with(|it| it.clone())
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Relaxed)
    }

    pub(crate) fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::Relaxed);
    }
}

struct ShiftConfigInner {
    frozen: AtomicBool,
    lock_wait_timeout: Atomic<Duration>,
    lock_poll_interval: Atomic<Duration>,
    holder_identity: Atomic<String>,
    split_rollback_statements: AtomicBool,
    database: OnceLock<Database>,
    generators: Atomic<Vec<SqlGenerator>>,
}

impl ShiftConfigInner {
    fn new() -> Self {
        ShiftConfigInner {
            frozen: AtomicBool::new(false),
            lock_wait_timeout: atomic(DEFAULT_LOCK_WAIT_TIMEOUT),
            lock_poll_interval: atomic(DEFAULT_LOCK_POLL_INTERVAL),
            holder_identity: atomic(default_holder_identity()),
            split_rollback_statements: AtomicBool::new(true),
            database: OnceLock::new(),
            generators: atomic(Vec::new()),
        }
    }

    fn check_mutable(&self, what: &str) -> ShiftResult<()> {
        if self.frozen.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after opening", what);
            return Err(ShiftError::new(
                &format!("{} cannot be changed after opening", what),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

/// Host name plus a short random suffix, so two processes on one host are
/// told apart in the lock row.
fn default_holder_identity() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{} ({})", host, &suffix[..8])
}
