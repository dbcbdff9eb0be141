use std::time::Duration;

use crate::errors::{ShiftError, ShiftResult};
use crate::shift::Shift;
use crate::shift_config::ShiftConfig;
use crate::sqlgen::SqlGenerator;
use crate::store::{DatabaseModule, InMemoryModule};

/// Builder for [`Shift`] instances.
///
/// Setters never fail on their own. The first configuration error is kept
/// and returned by [`open`](ShiftBuilder::open).
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::shift::Shift;
/// use std::time::Duration;
///
/// let shift = Shift::builder()
///     .lock_wait_timeout(Duration::from_secs(30))
///     .holder_identity("deployer-1")
///     .open()?;
/// ```
#[derive(Default)]
pub struct ShiftBuilder {
    error: Option<ShiftError>,
    config: ShiftConfig,
}

impl ShiftBuilder {
    pub fn new() -> Self {
        ShiftBuilder {
            error: None,
            config: ShiftConfig::new(),
        }
    }

    /// Sets the store. Without a module an in-memory database is used.
    pub fn load_module<T: DatabaseModule>(self, module: T) -> Self {
        self.apply(|config| config.load_module(module))
    }

    pub fn lock_wait_timeout(self, timeout: Duration) -> Self {
        self.apply(|config| config.set_lock_wait_timeout(timeout))
    }

    pub fn lock_poll_interval(self, interval: Duration) -> Self {
        self.apply(|config| config.set_lock_poll_interval(interval))
    }

    pub fn holder_identity(self, identity: &str) -> Self {
        self.apply(|config| config.set_holder_identity(identity))
    }

    pub fn split_rollback_statements(self, split: bool) -> Self {
        self.apply(|config| config.set_split_rollback_statements(split))
    }

    /// Registers an extra generator candidate after the built-in ones.
    pub fn register_generator(self, generator: SqlGenerator) -> Self {
        self.apply(|config| config.add_generator(generator))
    }

    pub fn open(self) -> ShiftResult<Shift> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.config.database().is_none() {
            self.config.load_module(InMemoryModule::new())?;
        }
        Shift::open(self.config)
    }

    fn apply(mut self, setter: impl FnOnce(&ShiftConfig) -> ShiftResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = setter(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}
