use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::LockRecord;
use crate::common::LOCK_INIT_ATTEMPTS;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::store::Database;

/// Takes and releases the changelog lock on behalf of one holder identity.
///
/// Every acquisition goes through the store's conditional update, including
/// a second run on the same coordinator. `has_lock` only mirrors the last
/// outcome for callers that want to observe it. There is no stale lock
/// detection. A lock left behind by a crashed process stays until
/// [`force_release_lock`](LockCoordinator::force_release_lock) is called.
pub struct LockCoordinator {
    database: Database,
    holder: String,
    has_lock: AtomicBool,
}

impl LockCoordinator {
    pub fn new(database: Database, holder: &str) -> Self {
        LockCoordinator {
            database,
            holder: holder.to_string(),
            has_lock: AtomicBool::new(false),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn has_lock(&self) -> bool {
        self.has_lock.load(Ordering::Acquire)
    }

    /// Creates the lock table if needed. Concurrent creators can collide,
    /// so failures are retried after a short random pause.
    fn init(&self) -> ShiftResult<()> {
        let mut attempt = 1;
        loop {
            match self.database.init_lock() {
                Ok(()) => return Ok(()),
                Err(err) if attempt < LOCK_INIT_ATTEMPTS => {
                    log::debug!(
                        "Lock table initialization attempt {} failed: {}",
                        attempt,
                        err
                    );
                    let pause = rand::thread_rng().gen_range(50..500);
                    thread::sleep(Duration::from_millis(pause));
                    attempt += 1;
                }
                Err(err) => {
                    log::error!("Could not initialize the lock table: {}", err);
                    return Err(ShiftError::new_with_cause(
                        "Could not initialize the lock table",
                        ErrorKind::LockError,
                        err,
                    ));
                }
            }
        }
    }

    /// Makes one attempt to take the lock. A lock already held, even under
    /// this coordinator's own holder name, is not granted again.
    pub fn acquire_lock(&self) -> ShiftResult<bool> {
        self.init()?;

        let acquired = self.database.try_acquire(&self.holder, Utc::now())?;
        if acquired {
            self.has_lock.store(true, Ordering::Release);
            log::info!("Successfully acquired change log lock for {}", self.holder);
        }
        Ok(acquired)
    }

    /// Polls for the lock until it is granted or `timeout` elapses.
    ///
    /// # Arguments
    ///
    /// * `timeout` - How long to keep trying
    /// * `poll_interval` - Pause between attempts
    ///
    /// # Returns
    ///
    /// `true` once the lock is held, `false` when the timeout elapsed first.
    pub fn wait_for_lock(&self, timeout: Duration, poll_interval: Duration) -> ShiftResult<bool> {
        let give_up_at = Instant::now() + timeout;
        loop {
            if self.acquire_lock()? {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= give_up_at {
                return Ok(false);
            }

            let holder = self.list_locks()?;
            log::info!(
                "Waiting for changelog lock, currently {}",
                holder.map(|it| it.to_string()).unwrap_or_else(|| "unlocked".to_string())
            );
            thread::sleep(poll_interval.min(give_up_at - now));
        }
    }

    /// Like [`wait_for_lock`](LockCoordinator::wait_for_lock) but turns a
    /// timeout into a `LockTimeout` error naming the current holder.
    ///
    /// The returned guard releases the lock when dropped, unless released
    /// explicitly first. Only a caller that was granted the lock gets one.
    pub fn ensure_lock(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> ShiftResult<LockGuard<'_>> {
        if self.wait_for_lock(timeout, poll_interval)? {
            return Ok(LockGuard {
                coordinator: self,
                released: false,
            });
        }

        let current = self.list_locks()?;
        let (holder, since) = match &current {
            Some(record) => (
                record.locked_by().unwrap_or("UNKNOWN").to_string(),
                record
                    .granted_at()
                    .map(|it| it.to_rfc3339())
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
            ),
            None => ("UNKNOWN".to_string(), "UNKNOWN".to_string()),
        };
        log::error!("Could not acquire change log lock within {:?}", timeout);
        Err(ShiftError::new(
            &format!(
                "Could not acquire change log lock. Currently locked by {} since {}",
                holder, since
            ),
            ErrorKind::LockTimeout,
        ))
    }

    /// Resets the lock row regardless of who holds it.
    pub fn release_lock(&self) -> ShiftResult<()> {
        self.database.release().map_err(|err| {
            log::error!("Failed to release change log lock: {}", err);
            ShiftError::new_with_cause(
                "Failed to release change log lock",
                ErrorKind::LockError,
                err,
            )
        })?;
        self.has_lock.store(false, Ordering::Release);
        log::info!("Successfully released change log lock");
        Ok(())
    }

    /// Manual recovery for a lock abandoned by a crashed process.
    pub fn force_release_lock(&self) -> ShiftResult<()> {
        self.init()?;
        if let Some(record) = self.list_locks()? {
            log::warn!("Forcibly releasing change log lock ({})", record);
        }
        self.release_lock()
    }

    /// The current holder, if the lock is taken.
    pub fn list_locks(&self) -> ShiftResult<Option<LockRecord>> {
        Ok(self
            .database
            .current_lock()?
            .filter(|it| it.is_locked()))
    }
}

/// Releases the lock on every exit path, including unwinding.
pub struct LockGuard<'a> {
    coordinator: &'a LockCoordinator,
    released: bool,
}

impl LockGuard<'_> {
    pub fn release(mut self) -> ShiftResult<()> {
        self.released = true;
        self.coordinator.release_lock()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.coordinator.release_lock() {
                log::error!("Lock release on drop failed: {}", err);
            }
        }
    }
}
