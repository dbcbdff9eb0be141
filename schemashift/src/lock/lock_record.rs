use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// The lock table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    locked: bool,
    granted_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
}

impl LockRecord {
    pub fn new(locked: bool, granted_at: Option<DateTime<Utc>>, locked_by: Option<String>) -> Self {
        LockRecord {
            locked,
            granted_at,
            locked_by,
        }
    }

    pub fn unlocked() -> Self {
        LockRecord::new(false, None, None)
    }

    pub fn locked(holder: &str, granted_at: DateTime<Utc>) -> Self {
        LockRecord::new(true, Some(granted_at), Some(holder.to_string()))
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn granted_at(&self) -> Option<DateTime<Utc>> {
        self.granted_at
    }

    pub fn locked_by(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }
}

impl Display for LockRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.locked {
            return write!(f, "unlocked");
        }
        let since = self
            .granted_at
            .map(|it| it.to_rfc3339())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        write!(
            f,
            "locked by {} since {}",
            self.locked_by.as_deref().unwrap_or("UNKNOWN"),
            since
        )
    }
}
