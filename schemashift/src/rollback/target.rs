use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// Selects the history rows a rollback undoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget {
    /// Everything applied after the most recent row carrying the tag. The
    /// tagged row stays.
    Tag(String),
    /// Everything executed after the instant.
    Date(DateTime<Utc>),
    /// The given number of most recent rows.
    Count(usize),
    /// Changesets the changelog declares but history does not contain yet.
    /// Preview only.
    Future,
}

impl Display for RollbackTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackTarget::Tag(tag) => write!(f, "tag {}", tag),
            RollbackTarget::Date(date) => write!(f, "date {}", date.to_rfc3339()),
            RollbackTarget::Count(count) => write!(f, "last {} changesets", count),
            RollbackTarget::Future => write!(f, "future changesets"),
        }
    }
}
