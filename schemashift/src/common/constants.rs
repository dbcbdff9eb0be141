use std::time::Duration;

/// Default name of the table recording applied changesets.
pub const DEFAULT_CHANGELOG_TABLE: &str = "DATABASECHANGELOG";

/// Default name of the single-row lock table.
pub const DEFAULT_LOCK_TABLE: &str = "DATABASECHANGELOGLOCK";

/// Identifier of the one row in the lock table.
pub const LOCK_ROW_ID: i64 = 1;

pub const DEFAULT_LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Attempts made to create the lock table before giving up.
pub const LOCK_INIT_ATTEMPTS: u32 = 10;

/// Checksum algorithm version written with every new checksum.
pub const CURRENT_CHECKSUM_VERSION: u32 = 9;

/// Specialization score of a generator that works for every dialect.
pub const PRIORITY_DEFAULT: i32 = 1;

/// Specialization score of a generator written for a family of dialects.
pub const PRIORITY_DATABASE: i32 = 5;

/// Author recorded on the marker row created when tagging an empty history.
pub const TAG_MARKER_AUTHOR: &str = "schemashift";

/// Changelog path recorded on that marker row.
pub const TAG_MARKER_PATH: &str = "internal";
