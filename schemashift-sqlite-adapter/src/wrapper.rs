use chrono::{DateTime, SecondsFormat, Utc};
use schemashift::changelog::{ChangeSetKey, CheckSum, ExecType, RanChangeSet};
use schemashift::errors::{ErrorKind, ShiftError};
use schemashift::lock::LockRecord;
use std::error::Error;
use thiserror::Error;

/// A stored value that could not be read back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqliteRowError {
    #[error("Invalid timestamp '{0}': {1}")]
    InvalidTimestamp(String, String),
    #[error("Invalid checksum '{0}': {1}")]
    InvalidChecksum(String, String),
    #[error("Invalid exec type '{0}'")]
    InvalidExecType(String),
}

impl From<SqliteRowError> for ShiftError {
    fn from(err: SqliteRowError) -> Self {
        ShiftError::new(&err.to_string(), ErrorKind::EncodingError)
    }
}

pub(crate) fn to_shift_error(error: impl Error) -> ShiftError {
    log::error!("SQLite error: {}", error);
    ShiftError::new(&format!("SQLite Error: {}", error), ErrorKind::BackendError)
}

/// True when another connection holds the database write lock.
pub(crate) fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, SqliteRowError> {
    DateTime::parse_from_rfc3339(text)
        .map(|it| it.with_timezone(&Utc))
        .map_err(|e| SqliteRowError::InvalidTimestamp(text.to_string(), e.to_string()))
}

pub(crate) fn parse_checksum(text: Option<String>) -> Result<Option<CheckSum>, SqliteRowError> {
    match text {
        Some(text) => CheckSum::parse(&text)
            .map(Some)
            .map_err(|e| SqliteRowError::InvalidChecksum(text.clone(), e.message().to_string())),
        None => Ok(None),
    }
}

/// One history row as stored, before decoding.
pub(crate) struct HistoryRow {
    pub(crate) id: String,
    pub(crate) author: String,
    pub(crate) filename: String,
    pub(crate) date_executed: String,
    pub(crate) order_executed: i64,
    pub(crate) exec_type: String,
    pub(crate) checksum: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) deployment_id: Option<String>,
}

impl HistoryRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
        Ok(HistoryRow {
            id: row.get(0)?,
            author: row.get(1)?,
            filename: row.get(2)?,
            date_executed: row.get(3)?,
            order_executed: row.get(4)?,
            exec_type: row.get(5)?,
            checksum: row.get(6)?,
            description: row.get(7)?,
            tag: row.get(8)?,
            deployment_id: row.get(9)?,
        })
    }

    pub(crate) fn try_into_ran_change_set(self) -> Result<RanChangeSet, SqliteRowError> {
        let executed_at = parse_timestamp(&self.date_executed)?;
        let exec_type = self
            .exec_type
            .parse::<ExecType>()
            .map_err(|_| SqliteRowError::InvalidExecType(self.exec_type.clone()))?;
        let checksum = parse_checksum(self.checksum)?;

        Ok(RanChangeSet::new(
            ChangeSetKey::new(&self.id, &self.author, &self.filename),
            checksum,
            executed_at,
            self.order_executed,
            exec_type,
        )
        .with_description(self.description)
        .with_tag(self.tag)
        .with_deployment_id(self.deployment_id))
    }
}

pub(crate) fn to_lock_record(
    locked: i64,
    granted_at: Option<String>,
    locked_by: Option<String>,
) -> Result<LockRecord, SqliteRowError> {
    let granted_at = match granted_at {
        Some(text) => Some(parse_timestamp(&text)?),
        None => None,
    };
    Ok(LockRecord::new(locked != 0, granted_at, locked_by))
}
