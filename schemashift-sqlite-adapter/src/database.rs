use crate::config::SqliteConfig;
use crate::wrapper::{
    format_timestamp, is_busy, parse_checksum, to_lock_record, to_shift_error, HistoryRow,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use schemashift::changelog::{ChangeSetKey, CheckSum, RanChangeSet};
use schemashift::common::LOCK_ROW_ID;
use schemashift::dialect::Dialect;
use schemashift::errors::{ErrorKind, ShiftError, ShiftResult};
use schemashift::lock::LockRecord;
use schemashift::sqlgen::Sql;
use schemashift::store::{ChangeHistoryProvider, ConnectionProvider, LockProvider};
use std::sync::Arc;

const HISTORY_COLUMNS: &str = "ID, AUTHOR, FILENAME, DATEEXECUTED, ORDEREXECUTED, EXECTYPE, \
     MD5SUM, DESCRIPTION, TAG, DEPLOYMENT_ID";

/// A SQLite database holding both the migrated schema and the
/// schemashift bookkeeping tables.
///
/// One connection serves every call. Transactions are opened with
/// `BEGIN IMMEDIATE` so a second process blocks at `begin` rather than
/// failing halfway through a changeset.
#[derive(Clone)]
pub struct SqliteDatabase {
    inner: Arc<SqliteDatabaseInner>,
}

impl SqliteDatabase {
    /// Opens the database file named by `config`, creating it if needed.
    pub fn open(config: SqliteConfig) -> ShiftResult<SqliteDatabase> {
        let connection = Connection::open(config.db_path()).map_err(to_shift_error)?;
        connection
            .busy_timeout(config.busy_timeout())
            .map_err(to_shift_error)?;

        let dialect = bundled_dialect();
        log::debug!(
            "Opened SQLite database at {} ({} {}.{})",
            config.db_path(),
            dialect.short_name(),
            dialect.major_version(),
            dialect.minor_version()
        );

        Ok(SqliteDatabase {
            inner: Arc::new(SqliteDatabaseInner {
                config,
                connection: Mutex::new(Some(connection)),
                dialect,
            }),
        })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.connection.lock().is_none()
    }

    /// Runs a read-only query returning one text column per row. Useful to
    /// inspect the migrated schema.
    pub fn query_strings(&self, sql: &str) -> ShiftResult<Vec<String>> {
        self.inner.with_connection(|conn| {
            let mut statement = conn.prepare(sql)?;
            let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }

    /// Names of the columns of `table`, in declaration order.
    pub fn table_columns(&self, table: &str) -> ShiftResult<Vec<String>> {
        self.inner.with_connection(|conn| {
            let mut statement = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let rows = statement.query_map([table], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }

    pub fn table_exists(&self, table: &str) -> ShiftResult<bool> {
        self.inner.with_connection(|conn| table_exists(conn, table))
    }
}

impl ConnectionProvider for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        self.inner.dialect.clone()
    }

    fn execute(&self, sql: &Sql) -> ShiftResult<()> {
        log::debug!("Executing: {}", sql.text());
        self.inner.with_connection(|conn| conn.execute_batch(sql.text()))
    }

    fn begin(&self) -> ShiftResult<()> {
        self.inner
            .with_connection(|conn| conn.execute_batch("BEGIN IMMEDIATE"))
    }

    fn commit(&self) -> ShiftResult<()> {
        self.inner.with_connection(|conn| conn.execute_batch("COMMIT"))
    }

    fn rollback(&self) -> ShiftResult<()> {
        self.inner.with_connection(|conn| {
            if conn.is_autocommit() {
                return Ok(());
            }
            conn.execute_batch("ROLLBACK")
        })
    }

    fn close(&self) -> ShiftResult<()> {
        let connection = self.inner.connection.lock().take();
        match connection {
            Some(conn) => conn.close().map_err(|(_, e)| to_shift_error(e)),
            None => Ok(()),
        }
    }
}

impl ChangeHistoryProvider for SqliteDatabase {
    fn init_history(&self) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        self.inner.with_connection(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 ID VARCHAR(255) NOT NULL, \
                 AUTHOR VARCHAR(255) NOT NULL, \
                 FILENAME VARCHAR(255) NOT NULL, \
                 DATEEXECUTED TEXT NOT NULL, \
                 ORDEREXECUTED INTEGER NOT NULL, \
                 EXECTYPE VARCHAR(10) NOT NULL, \
                 MD5SUM VARCHAR(80), \
                 DESCRIPTION VARCHAR(255), \
                 TAG VARCHAR(255), \
                 DEPLOYMENT_ID VARCHAR(36), \
                 PRIMARY KEY (ID, AUTHOR, FILENAME))",
                table
            ))
        })
    }

    fn ran_change_sets(&self) -> ShiftResult<Vec<RanChangeSet>> {
        let table = self.inner.config.changelog_table();
        let rows = self.inner.with_connection(|conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT {} FROM {} ORDER BY ORDEREXECUTED, DATEEXECUTED",
                HISTORY_COLUMNS, table
            ))?;
            let rows = statement.query_map([], HistoryRow::from_row)?;
            rows.collect::<rusqlite::Result<Vec<HistoryRow>>>()
        })?;

        rows.into_iter()
            .map(|row| row.try_into_ran_change_set().map_err(ShiftError::from))
            .collect()
    }

    fn append(&self, record: &RanChangeSet) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        self.inner.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    table, HISTORY_COLUMNS
                ),
                params![
                    record.key().id(),
                    record.key().author(),
                    record.key().path(),
                    format_timestamp(&record.executed_at()),
                    record.order_executed(),
                    record.exec_type().as_str(),
                    record.checksum().map(|it| it.to_string()),
                    record.description(),
                    record.tag(),
                    record.deployment_id(),
                ],
            )
            .map(|_| ())
        })
    }

    fn rewrite(&self, record: &RanChangeSet) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        let changed = self.inner.with_connection(|conn| {
            conn.execute(
                &format!(
                    "UPDATE {} SET DATEEXECUTED = ?4, ORDEREXECUTED = ?5, EXECTYPE = ?6, \
                     MD5SUM = ?7, DESCRIPTION = ?8, TAG = ?9, DEPLOYMENT_ID = ?10 \
                     WHERE ID = ?1 AND AUTHOR = ?2 AND FILENAME = ?3",
                    table
                ),
                params![
                    record.key().id(),
                    record.key().author(),
                    record.key().path(),
                    format_timestamp(&record.executed_at()),
                    record.order_executed(),
                    record.exec_type().as_str(),
                    record.checksum().map(|it| it.to_string()),
                    record.description(),
                    record.tag(),
                    record.deployment_id(),
                ],
            )
        })?;
        expect_one_row(changed, record.key())
    }

    fn update_checksum(&self, key: &ChangeSetKey, checksum: Option<&CheckSum>) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        let changed = self.inner.with_connection(|conn| {
            conn.execute(
                &format!(
                    "UPDATE {} SET MD5SUM = ?4 WHERE ID = ?1 AND AUTHOR = ?2 AND FILENAME = ?3",
                    table
                ),
                params![
                    key.id(),
                    key.author(),
                    key.path(),
                    checksum.map(|it| it.to_string())
                ],
            )
        })?;
        expect_one_row(changed, key)
    }

    fn update_tag(&self, key: &ChangeSetKey, tag: &str) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        let changed = self.inner.with_connection(|conn| {
            conn.execute(
                &format!(
                    "UPDATE {} SET TAG = ?4 WHERE ID = ?1 AND AUTHOR = ?2 AND FILENAME = ?3",
                    table
                ),
                params![key.id(), key.author(), key.path(), tag],
            )
        })?;
        expect_one_row(changed, key)
    }

    fn delete(&self, key: &ChangeSetKey) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        self.inner.with_connection(|conn| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE ID = ?1 AND AUTHOR = ?2 AND FILENAME = ?3",
                    table
                ),
                params![key.id(), key.author(), key.path()],
            )
            .map(|_| ())
        })
    }

    fn upgrade_legacy_checksums(&self, current_version: u32) -> ShiftResult<usize> {
        let table = self.inner.config.changelog_table();
        let stored = self.inner.with_connection(|conn| {
            let mut statement = conn.prepare(&format!(
                "SELECT ID, AUTHOR, FILENAME, MD5SUM FROM {} WHERE MD5SUM IS NOT NULL",
                table
            ))?;
            let rows = statement.query_map([], |row| {
                Ok((
                    ChangeSetKey::new(
                        &row.get::<_, String>(0)?,
                        &row.get::<_, String>(1)?,
                        &row.get::<_, String>(2)?,
                    ),
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        let mut changed = 0;
        for (key, checksum) in stored {
            let legacy = parse_checksum(checksum)
                .map_err(ShiftError::from)?
                .is_some_and(|it| it.version() < current_version);
            if legacy {
                self.update_checksum(&key, None)?;
                changed += 1;
            }
        }

        if changed > 0 {
            log::info!("Cleared {} legacy checksums in {}", changed, table);
        }
        Ok(changed)
    }

    fn clear_checksums(&self) -> ShiftResult<()> {
        let table = self.inner.config.changelog_table();
        self.inner.with_connection(|conn| {
            conn.execute(&format!("UPDATE {} SET MD5SUM = NULL", table), [])
                .map(|_| ())
        })
    }
}

impl LockProvider for SqliteDatabase {
    fn init_lock(&self) -> ShiftResult<()> {
        let table = self.inner.config.lock_table();
        self.inner.with_connection(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 ID INTEGER NOT NULL PRIMARY KEY, \
                 LOCKED INTEGER NOT NULL, \
                 LOCKGRANTED TEXT, \
                 LOCKEDBY VARCHAR(255))",
                table
            ))?;
            conn.execute(
                &format!("INSERT OR IGNORE INTO {} (ID, LOCKED) VALUES (?1, 0)", table),
                [LOCK_ROW_ID],
            )
            .map(|_| ())
        })
    }

    fn try_acquire(&self, holder: &str, granted_at: DateTime<Utc>) -> ShiftResult<bool> {
        let table = self.inner.config.lock_table();
        let guard = self.inner.connection.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;

        let result = conn.execute(
            &format!(
                "UPDATE {} SET LOCKED = 1, LOCKGRANTED = ?1, LOCKEDBY = ?2 \
                 WHERE ID = ?3 AND LOCKED = 0",
                table
            ),
            params![format_timestamp(&granted_at), holder, LOCK_ROW_ID],
        );

        match result {
            Ok(changed) => Ok(changed == 1),
            // another connection is writing, so the lock cannot be ours yet
            Err(err) if is_busy(&err) => {
                log::debug!("Lock table busy while acquiring for {}", holder);
                Ok(false)
            }
            Err(err) => Err(to_shift_error(err)),
        }
    }

    fn release(&self) -> ShiftResult<()> {
        let table = self.inner.config.lock_table();
        self.inner.with_connection(|conn| {
            if !table_exists(conn, &table)? {
                return Ok(());
            }
            conn.execute(
                &format!(
                    "UPDATE {} SET LOCKED = 0, LOCKGRANTED = NULL, LOCKEDBY = NULL WHERE ID = ?1",
                    table
                ),
                [LOCK_ROW_ID],
            )
            .map(|_| ())
        })
    }

    fn current_lock(&self) -> ShiftResult<Option<LockRecord>> {
        let table = self.inner.config.lock_table();
        let row = self.inner.with_connection(|conn| {
            if !table_exists(conn, &table)? {
                return Ok(None);
            }
            conn.query_row(
                &format!(
                    "SELECT LOCKED, LOCKGRANTED, LOCKEDBY FROM {} WHERE ID = ?1",
                    table
                ),
                [LOCK_ROW_ID],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
        })?;

        match row {
            Some((locked, granted_at, locked_by)) => Ok(Some(
                to_lock_record(locked, granted_at, locked_by).map_err(ShiftError::from)?,
            )),
            None => Ok(None),
        }
    }
}

struct SqliteDatabaseInner {
    config: SqliteConfig,
    connection: Mutex<Option<Connection>>,
    dialect: Dialect,
}

impl SqliteDatabaseInner {
    fn with_connection<R>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> ShiftResult<R> {
        let guard = self.connection.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        f(conn).map_err(to_shift_error)
    }
}

/// Dialect of the SQLite library linked into this build.
fn bundled_dialect() -> Dialect {
    let number = rusqlite::version_number();
    let major = (number / 1_000_000) as u32;
    let minor = ((number / 1000) % 1000) as u32;
    Dialect::sqlite_version(major, minor)
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

fn closed_error() -> ShiftError {
    ShiftError::new("SQLite database is closed", ErrorKind::BackendError)
}

fn expect_one_row(changed: usize, key: &ChangeSetKey) -> ShiftResult<()> {
    if changed == 0 {
        return Err(ShiftError::new(
            &format!("No history row for changeset {}", key),
            ErrorKind::BackendError,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemashift::changelog::ExecType;
    use std::path::PathBuf;

    fn random_path() -> String {
        let id = uuid::Uuid::new_v4();
        let path: PathBuf = std::env::temp_dir().join(format!("schemashift-{}.db", id));
        path.to_string_lossy().to_string()
    }

    fn open(path: &str) -> SqliteDatabase {
        let config = SqliteConfig::new();
        config.set_db_path(path);
        config.set_busy_timeout(std::time::Duration::from_millis(200));
        SqliteDatabase::open(config).unwrap()
    }

    fn cleanup(path: &str) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(format!("{}-journal", path));
    }

    fn record(id: &str, order: i64) -> RanChangeSet {
        RanChangeSet::new(
            ChangeSetKey::new(id, "bob", "changelog.yaml"),
            Some(CheckSum::compute(id)),
            Utc::now(),
            order,
            ExecType::Executed,
        )
        .with_description(Some("createTable".to_string()))
        .with_deployment_id(Some("d1".to_string()))
    }

    #[test]
    fn test_bundled_dialect_is_sqlite() {
        let dialect = bundled_dialect();
        assert_eq!(dialect.short_name(), "sqlite");
        assert_eq!(dialect.major_version(), 3);
    }

    #[test]
    fn test_history_round_trip() {
        let path = random_path();
        let db = open(&path);
        db.init_history().unwrap();
        db.init_history().unwrap();

        db.append(&record("2", 2)).unwrap();
        db.append(&record("1", 1)).unwrap();

        let rows = db.ran_change_sets().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key().id(), "1");
        assert_eq!(rows[1].key().id(), "2");
        assert_eq!(rows[0].description(), Some("createTable"));
        assert_eq!(rows[0].checksum(), Some(&CheckSum::compute("1")));

        db.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_rewrite_and_tag_require_existing_row() {
        let path = random_path();
        let db = open(&path);
        db.init_history().unwrap();

        let missing = ChangeSetKey::new("9", "bob", "changelog.yaml");
        assert!(db.update_tag(&missing, "v1").is_err());
        assert!(db.rewrite(&record("9", 1)).is_err());

        db.append(&record("1", 1)).unwrap();
        db.update_tag(record("1", 1).key(), "v1").unwrap();
        let rerun = RanChangeSet::new(
            ChangeSetKey::new("1", "bob", "changelog.yaml"),
            None,
            Utc::now(),
            5,
            ExecType::Reran,
        );
        db.rewrite(&rerun).unwrap();

        let rows = db.ran_change_sets().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].exec_type(), ExecType::Reran);
        assert_eq!(rows[0].order_executed(), 5);
        assert_eq!(rows[0].tag(), None);

        db.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_upgrade_legacy_checksums() {
        let path = random_path();
        let db = open(&path);
        db.init_history().unwrap();
        db.append(&record("1", 1)).unwrap();
        let legacy = RanChangeSet::new(
            ChangeSetKey::new("2", "bob", "changelog.yaml"),
            Some(CheckSum::parse("7:0f00").unwrap()),
            Utc::now(),
            2,
            ExecType::Executed,
        );
        db.append(&legacy).unwrap();

        assert_eq!(db.upgrade_legacy_checksums(9).unwrap(), 1);
        let rows = db.ran_change_sets().unwrap();
        assert!(rows[0].checksum().is_some());
        assert!(rows[1].checksum().is_none());

        db.clear_checksums().unwrap();
        assert!(db.ran_change_sets().unwrap().iter().all(|it| it.checksum().is_none()));

        db.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_rollback_discards_statements_and_history() {
        let path = random_path();
        let db = open(&path);
        db.init_history().unwrap();

        db.begin().unwrap();
        db.execute(&Sql::new("CREATE TABLE a (id INTEGER)")).unwrap();
        db.append(&record("1", 1)).unwrap();
        db.rollback().unwrap();

        assert!(!db.table_exists("a").unwrap());
        assert!(db.ran_change_sets().unwrap().is_empty());

        db.begin().unwrap();
        db.execute(&Sql::new("CREATE TABLE a (id INTEGER)")).unwrap();
        db.append(&record("1", 1)).unwrap();
        db.commit().unwrap();

        assert_eq!(db.table_columns("a").unwrap(), vec!["id".to_string()]);
        assert_eq!(db.ran_change_sets().unwrap().len(), 1);

        db.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_lock_is_exclusive_across_connections() {
        let path = random_path();
        let first = open(&path);
        let second = open(&path);

        assert!(first.current_lock().unwrap().is_none());
        first.init_lock().unwrap();
        second.init_lock().unwrap();

        assert!(first.try_acquire("first", Utc::now()).unwrap());
        assert!(!second.try_acquire("second", Utc::now()).unwrap());

        let lock = second.current_lock().unwrap().unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.locked_by(), Some("first"));
        assert!(lock.granted_at().is_some());

        first.release().unwrap();
        assert!(second.try_acquire("second", Utc::now()).unwrap());
        second.release().unwrap();
        assert!(!first.current_lock().unwrap().unwrap().is_locked());

        first.close().unwrap();
        second.close().unwrap();
        cleanup(&path);
    }

    #[test]
    fn test_closed_database_rejects_calls() {
        let path = random_path();
        let db = open(&path);
        db.close().unwrap();
        db.close().unwrap();

        assert!(db.is_closed());
        let err = db.execute(&Sql::new("SELECT 1")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
        cleanup(&path);
    }

    #[test]
    fn test_failed_statement_is_backend_error() {
        let db = open(":memory:");
        let err = db.execute(&Sql::new("DROP TABLE missing")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
        assert!(err.message().starts_with("SQLite Error"));
    }
}
