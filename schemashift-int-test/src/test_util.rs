use schemashift::change::{ChangeOperation, ColumnConfig};
use schemashift::changelog::ChangeSet;
use schemashift::errors::{ErrorKind, ShiftError, ShiftResult};
use schemashift::shift::Shift;
use schemashift_sqlite_adapter::{SqliteConfig, SqliteDatabase, SqliteModule};
use std::backtrace::Backtrace;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

pub const CHANGELOG_PATH: &str = "db/changelog.yaml";

/// Runs a test with retry logic and error handling. `after` runs even when
/// the test fails so scratch files are removed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> ShiftResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> ShiftResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> ShiftResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    eprintln!("Backtrace:\n{}", bt);
                }
                e
            }
            Err(panic_err) => {
                let msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                format!("Panic: {}", msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", error);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    shift: Shift,
}

impl TestContext {
    pub fn new(path: String, shift: Shift) -> Self {
        Self { path, shift }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shift(&self) -> Shift {
        self.shift.clone()
    }

    /// A second connection to the same file, for looking at the schema the
    /// way another client would.
    pub fn inspector(&self) -> ShiftResult<SqliteDatabase> {
        open_database(&self.path)
    }

    pub fn columns(&self, table: &str) -> ShiftResult<Vec<String>> {
        let inspector = self.inspector()?;
        let columns = inspector.table_columns(table)?;
        schemashift::store::ConnectionProvider::close(&inspector)?;
        Ok(columns)
    }

    pub fn table_exists(&self, table: &str) -> ShiftResult<bool> {
        let inspector = self.inspector()?;
        let exists = inspector.table_exists(table)?;
        schemashift::store::ConnectionProvider::close(&inspector)?;
        Ok(exists)
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    let temp_dir = env::temp_dir();
    temp_dir
        .join(format!("{}.db", id))
        .to_string_lossy()
        .to_string()
}

pub fn open_database(path: &str) -> ShiftResult<SqliteDatabase> {
    let module = SqliteModule::with_config()
        .db_path(path)
        .busy_timeout(Duration::from_millis(500))
        .build();
    let config: SqliteConfig = module.config().clone();
    SqliteDatabase::open(config)
}

pub fn create_test_context() -> ShiftResult<TestContext> {
    let path = random_path();
    let shift = open_shift(&path)?;
    Ok(TestContext::new(path, shift))
}

/// Opens another `Shift` on `path`, as a second process would.
pub fn open_shift(path: &str) -> ShiftResult<Shift> {
    let module = SqliteModule::with_config()
        .db_path(path)
        .busy_timeout(Duration::from_millis(500))
        .build();
    Shift::builder()
        .load_module(module)
        .lock_wait_timeout(Duration::from_secs(5))
        .lock_poll_interval(Duration::from_millis(50))
        .open()
}

pub fn cleanup(ctx: TestContext) -> ShiftResult<()> {
    ctx.shift.close()?;
    for file in [
        ctx.path.clone(),
        format!("{}-journal", ctx.path),
        format!("{}-wal", ctx.path),
    ] {
        if fs::metadata(&file).is_ok() {
            fs::remove_file(&file).map_err(|e| {
                ShiftError::new(
                    &format!("Could not remove {}: {}", file, e),
                    ErrorKind::BackendError,
                )
            })?;
        }
    }
    Ok(())
}

pub fn change_set(id: &str) -> ChangeSet {
    ChangeSet::new(id, "bob", CHANGELOG_PATH)
}

/// Changeset 1 creates `users`, changeset 2 adds `email` to it.
pub fn users_changelog() -> Vec<ChangeSet> {
    vec![
        change_set("1").add_operation(ChangeOperation::create_table(
            "users",
            vec![
                ColumnConfig::new("id", "INTEGER").primary_key(),
                ColumnConfig::new("name", "VARCHAR(100)").not_null(),
            ],
        )),
        change_set("2").add_operation(ChangeOperation::add_column(
            "users",
            vec![ColumnConfig::new("email", "VARCHAR(255)")],
        )),
    ]
}

pub fn create_table(id: &str, table: &str) -> ChangeSet {
    change_set(id).add_operation(ChangeOperation::create_table(
        table,
        vec![ColumnConfig::new("id", "INTEGER").primary_key()],
    ))
}
