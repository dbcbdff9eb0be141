use super::memory::InMemoryDatabase;
use super::Database;
use crate::dialect::Dialect;
use crate::errors::ShiftResult;

/// Supplies the [`Database`] a [`Shift`](crate::shift::Shift) runs against.
pub trait DatabaseModule {
    fn database(&self) -> ShiftResult<Database>;
}

/// Module backed by a fresh [`InMemoryDatabase`].
#[derive(Default)]
pub struct InMemoryModule {
    dialect: Dialect,
}

impl InMemoryModule {
    pub fn new() -> Self {
        InMemoryModule::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        InMemoryModule { dialect }
    }
}

impl DatabaseModule for InMemoryModule {
    fn database(&self) -> ShiftResult<Database> {
        Ok(Database::new(InMemoryDatabase::new(self.dialect.clone())))
    }
}

/// Hands out an existing in-memory database, so several `Shift` instances
/// can share one store.
impl DatabaseModule for InMemoryDatabase {
    fn database(&self) -> ShiftResult<Database> {
        Ok(Database::new(self.clone()))
    }
}
