use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use super::{Sql, ValidationErrors};
use crate::change::{ChangeOperation, OperationKind};
use crate::dialect::Dialect;
use crate::errors::ShiftResult;

/// A candidate that can turn one kind of operation into SQL.
///
/// Candidates never look at a dialect's name. They state which dialects they
/// handle through [`supports`](SqlGeneratorProvider::supports), which reads
/// the dialect's capability flags.
pub trait SqlGeneratorProvider: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// The operation kind this candidate handles.
    fn operation_kind(&self) -> OperationKind;

    /// Specialization score. Higher wins.
    ///
    /// # Returns
    ///
    /// [`PRIORITY_DEFAULT`](crate::common::PRIORITY_DEFAULT) for generic
    /// candidates, [`PRIORITY_DATABASE`](crate::common::PRIORITY_DATABASE)
    /// for dialect-specific overrides.
    fn priority(&self) -> i32;

    /// Dialect predicate.
    fn supports(&self, dialect: &Dialect) -> bool;

    /// Field and business rule checks for `operation` on `dialect`.
    ///
    /// # Arguments
    ///
    /// * `operation` - The operation to check; always of [`operation_kind`](SqlGeneratorProvider::operation_kind)
    /// * `dialect` - The dialect statements would be generated for
    ///
    /// # Returns
    ///
    /// The collected errors and warnings; empty when the operation is valid.
    fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ValidationErrors;

    /// Produces the ordered statements for `operation`.
    ///
    /// Called only after [`validate`](SqlGeneratorProvider::validate)
    /// reported no errors.
    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>>;
}

/// Shared handle to a registered generator candidate.
#[derive(Clone)]
pub struct SqlGenerator {
    inner: Arc<dyn SqlGeneratorProvider>,
}

impl SqlGenerator {
    pub fn new<T: SqlGeneratorProvider + 'static>(inner: T) -> Self {
        SqlGenerator {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for SqlGenerator {
    type Target = Arc<dyn SqlGeneratorProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for SqlGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("name", &self.inner.name())
            .field("kind", &self.inner.operation_kind())
            .field("priority", &self.inner.priority())
            .finish()
    }
}
