use super::table::unexpected;
use crate::change::{ChangeOperation, OperationKind};
use crate::common::PRIORITY_DEFAULT;
use crate::dialect::Dialect;
use crate::errors::ShiftResult;
use crate::sqlgen::{split_statements, Sql, SqlGeneratorProvider, ValidationErrors};

/// Passes author-written SQL through, split on `;` when asked to.
pub struct RawSqlGenerator;

impl SqlGeneratorProvider for RawSqlGenerator {
    fn name(&self) -> &str {
        "raw-sql"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RawSql
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::RawSql { sql, .. } = operation {
            errors.check_required_field("sql", sql);
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RawSql {
            sql,
            split_statements: split,
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let statements = if *split {
            split_statements(sql)
        } else {
            vec![sql.trim().to_string()]
        };
        Ok(statements
            .iter()
            .map(|it| Sql::new(it).with_end_delimiter(dialect.statement_delimiter()))
            .collect())
    }
}

/// Tagging writes no SQL; the engine records the tag on the history row.
pub struct TagDatabaseGenerator;

impl SqlGeneratorProvider for TagDatabaseGenerator {
    fn name(&self) -> &str {
        "tag-database"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::TagDatabase
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::TagDatabase { tag } = operation {
            errors.check_required_field("tag", tag);
        }
        errors
    }

    fn generate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        Ok(vec![])
    }
}

pub struct EmptyGenerator;

impl SqlGeneratorProvider for EmptyGenerator {
    fn name(&self) -> &str {
        "empty"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::Empty
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        ValidationErrors::new()
    }

    fn generate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        Ok(vec![])
    }
}
