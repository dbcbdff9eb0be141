use super::table::unexpected;
use crate::change::{ChangeOperation, DatabaseObject, OperationKind};
use crate::common::PRIORITY_DEFAULT;
use crate::dialect::Dialect;
use crate::errors::ShiftResult;
use crate::sqlgen::{Sql, SqlGeneratorProvider, ValidationErrors};

pub struct CreateViewGenerator;

impl SqlGeneratorProvider for CreateViewGenerator {
    fn name(&self) -> &str {
        "create-view"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::CreateView
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::CreateView { view, query } = operation {
            errors.check_required_field("viewName", view);
            errors.check_required_field("selectQuery", query);
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::CreateView { view, query } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!(
            "CREATE VIEW {} AS {}",
            dialect.escape_object_name(view),
            query.trim().trim_end_matches(';')
        ))
        .affecting(DatabaseObject::view(view))])
    }
}

pub struct DropViewGenerator;

impl SqlGeneratorProvider for DropViewGenerator {
    fn name(&self) -> &str {
        "drop-view"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::DropView
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::DropView { view } = operation {
            errors.check_required_field("viewName", view);
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::DropView { view } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!("DROP VIEW {}", dialect.escape_object_name(view)))
            .affecting(DatabaseObject::view(view))])
    }
}
