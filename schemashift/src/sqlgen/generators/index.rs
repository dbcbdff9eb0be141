use super::table::unexpected;
use crate::change::{ChangeOperation, DatabaseObject, OperationKind};
use crate::common::{PRIORITY_DATABASE, PRIORITY_DEFAULT};
use crate::dialect::{Dialect, DialectFeature};
use crate::errors::ShiftResult;
use crate::sqlgen::{Sql, SqlGeneratorProvider, ValidationErrors};

pub struct CreateIndexGenerator;

impl SqlGeneratorProvider for CreateIndexGenerator {
    fn name(&self) -> &str {
        "create-index"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::CreateIndex
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::CreateIndex {
            table,
            index,
            columns,
            ..
        } = operation
        {
            errors.check_required_field("tableName", table);
            errors.check_required_field("indexName", index);
            errors.check_required_list("columns", columns);
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::CreateIndex {
            table,
            index,
            columns,
            unique,
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let columns: Vec<String> = columns
            .iter()
            .map(|it| dialect.escape_object_name(it))
            .collect();
        let text = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if *unique { "UNIQUE " } else { "" },
            dialect.escape_object_name(index),
            dialect.escape_object_name(table),
            columns.join(", ")
        );
        Ok(vec![Sql::new(&text)
            .affecting(DatabaseObject::index(table, index))
            .affecting(DatabaseObject::table(table))])
    }
}

fn validate_drop_index(operation: &ChangeOperation, table_required: bool) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if let ChangeOperation::DropIndex { table, index } = operation {
        errors.check_required_field("indexName", index);
        if table_required {
            errors.check_required_field("tableName", table);
        }
    }
    errors
}

/// `DROP INDEX name` for dialects with schema-wide index names.
pub struct DropIndexGenerator;

impl SqlGeneratorProvider for DropIndexGenerator {
    fn name(&self) -> &str {
        "drop-index"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::DropIndex
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_drop_index(operation, false)
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::DropIndex { table, index } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!("DROP INDEX {}", dialect.escape_object_name(index)))
            .affecting(DatabaseObject::index(table, index))])
    }
}

/// `DROP INDEX name ON table` for dialects scoping index names to tables.
pub struct DropIndexOnTableGenerator;

impl SqlGeneratorProvider for DropIndexOnTableGenerator {
    fn name(&self) -> &str {
        "drop-index-on-table"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::DropIndex
    }

    fn priority(&self) -> i32 {
        PRIORITY_DATABASE
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports(DialectFeature::TableScopedIndexes)
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_drop_index(operation, true)
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::DropIndex { table, index } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!(
            "DROP INDEX {} ON {}",
            dialect.escape_object_name(index),
            dialect.escape_object_name(table)
        ))
        .affecting(DatabaseObject::index(table, index))])
    }
}
