use super::{column_definition, validate_columns};
use crate::change::{ChangeOperation, DatabaseObject, OperationKind};
use crate::common::{PRIORITY_DATABASE, PRIORITY_DEFAULT};
use crate::dialect::{Dialect, DialectFeature};
use crate::errors::{ErrorKind, ShiftError, ShiftResult};
use crate::sqlgen::{Sql, SqlGeneratorProvider, ValidationErrors};

pub(crate) fn unexpected(generator: &str, operation: &ChangeOperation) -> ShiftError {
    ShiftError::new(
        &format!("{} cannot handle {}", generator, operation.kind()),
        ErrorKind::InternalError,
    )
}

pub struct CreateTableGenerator;

impl SqlGeneratorProvider for CreateTableGenerator {
    fn name(&self) -> &str {
        "create-table"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::CreateTable
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::CreateTable { table, columns } = operation {
            errors.check_required_field("tableName", table);
            validate_columns(&mut errors, columns, dialect);
            if columns.iter().any(|it| it.after_column().is_some()) {
                errors.add_warning("afterColumn is ignored by createTable");
            }
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::CreateTable { table, columns } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        let primary_keys: Vec<&str> = columns
            .iter()
            .filter(|it| it.is_primary_key())
            .map(|it| it.name())
            .collect();
        let inline_primary_key = primary_keys.len() <= 1;

        let mut parts: Vec<String> = columns
            .iter()
            .map(|it| column_definition(it, dialect, inline_primary_key))
            .collect();
        if !inline_primary_key {
            let names: Vec<String> = primary_keys
                .iter()
                .map(|it| dialect.escape_object_name(it))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }

        let mut sql = Sql::new(&format!(
            "CREATE TABLE {} ({})",
            dialect.escape_object_name(table),
            parts.join(", ")
        ))
        .affecting(DatabaseObject::table(table));
        for column in columns {
            sql = sql.affecting(DatabaseObject::column(table, column.name()));
        }
        Ok(vec![sql])
    }
}

pub struct DropTableGenerator;

impl SqlGeneratorProvider for DropTableGenerator {
    fn name(&self) -> &str {
        "drop-table"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::DropTable
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::DropTable { table, cascade } = operation {
            errors.check_required_field("tableName", table);
            if *cascade && !dialect.supports_cascade_drop() {
                errors.add_warning(&format!(
                    "cascadeConstraints is ignored on {}",
                    dialect.short_name()
                ));
            }
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::DropTable { table, cascade } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        let mut text = format!("DROP TABLE {}", dialect.escape_object_name(table));
        if *cascade && dialect.supports_cascade_drop() {
            text.push_str(" CASCADE");
        }
        Ok(vec![Sql::new(&text).affecting(DatabaseObject::table(table))])
    }
}

fn validate_rename_table(operation: &ChangeOperation) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if let ChangeOperation::RenameTable { old_name, new_name } = operation {
        errors.check_required_field("oldTableName", old_name);
        errors.check_required_field("newTableName", new_name);
    }
    errors
}

pub struct RenameTableGenerator;

impl SqlGeneratorProvider for RenameTableGenerator {
    fn name(&self) -> &str {
        "rename-table"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameTable
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_rename_table(operation)
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameTable { old_name, new_name } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.escape_object_name(old_name),
            dialect.escape_object_name(new_name)
        ))
        .affecting(DatabaseObject::table(old_name))
        .affecting(DatabaseObject::table(new_name))])
    }
}

/// `sp_rename` for dialects that rename through a stored procedure.
pub struct RenameTableProcedureGenerator;

impl SqlGeneratorProvider for RenameTableProcedureGenerator {
    fn name(&self) -> &str {
        "rename-table-procedure"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameTable
    }

    fn priority(&self) -> i32 {
        PRIORITY_DATABASE
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports(DialectFeature::ProcedureRename)
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_rename_table(operation)
    }

    fn generate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameTable { old_name, new_name } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!("exec sp_rename '{}', '{}'", old_name, new_name))
            .affecting(DatabaseObject::table(old_name))
            .affecting(DatabaseObject::table(new_name))])
    }
}
