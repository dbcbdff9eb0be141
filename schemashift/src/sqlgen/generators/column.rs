use super::table::unexpected;
use super::{column_definition, validate_columns};
use crate::change::{ChangeOperation, DatabaseObject, OperationKind};
use crate::common::{PRIORITY_DATABASE, PRIORITY_DEFAULT};
use crate::dialect::{Dialect, DialectFeature};
use crate::errors::ShiftResult;
use crate::sqlgen::{Sql, SqlGeneratorProvider, ValidationErrors};

pub struct AddColumnGenerator;

impl SqlGeneratorProvider for AddColumnGenerator {
    fn name(&self) -> &str {
        "add-column"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::AddColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, _dialect: &Dialect) -> bool {
        true
    }

    fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::AddColumn { table, columns } = operation {
            errors.check_required_field("tableName", table);
            validate_columns(&mut errors, columns, dialect);
            for column in columns {
                if column.is_primary_key() && !dialect.supports(DialectFeature::AddPrimaryKeyColumn) {
                    errors.add_error(&format!(
                        "Cannot add primary key column {} on {}",
                        column.name(),
                        dialect.short_name()
                    ));
                }
                errors.check_disallowed_field(
                    "afterColumn",
                    column.after_column().is_some() && !dialect.supports(DialectFeature::AfterColumn),
                    dialect,
                );
            }
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::AddColumn { table, columns } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(columns
            .iter()
            .map(|column| {
                let mut text = format!(
                    "ALTER TABLE {} {} {}",
                    dialect.escape_object_name(table),
                    dialect.add_column_clause(),
                    column_definition(column, dialect, true)
                );
                if let Some(after) = column.after_column() {
                    text.push_str(&format!(" AFTER {}", dialect.escape_object_name(after)));
                }
                Sql::new(&text)
                    .affecting(DatabaseObject::table(table))
                    .affecting(DatabaseObject::column(table, column.name()))
            })
            .collect())
    }
}

pub struct DropColumnGenerator;

impl SqlGeneratorProvider for DropColumnGenerator {
    fn name(&self) -> &str {
        "drop-column"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::DropColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports_drop_column()
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let ChangeOperation::DropColumn { table, column } = operation {
            errors.check_required_field("tableName", table);
            errors.check_required_field("columnName", column);
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::DropColumn { table, column } = operation else {
            return Err(unexpected(self.name(), operation));
        };

        Ok(vec![Sql::new(&format!(
            "ALTER TABLE {} DROP COLUMN {}",
            dialect.escape_object_name(table),
            dialect.escape_object_name(column)
        ))
        .affecting(DatabaseObject::table(table))
        .affecting(DatabaseObject::column(table, column))])
    }
}

fn validate_rename_column(operation: &ChangeOperation) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if let ChangeOperation::RenameColumn {
        table,
        old_name,
        new_name,
        ..
    } = operation
    {
        errors.check_required_field("tableName", table);
        errors.check_required_field("oldColumnName", old_name);
        errors.check_required_field("newColumnName", new_name);
    }
    errors
}

fn rename_column_sql(text: String, table: &str, old_name: &str, new_name: &str) -> Vec<Sql> {
    vec![Sql::new(&text)
        .affecting(DatabaseObject::table(table))
        .affecting(DatabaseObject::column(table, old_name))
        .affecting(DatabaseObject::column(table, new_name))]
}

/// `ALTER TABLE t RENAME COLUMN old TO new`.
pub struct RenameColumnGenerator;

impl SqlGeneratorProvider for RenameColumnGenerator {
    fn name(&self) -> &str {
        "rename-column"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULT
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports_rename_column()
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_rename_column(operation)
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameColumn {
            table,
            old_name,
            new_name,
            ..
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let text = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            dialect.escape_object_name(table),
            dialect.escape_object_name(old_name),
            dialect.escape_object_name(new_name)
        );
        Ok(rename_column_sql(text, table, old_name, new_name))
    }
}

/// `exec sp_rename 'table.old', 'new', 'COLUMN'`.
pub struct RenameColumnProcedureGenerator;

impl SqlGeneratorProvider for RenameColumnProcedureGenerator {
    fn name(&self) -> &str {
        "rename-column-procedure"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DATABASE
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports(DialectFeature::ProcedureRename)
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_rename_column(operation)
    }

    fn generate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameColumn {
            table,
            old_name,
            new_name,
            ..
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let text = format!(
            "exec sp_rename '{}.{}', '{}', 'COLUMN'",
            table, old_name, new_name
        );
        Ok(rename_column_sql(text, table, old_name, new_name))
    }
}

/// `ALTER TABLE t CHANGE old new TYPE`, which needs the column type.
pub struct RenameColumnChangeGenerator;

impl SqlGeneratorProvider for RenameColumnChangeGenerator {
    fn name(&self) -> &str {
        "rename-column-change"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DATABASE
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports(DialectFeature::TypeRequiredForColumnRename)
    }

    fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ValidationErrors {
        let mut errors = validate_rename_column(operation);
        if let ChangeOperation::RenameColumn { data_type, .. } = operation {
            if data_type.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                errors.add_error(&format!(
                    "columnDataType is required to rename columns on {}",
                    dialect.short_name()
                ));
            }
        }
        errors
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameColumn {
            table,
            old_name,
            new_name,
            data_type,
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let text = format!(
            "ALTER TABLE {} CHANGE {} {} {}",
            dialect.escape_object_name(table),
            dialect.escape_object_name(old_name),
            dialect.escape_object_name(new_name),
            dialect.data_type(data_type.as_deref().unwrap_or_default())
        );
        Ok(rename_column_sql(text, table, old_name, new_name))
    }
}

/// `ALTER TABLE t ALTER COLUMN old RENAME TO new`.
pub struct RenameColumnAlterGenerator;

impl SqlGeneratorProvider for RenameColumnAlterGenerator {
    fn name(&self) -> &str {
        "rename-column-alter"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::RenameColumn
    }

    fn priority(&self) -> i32 {
        PRIORITY_DATABASE
    }

    fn supports(&self, dialect: &Dialect) -> bool {
        dialect.supports(DialectFeature::AlterColumnRename)
    }

    fn validate(&self, operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
        validate_rename_column(operation)
    }

    fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let ChangeOperation::RenameColumn {
            table,
            old_name,
            new_name,
            ..
        } = operation
        else {
            return Err(unexpected(self.name(), operation));
        };

        let text = format!(
            "ALTER TABLE {} ALTER COLUMN {} RENAME TO {}",
            dialect.escape_object_name(table),
            dialect.escape_object_name(old_name),
            dialect.escape_object_name(new_name)
        );
        Ok(rename_column_sql(text, table, old_name, new_name))
    }
}
