//! Built-in generator candidates.
//!
//! Every operation kind has a default candidate scored
//! [`PRIORITY_DEFAULT`](crate::common::PRIORITY_DEFAULT); a few dialect
//! families get overrides scored
//! [`PRIORITY_DATABASE`](crate::common::PRIORITY_DATABASE).
mod column;
mod index;
mod raw;
mod table;
mod view;

pub use column::*;
pub use index::*;
pub use raw::*;
pub use table::*;
pub use view::*;

use super::{SqlGenerator, ValidationErrors};
use crate::change::ColumnConfig;
use crate::dialect::{Dialect, DialectFeature};

/// The compiled-in candidate list, in registration order.
pub fn standard_generators() -> Vec<SqlGenerator> {
    vec![
        SqlGenerator::new(CreateTableGenerator),
        SqlGenerator::new(DropTableGenerator),
        SqlGenerator::new(RenameTableGenerator),
        SqlGenerator::new(RenameTableProcedureGenerator),
        SqlGenerator::new(AddColumnGenerator),
        SqlGenerator::new(DropColumnGenerator),
        SqlGenerator::new(RenameColumnGenerator),
        SqlGenerator::new(RenameColumnProcedureGenerator),
        SqlGenerator::new(RenameColumnChangeGenerator),
        SqlGenerator::new(RenameColumnAlterGenerator),
        SqlGenerator::new(CreateIndexGenerator),
        SqlGenerator::new(DropIndexGenerator),
        SqlGenerator::new(DropIndexOnTableGenerator),
        SqlGenerator::new(CreateViewGenerator),
        SqlGenerator::new(DropViewGenerator),
        SqlGenerator::new(RawSqlGenerator),
        SqlGenerator::new(TagDatabaseGenerator),
        SqlGenerator::new(EmptyGenerator),
    ]
}

/// Renders `name TYPE [DEFAULT x] [NOT NULL] [PRIMARY KEY] [auto] [UNIQUE]`.
pub(crate) fn column_definition(column: &ColumnConfig, dialect: &Dialect, inline_primary_key: bool) -> String {
    let mut definition = format!(
        "{} {}",
        dialect.escape_object_name(column.name()),
        dialect.data_type(column.data_type())
    );
    if let Some(default_value) = column.get_default_value() {
        definition.push_str(&format!(" DEFAULT {}", default_value));
    }
    if !column.is_nullable() && !(column.is_primary_key() && inline_primary_key) {
        definition.push_str(" NOT NULL");
    }
    if column.is_primary_key() && inline_primary_key {
        definition.push_str(" PRIMARY KEY");
    }
    if column.is_auto_increment() {
        definition.push(' ');
        definition.push_str(dialect.auto_increment_clause());
    }
    if column.is_unique() && !column.is_primary_key() {
        definition.push_str(" UNIQUE");
    }
    definition
}

/// Checks shared by create table and add column.
pub(crate) fn validate_columns(
    errors: &mut ValidationErrors,
    columns: &[ColumnConfig],
    dialect: &Dialect,
) {
    errors.check_required_list("columns", columns);
    for column in columns {
        errors.check_required_field("columnName", column.name());
        errors.check_required_field("columnType", column.data_type());

        if column.is_auto_increment() {
            if !dialect.supports(DialectFeature::AutoIncrement) {
                errors.check_disallowed_field("autoIncrement", true, dialect);
            } else if dialect.supports(DialectFeature::AutoIncrementRequiresPrimaryKey)
                && !column.is_primary_key()
            {
                errors.add_error(&format!(
                    "Cannot add non-primary key auto increment column {} on {}",
                    column.name(),
                    dialect.short_name()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definition_full() {
        let column = ColumnConfig::new("status", "VARCHAR(16)")
            .not_null()
            .unique()
            .default_value("'new'");
        assert_eq!(
            column_definition(&column, &Dialect::generic(), true),
            "status VARCHAR(16) DEFAULT 'new' NOT NULL UNIQUE"
        );
    }

    #[test]
    fn test_column_definition_auto_increment_follows_primary_key() {
        let column = ColumnConfig::new("id", "INTEGER").primary_key().auto_increment();
        assert_eq!(
            column_definition(&column, &Dialect::sqlite(), true),
            "id INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(
            column_definition(&column, &Dialect::sqlite(), false),
            "id INTEGER NOT NULL AUTOINCREMENT"
        );
    }

    #[test]
    fn test_standard_generators_cover_every_kind() {
        use crate::change::OperationKind;
        let kinds: std::collections::BTreeSet<OperationKind> = standard_generators()
            .iter()
            .map(|it| it.operation_kind())
            .collect();
        assert_eq!(kinds.len(), 13);
    }
}
