use serde::Serialize;
use std::fmt::{Display, Formatter};

use super::{ColumnConfig, DatabaseObject};
use crate::errors::ShiftResult;

/// Tag identifying the kind of a [`ChangeOperation`].
///
/// Generators register against a kind, and the registry looks candidates up
/// by `(kind, dialect)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    RenameColumn,
    RenameTable,
    CreateIndex,
    DropIndex,
    CreateView,
    DropView,
    RawSql,
    TagDatabase,
    Empty,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateTable => "createTable",
            OperationKind::DropTable => "dropTable",
            OperationKind::AddColumn => "addColumn",
            OperationKind::DropColumn => "dropColumn",
            OperationKind::RenameColumn => "renameColumn",
            OperationKind::RenameTable => "renameTable",
            OperationKind::CreateIndex => "createIndex",
            OperationKind::DropIndex => "dropIndex",
            OperationKind::CreateView => "createView",
            OperationKind::DropView => "dropView",
            OperationKind::RawSql => "sql",
            OperationKind::TagDatabase => "tagDatabase",
            OperationKind::Empty => "empty",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single schema mutation primitive.
///
/// The serialized form (JSON, field order as declared) feeds the changeset
/// checksum, so renaming or reordering fields changes every checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeOperation {
    CreateTable {
        table: String,
        columns: Vec<ColumnConfig>,
    },
    DropTable {
        table: String,
        cascade: bool,
    },
    AddColumn {
        table: String,
        columns: Vec<ColumnConfig>,
    },
    DropColumn {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        old_name: String,
        new_name: String,
        data_type: Option<String>,
    },
    RenameTable {
        old_name: String,
        new_name: String,
    },
    CreateIndex {
        table: String,
        index: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        table: String,
        index: String,
    },
    CreateView {
        view: String,
        query: String,
    },
    DropView {
        view: String,
    },
    RawSql {
        sql: String,
        split_statements: bool,
    },
    TagDatabase {
        tag: String,
    },
    Empty,
}

impl ChangeOperation {
    pub fn create_table(table: &str, columns: Vec<ColumnConfig>) -> Self {
        ChangeOperation::CreateTable {
            table: table.to_string(),
            columns,
        }
    }

    pub fn drop_table(table: &str) -> Self {
        ChangeOperation::DropTable {
            table: table.to_string(),
            cascade: false,
        }
    }

    pub fn add_column(table: &str, columns: Vec<ColumnConfig>) -> Self {
        ChangeOperation::AddColumn {
            table: table.to_string(),
            columns,
        }
    }

    pub fn drop_column(table: &str, column: &str) -> Self {
        ChangeOperation::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn rename_column(table: &str, old_name: &str, new_name: &str, data_type: Option<&str>) -> Self {
        ChangeOperation::RenameColumn {
            table: table.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            data_type: data_type.map(|it| it.to_string()),
        }
    }

    pub fn rename_table(old_name: &str, new_name: &str) -> Self {
        ChangeOperation::RenameTable {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        }
    }

    pub fn create_index(table: &str, index: &str, columns: &[&str], unique: bool) -> Self {
        ChangeOperation::CreateIndex {
            table: table.to_string(),
            index: index.to_string(),
            columns: columns.iter().map(|it| it.to_string()).collect(),
            unique,
        }
    }

    pub fn drop_index(table: &str, index: &str) -> Self {
        ChangeOperation::DropIndex {
            table: table.to_string(),
            index: index.to_string(),
        }
    }

    pub fn create_view(view: &str, query: &str) -> Self {
        ChangeOperation::CreateView {
            view: view.to_string(),
            query: query.to_string(),
        }
    }

    pub fn drop_view(view: &str) -> Self {
        ChangeOperation::DropView {
            view: view.to_string(),
        }
    }

    /// Raw SQL text; `;`-separated statements are split apart.
    pub fn sql(sql: &str) -> Self {
        ChangeOperation::RawSql {
            sql: sql.to_string(),
            split_statements: true,
        }
    }

    pub fn tag_database(tag: &str) -> Self {
        ChangeOperation::TagDatabase {
            tag: tag.to_string(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            ChangeOperation::CreateTable { .. } => OperationKind::CreateTable,
            ChangeOperation::DropTable { .. } => OperationKind::DropTable,
            ChangeOperation::AddColumn { .. } => OperationKind::AddColumn,
            ChangeOperation::DropColumn { .. } => OperationKind::DropColumn,
            ChangeOperation::RenameColumn { .. } => OperationKind::RenameColumn,
            ChangeOperation::RenameTable { .. } => OperationKind::RenameTable,
            ChangeOperation::CreateIndex { .. } => OperationKind::CreateIndex,
            ChangeOperation::DropIndex { .. } => OperationKind::DropIndex,
            ChangeOperation::CreateView { .. } => OperationKind::CreateView,
            ChangeOperation::DropView { .. } => OperationKind::DropView,
            ChangeOperation::RawSql { .. } => OperationKind::RawSql,
            ChangeOperation::TagDatabase { .. } => OperationKind::TagDatabase,
            ChangeOperation::Empty => OperationKind::Empty,
        }
    }

    /// The schema object this operation changes, if it names one.
    pub fn affected_object(&self) -> Option<DatabaseObject> {
        match self {
            ChangeOperation::CreateTable { table, .. }
            | ChangeOperation::DropTable { table, .. }
            | ChangeOperation::AddColumn { table, .. } => Some(DatabaseObject::table(table)),
            ChangeOperation::DropColumn { table, column } => {
                Some(DatabaseObject::column(table, column))
            }
            ChangeOperation::RenameColumn { table, old_name, .. } => {
                Some(DatabaseObject::column(table, old_name))
            }
            ChangeOperation::RenameTable { old_name, .. } => Some(DatabaseObject::table(old_name)),
            ChangeOperation::CreateIndex { table, index, .. }
            | ChangeOperation::DropIndex { table, index } => {
                Some(DatabaseObject::index(table, index))
            }
            ChangeOperation::CreateView { view, .. } | ChangeOperation::DropView { view } => {
                Some(DatabaseObject::view(view))
            }
            ChangeOperation::RawSql { .. }
            | ChangeOperation::TagDatabase { .. }
            | ChangeOperation::Empty => None,
        }
    }

    /// Derives the operations that undo this one, in execution order.
    ///
    /// Returns `None` when the operation cannot be inverted, either because
    /// it destroys the definition it would need (drops) or because its
    /// effect is opaque (raw SQL).
    pub fn inverse(&self) -> Option<Vec<ChangeOperation>> {
        match self {
            ChangeOperation::CreateTable { table, .. } => {
                Some(vec![ChangeOperation::drop_table(table)])
            }
            ChangeOperation::AddColumn { table, columns } => Some(
                columns
                    .iter()
                    .rev()
                    .map(|column| ChangeOperation::drop_column(table, column.name()))
                    .collect(),
            ),
            ChangeOperation::RenameColumn {
                table,
                old_name,
                new_name,
                data_type,
            } => Some(vec![ChangeOperation::RenameColumn {
                table: table.clone(),
                old_name: new_name.clone(),
                new_name: old_name.clone(),
                data_type: data_type.clone(),
            }]),
            ChangeOperation::RenameTable { old_name, new_name } => {
                Some(vec![ChangeOperation::rename_table(new_name, old_name)])
            }
            ChangeOperation::CreateIndex { table, index, .. } => {
                Some(vec![ChangeOperation::drop_index(table, index)])
            }
            ChangeOperation::CreateView { view, .. } => Some(vec![ChangeOperation::drop_view(view)]),
            ChangeOperation::TagDatabase { .. } | ChangeOperation::Empty => Some(vec![]),
            ChangeOperation::DropTable { .. }
            | ChangeOperation::DropColumn { .. }
            | ChangeOperation::DropIndex { .. }
            | ChangeOperation::DropView { .. }
            | ChangeOperation::RawSql { .. } => None,
        }
    }

    pub fn is_invertible(&self) -> bool {
        self.inverse().is_some()
    }

    /// Short human readable summary, stored as the history description.
    pub fn description(&self) -> String {
        match self {
            ChangeOperation::CreateTable { table, .. } => format!("createTable tableName={}", table),
            ChangeOperation::DropTable { table, .. } => format!("dropTable tableName={}", table),
            ChangeOperation::AddColumn { table, .. } => format!("addColumn tableName={}", table),
            ChangeOperation::DropColumn { table, column } => {
                format!("dropColumn columnName={}, tableName={}", column, table)
            }
            ChangeOperation::RenameColumn {
                table,
                old_name,
                new_name,
                ..
            } => format!("renameColumn tableName={}, {}->{}", table, old_name, new_name),
            ChangeOperation::RenameTable { old_name, new_name } => {
                format!("renameTable {}->{}", old_name, new_name)
            }
            ChangeOperation::CreateIndex { index, table, .. } => {
                format!("createIndex indexName={}, tableName={}", index, table)
            }
            ChangeOperation::DropIndex { index, table } => {
                format!("dropIndex indexName={}, tableName={}", index, table)
            }
            ChangeOperation::CreateView { view, .. } => format!("createView viewName={}", view),
            ChangeOperation::DropView { view } => format!("dropView viewName={}", view),
            ChangeOperation::RawSql { .. } => "sql".to_string(),
            ChangeOperation::TagDatabase { tag } => format!("tagDatabase tag={}", tag),
            ChangeOperation::Empty => "empty".to_string(),
        }
    }

    /// Deterministic serialization used only as checksum input.
    pub fn checksum_text(&self) -> ShiftResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
