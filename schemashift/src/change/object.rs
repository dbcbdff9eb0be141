use std::fmt::{Display, Formatter};

/// A schema object touched by an operation or a generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatabaseObject {
    Table(String),
    Column { table: String, column: String },
    Index { table: String, index: String },
    View(String),
}

impl DatabaseObject {
    pub fn table(name: &str) -> Self {
        DatabaseObject::Table(name.to_string())
    }

    pub fn column(table: &str, column: &str) -> Self {
        DatabaseObject::Column {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn index(table: &str, index: &str) -> Self {
        DatabaseObject::Index {
            table: table.to_string(),
            index: index.to_string(),
        }
    }

    pub fn view(name: &str) -> Self {
        DatabaseObject::View(name.to_string())
    }
}

impl Display for DatabaseObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseObject::Table(name) => write!(f, "table {}", name),
            DatabaseObject::Column { table, column } => write!(f, "column {}.{}", table, column),
            DatabaseObject::Index { table, index } => write!(f, "index {} on {}", index, table),
            DatabaseObject::View(name) => write!(f, "view {}", name),
        }
    }
}
