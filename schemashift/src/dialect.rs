//! Dialect capability descriptors.
//!
//! A [`Dialect`] is plain data: a name, a version, a set of
//! [`DialectFeature`] flags and a few syntax templates. Generators decide
//! whether they apply by looking at these flags, so a new database is added
//! by describing it, not by writing code for it.
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static PLAIN_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// A capability a dialect may or may not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DialectFeature {
    /// DDL participates in transactions and can be rolled back.
    DdlInTransactions,
    DropColumn,
    RenameColumn,
    /// A primary key column can be added to an existing table.
    AddPrimaryKeyColumn,
    /// `ADD COLUMN ... AFTER other` positioning.
    AfterColumn,
    CascadeDrop,
    IfExists,
    AutoIncrement,
    /// Auto increment is only allowed on primary key columns.
    AutoIncrementRequiresPrimaryKey,
    /// Column rename restates the column type (`CHANGE old new TYPE`).
    TypeRequiredForColumnRename,
    /// Objects are renamed through the `sp_rename` procedure.
    ProcedureRename,
    /// Column rename is spelled `ALTER COLUMN old RENAME TO new`.
    AlterColumnRename,
    /// Index names are scoped to their table, so drops must name it.
    TableScopedIndexes,
}

/// A target database's capability and syntax profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dialect {
    short_name: String,
    major_version: u32,
    minor_version: u32,
    quote_start: String,
    quote_end: String,
    features: BTreeSet<DialectFeature>,
    auto_increment_clause: String,
    add_column_clause: String,
    statement_delimiter: String,
    type_aliases: BTreeMap<String, String>,
}

impl Dialect {
    /// A bare descriptor with standard SQL syntax and no features.
    pub fn custom(short_name: &str) -> Self {
        Dialect {
            short_name: short_name.to_lowercase(),
            major_version: 0,
            minor_version: 0,
            quote_start: "\"".to_string(),
            quote_end: "\"".to_string(),
            features: BTreeSet::new(),
            auto_increment_clause: "GENERATED BY DEFAULT AS IDENTITY".to_string(),
            add_column_clause: "ADD COLUMN".to_string(),
            statement_delimiter: ";".to_string(),
            type_aliases: BTreeMap::new(),
        }
    }

    /// Standard SQL with every common capability and no overrides.
    pub fn generic() -> Self {
        Dialect::custom("generic").with_features(&[
            DialectFeature::DdlInTransactions,
            DialectFeature::DropColumn,
            DialectFeature::RenameColumn,
            DialectFeature::AddPrimaryKeyColumn,
            DialectFeature::CascadeDrop,
            DialectFeature::IfExists,
            DialectFeature::AutoIncrement,
        ])
    }

    pub fn postgresql() -> Self {
        Dialect::generic()
            .renamed("postgresql")
            .with_version(16, 0)
            .with_type_alias("DATETIME", "TIMESTAMP")
            .with_type_alias("BLOB", "BYTEA")
    }

    pub fn mysql() -> Self {
        Dialect::custom("mysql")
            .with_version(8, 0)
            .with_quotes("`", "`")
            .with_features(&[
                DialectFeature::DropColumn,
                DialectFeature::RenameColumn,
                DialectFeature::AddPrimaryKeyColumn,
                DialectFeature::AfterColumn,
                DialectFeature::CascadeDrop,
                DialectFeature::IfExists,
                DialectFeature::AutoIncrement,
                DialectFeature::AutoIncrementRequiresPrimaryKey,
                DialectFeature::TypeRequiredForColumnRename,
                DialectFeature::TableScopedIndexes,
            ])
            .with_auto_increment_clause("AUTO_INCREMENT")
    }

    pub fn mssql() -> Self {
        Dialect::custom("mssql")
            .with_version(16, 0)
            .with_quotes("[", "]")
            .with_features(&[
                DialectFeature::DdlInTransactions,
                DialectFeature::DropColumn,
                DialectFeature::RenameColumn,
                DialectFeature::AddPrimaryKeyColumn,
                DialectFeature::IfExists,
                DialectFeature::AutoIncrement,
                DialectFeature::ProcedureRename,
                DialectFeature::TableScopedIndexes,
            ])
            .with_auto_increment_clause("IDENTITY")
            .with_add_column_clause("ADD")
            .with_type_alias("BOOLEAN", "BIT")
            .with_type_alias("TEXT", "NVARCHAR(MAX)")
            .with_type_alias("TIMESTAMP", "DATETIME2")
    }

    pub fn h2() -> Self {
        Dialect::generic()
            .renamed("h2")
            .with_version(2, 2)
            .with_features(&[DialectFeature::AfterColumn, DialectFeature::AlterColumnRename])
            .with_auto_increment_clause("AUTO_INCREMENT")
    }

    /// SQLite 3.45.
    pub fn sqlite() -> Self {
        Dialect::sqlite_version(3, 45)
    }

    /// SQLite gained column rename in 3.25 and column drop in 3.35.
    pub fn sqlite_version(major: u32, minor: u32) -> Self {
        let mut dialect = Dialect::custom("sqlite")
            .with_version(major, minor)
            .with_features(&[
                DialectFeature::DdlInTransactions,
                DialectFeature::IfExists,
                DialectFeature::AutoIncrement,
                DialectFeature::AutoIncrementRequiresPrimaryKey,
            ])
            .with_auto_increment_clause("AUTOINCREMENT");
        if (major, minor) >= (3, 25) {
            dialect = dialect.with_features(&[DialectFeature::RenameColumn]);
        }
        if (major, minor) >= (3, 35) {
            dialect = dialect.with_features(&[DialectFeature::DropColumn]);
        }
        dialect
    }

    pub fn renamed(mut self, short_name: &str) -> Self {
        self.short_name = short_name.to_lowercase();
        self
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn with_quotes(mut self, start: &str, end: &str) -> Self {
        self.quote_start = start.to_string();
        self.quote_end = end.to_string();
        self
    }

    pub fn with_features(mut self, features: &[DialectFeature]) -> Self {
        self.features.extend(features.iter().copied());
        self
    }

    pub fn without_features(mut self, features: &[DialectFeature]) -> Self {
        for feature in features {
            self.features.remove(feature);
        }
        self
    }

    pub fn with_auto_increment_clause(mut self, clause: &str) -> Self {
        self.auto_increment_clause = clause.to_string();
        self
    }

    pub fn with_add_column_clause(mut self, clause: &str) -> Self {
        self.add_column_clause = clause.to_string();
        self
    }

    pub fn with_statement_delimiter(mut self, delimiter: &str) -> Self {
        self.statement_delimiter = delimiter.to_string();
        self
    }

    /// Maps a declared base type (case-insensitive) to this dialect's type.
    pub fn with_type_alias(mut self, declared: &str, actual: &str) -> Self {
        self.type_aliases
            .insert(declared.to_uppercase(), actual.to_string());
        self
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn major_version(&self) -> u32 {
        self.major_version
    }

    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    pub fn supports(&self, feature: DialectFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn supports_ddl_in_transactions(&self) -> bool {
        self.supports(DialectFeature::DdlInTransactions)
    }

    pub fn supports_drop_column(&self) -> bool {
        self.supports(DialectFeature::DropColumn)
    }

    pub fn supports_rename_column(&self) -> bool {
        self.supports(DialectFeature::RenameColumn)
    }

    pub fn supports_cascade_drop(&self) -> bool {
        self.supports(DialectFeature::CascadeDrop)
    }

    pub fn auto_increment_clause(&self) -> &str {
        &self.auto_increment_clause
    }

    pub fn add_column_clause(&self) -> &str {
        &self.add_column_clause
    }

    pub fn statement_delimiter(&self) -> &str {
        &self.statement_delimiter
    }

    /// Quotes a name only when it is not a plain identifier.
    pub fn escape_object_name(&self, name: &str) -> String {
        if PLAIN_IDENTIFIER.is_match(name) {
            name.to_string()
        } else {
            format!("{}{}{}", self.quote_start, name, self.quote_end)
        }
    }

    /// Resolves a declared column type through the alias table. Only the
    /// base name before any `(` is looked up.
    pub fn data_type(&self, declared: &str) -> String {
        let declared = declared.trim();
        if let Some(actual) = self.type_aliases.get(&declared.to_uppercase()) {
            return actual.clone();
        }
        match declared.split_once('(') {
            Some((base, rest)) => match self.type_aliases.get(&base.trim().to_uppercase()) {
                Some(actual) if !actual.contains('(') => format!("{}({}", actual, rest),
                _ => declared.to_string(),
            },
            None => declared.to_string(),
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::generic()
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}.{}",
            self.short_name, self.major_version, self.minor_version
        )
    }
}
