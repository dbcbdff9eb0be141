use serde::Serialize;

/// Definition of a column as used by create table and add column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnConfig {
    name: String,
    data_type: String,
    nullable: bool,
    primary_key: bool,
    unique: bool,
    auto_increment: bool,
    default_value: Option<String>,
    after_column: Option<String>,
}

impl ColumnConfig {
    pub fn new(name: &str, data_type: &str) -> Self {
        ColumnConfig {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default_value: None,
            after_column: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as primary key. Primary key columns are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the default value. The text is emitted as-is, so string
    /// literals must carry their own quotes.
    pub fn default_value(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    /// Positions the new column after an existing one (add column only).
    pub fn after(mut self, column: &str) -> Self {
        self.after_column = Some(column.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn get_default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn after_column(&self) -> Option<&str> {
        self.after_column.as_deref()
    }
}
