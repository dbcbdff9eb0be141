use std::fmt::{Display, Formatter};

use crate::dialect::Dialect;

/// Outcome of checking an operation against a dialect.
///
/// Errors block generation; warnings are reported and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn check_required_field(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add_error(&format!("{} is required", field));
        }
    }

    pub fn check_required_list<T>(&mut self, field: &str, values: &[T]) {
        if values.is_empty() {
            self.add_error(&format!("{} is required", field));
        }
    }

    /// Records an error when `present` holds, naming the dialect.
    pub fn check_disallowed_field(&mut self, field: &str, present: bool, dialect: &Dialect) {
        if present {
            self.add_error(&format!(
                "{} is not allowed on {}",
                field,
                dialect.short_name()
            ));
        }
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}
