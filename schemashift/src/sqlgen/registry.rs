use dashmap::DashMap;
use std::collections::BTreeSet;

use super::generators::standard_generators;
use super::{Sql, SqlGenerator, ValidationErrors};
use crate::change::{ChangeOperation, DatabaseObject, OperationKind};
use crate::dialect::Dialect;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};

/// Explicit registry of generator candidates.
///
/// Resolution only depends on the registered candidates and its arguments,
/// so results are memoised per `(kind, dialect)`. Registering a candidate
/// clears the memo.
#[derive(Default)]
pub struct SqlGeneratorRegistry {
    generators: Vec<SqlGenerator>,
    resolved: DashMap<(OperationKind, Dialect), Option<usize>>,
}

impl SqlGeneratorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        SqlGeneratorRegistry::default()
    }

    /// A registry holding every built-in candidate.
    pub fn standard() -> Self {
        let mut registry = SqlGeneratorRegistry::new();
        for generator in standard_generators() {
            registry.register(generator);
        }
        registry
    }

    /// Adds a candidate. Duplicates are allowed; among equal scores the
    /// earlier registration wins.
    pub fn register(&mut self, generator: SqlGenerator) {
        log::debug!(
            "Registering generator {} for {} with priority {}",
            generator.name(),
            generator.operation_kind(),
            generator.priority()
        );
        self.generators.push(generator);
        self.resolved.clear();
    }

    pub fn generators(&self) -> &[SqlGenerator] {
        &self.generators
    }

    /// Every candidate matching `kind` and `dialect`, best first.
    pub fn candidates(&self, kind: OperationKind, dialect: &Dialect) -> Vec<SqlGenerator> {
        let mut matching: Vec<(usize, &SqlGenerator)> = self
            .generators
            .iter()
            .enumerate()
            .filter(|(_, it)| it.operation_kind() == kind && it.supports(dialect))
            .collect();
        // stable sort keeps registration order within a score
        matching.sort_by(|(_, a), (_, b)| b.priority().cmp(&a.priority()));
        matching.into_iter().map(|(_, it)| it.clone()).collect()
    }

    /// Picks the candidate for `operation` on `dialect`.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` when no candidate matches.
    pub fn resolve(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<SqlGenerator> {
        let kind = operation.kind();
        let key = (kind, dialect.clone());
        let index = match self.resolved.get(&key) {
            Some(entry) => *entry,
            None => {
                let index = self.select(kind, dialect);
                self.resolved.insert(key, index);
                index
            }
        };

        match index.and_then(|it| self.generators.get(it)) {
            Some(generator) => Ok(generator.clone()),
            None => {
                log::warn!("No generator for {} on {}", kind, dialect);
                Err(ShiftError::new(
                    &format!("Cannot find generators for {} on {}", kind, dialect),
                    ErrorKind::UnsupportedOperation,
                ))
            }
        }
    }

    fn select(&self, kind: OperationKind, dialect: &Dialect) -> Option<usize> {
        let mut best: Option<(usize, i32)> = None;
        for (index, generator) in self.generators.iter().enumerate() {
            if generator.operation_kind() != kind || !generator.supports(dialect) {
                continue;
            }
            let priority = generator.priority();
            match best {
                Some((_, best_priority)) if priority <= best_priority => {}
                _ => best = Some((index, priority)),
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn supports(&self, operation: &ChangeOperation, dialect: &Dialect) -> bool {
        self.resolve(operation, dialect).is_ok()
    }

    /// Runs the selected candidate's checks.
    pub fn validate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<ValidationErrors> {
        let generator = self.resolve(operation, dialect)?;
        Ok(generator.validate(operation, dialect))
    }

    /// Generates the forward statements for `operation`.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` when nothing matches, `ValidationError` when
    /// the selected candidate rejects the operation.
    pub fn generate(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let generator = self.resolve(operation, dialect)?;
        let validation = generator.validate(operation, dialect);
        for warning in validation.warnings() {
            log::warn!("{}: {}", operation.description(), warning);
        }
        if validation.has_errors() {
            return Err(ShiftError::new(
                &format!(
                    "Invalid {} for {}: {}",
                    operation.kind(),
                    dialect.short_name(),
                    validation
                ),
                ErrorKind::ValidationError,
            ));
        }
        generator.generate(operation, dialect)
    }

    /// Generates the statements that undo `operation`.
    ///
    /// # Errors
    ///
    /// `NonInvertibleChangeSet` when the operation has no inverse, otherwise
    /// whatever generating the inverse operations fails with.
    pub fn generate_rollback(&self, operation: &ChangeOperation, dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
        let inverse = operation.inverse().ok_or_else(|| {
            ShiftError::new(
                &format!("{} cannot be rolled back automatically", operation.description()),
                ErrorKind::NonInvertibleChangeSet,
            )
        })?;

        let mut statements = Vec::new();
        for inverse_operation in &inverse {
            statements.extend(self.generate(inverse_operation, dialect)?);
        }
        Ok(statements)
    }

    /// The objects the generated statements would touch.
    pub fn affected_objects(
        &self,
        operation: &ChangeOperation,
        dialect: &Dialect,
    ) -> ShiftResult<BTreeSet<DatabaseObject>> {
        let statements = self.generate(operation, dialect)?;
        Ok(statements
            .iter()
            .flat_map(|it| it.affected_objects().iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ColumnConfig;
    use crate::common::{PRIORITY_DATABASE, PRIORITY_DEFAULT};
    use crate::dialect::DialectFeature;
    use crate::sqlgen::SqlGeneratorProvider;

    struct FixedGenerator {
        name: &'static str,
        kind: OperationKind,
        priority: i32,
        predicate: fn(&Dialect) -> bool,
    }

    impl SqlGeneratorProvider for FixedGenerator {
        fn name(&self) -> &str {
            self.name
        }

        fn operation_kind(&self) -> OperationKind {
            self.kind
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn supports(&self, dialect: &Dialect) -> bool {
            (self.predicate)(dialect)
        }

        fn validate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ValidationErrors {
            ValidationErrors::new()
        }

        fn generate(&self, _operation: &ChangeOperation, _dialect: &Dialect) -> ShiftResult<Vec<Sql>> {
            Ok(vec![Sql::new(self.name)])
        }
    }

    fn fixed(name: &'static str, priority: i32, predicate: fn(&Dialect) -> bool) -> SqlGenerator {
        SqlGenerator::new(FixedGenerator {
            name,
            kind: OperationKind::AddColumn,
            priority,
            predicate,
        })
    }

    fn add_email() -> ChangeOperation {
        ChangeOperation::add_column("users", vec![ColumnConfig::new("email", "TEXT")])
    }

    #[test]
    fn test_dialect_specific_candidate_wins() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("default", PRIORITY_DEFAULT, |_| true));
        registry.register(fixed("after-aware", PRIORITY_DATABASE, |d| {
            d.supports(DialectFeature::AfterColumn)
        }));

        let resolved = registry.resolve(&add_email(), &Dialect::mysql()).unwrap();
        assert_eq!(resolved.name(), "after-aware");
    }

    #[test]
    fn test_specific_candidate_wins_regardless_of_registration_order() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("after-aware", PRIORITY_DATABASE, |d| {
            d.supports(DialectFeature::AfterColumn)
        }));
        registry.register(fixed("default", PRIORITY_DEFAULT, |_| true));

        let resolved = registry.resolve(&add_email(), &Dialect::h2()).unwrap();
        assert_eq!(resolved.name(), "after-aware");
    }

    #[test]
    fn test_default_used_without_specific_candidate() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("default", PRIORITY_DEFAULT, |_| true));
        registry.register(fixed("after-aware", PRIORITY_DATABASE, |d| {
            d.supports(DialectFeature::AfterColumn)
        }));

        let resolved = registry.resolve(&add_email(), &Dialect::postgresql()).unwrap();
        assert_eq!(resolved.name(), "default");
    }

    #[test]
    fn test_ties_go_to_first_registration() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("first", PRIORITY_DEFAULT, |_| true));
        registry.register(fixed("second", PRIORITY_DEFAULT, |_| true));

        for _ in 0..3 {
            let resolved = registry.resolve(&add_email(), &Dialect::generic()).unwrap();
            assert_eq!(resolved.name(), "first");
        }
        let names: Vec<String> = registry
            .candidates(OperationKind::AddColumn, &Dialect::generic())
            .iter()
            .map(|it| it.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_no_candidate_is_unsupported() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("mysql-only", PRIORITY_DATABASE, |d| {
            d.supports(DialectFeature::TypeRequiredForColumnRename)
        }));

        let err = registry.resolve(&add_email(), &Dialect::generic()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
        assert!(!registry.supports(&add_email(), &Dialect::generic()));
        assert!(registry.supports(&add_email(), &Dialect::mysql()));
    }

    #[test]
    fn test_register_invalidates_memo() {
        let mut registry = SqlGeneratorRegistry::new();
        registry.register(fixed("default", PRIORITY_DEFAULT, |_| true));
        assert_eq!(registry.resolve(&add_email(), &Dialect::generic()).unwrap().name(), "default");

        registry.register(fixed("override", PRIORITY_DATABASE, |_| true));
        assert_eq!(registry.resolve(&add_email(), &Dialect::generic()).unwrap().name(), "override");
    }

    #[test]
    fn test_standard_registry_scenario_add_column_uses_default() {
        let registry = SqlGeneratorRegistry::standard();
        let generator = registry.resolve(&add_email(), &Dialect::postgresql()).unwrap();
        assert_eq!(generator.priority(), PRIORITY_DEFAULT);

        let sql = registry.generate(&add_email(), &Dialect::postgresql()).unwrap();
        assert_eq!(sql[0].text(), "ALTER TABLE users ADD COLUMN email TEXT");
    }

    #[test]
    fn test_generate_refuses_invalid_operation() {
        let registry = SqlGeneratorRegistry::standard();
        let op = ChangeOperation::add_column("", vec![ColumnConfig::new("email", "TEXT")]);
        let err = registry.generate(&op, &Dialect::generic()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_generate_rollback() {
        let registry = SqlGeneratorRegistry::standard();
        let sql = registry.generate_rollback(&add_email(), &Dialect::generic()).unwrap();
        assert_eq!(sql[0].text(), "ALTER TABLE users DROP COLUMN email");

        let err = registry
            .generate_rollback(&ChangeOperation::drop_table("users"), &Dialect::generic())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NonInvertibleChangeSet);
    }

    #[test]
    fn test_affected_objects() {
        let registry = SqlGeneratorRegistry::standard();
        let objects = registry.affected_objects(&add_email(), &Dialect::generic()).unwrap();
        assert!(objects.contains(&DatabaseObject::column("users", "email")));
    }
}
