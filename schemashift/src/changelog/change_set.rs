use std::fmt::{Display, Formatter};

use super::{CheckSum, ContextExpression, Labels, ValidCheckSum};
use crate::change::ChangeOperation;
use crate::errors::ShiftResult;

/// Natural key of a changeset: `(id, author, source path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeSetKey {
    id: String,
    author: String,
    path: String,
}

impl ChangeSetKey {
    pub fn new(id: &str, author: &str, path: &str) -> Self {
        ChangeSetKey {
            id: id.to_string(),
            author: author.to_string(),
            path: path.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for ChangeSetKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.path, self.id, self.author)
    }
}

/// One identified, atomic unit of schema change.
///
/// Built once (normally by a changelog parser) and treated as immutable
/// afterwards; the builder methods consume `self`.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::change::{ChangeOperation, ColumnConfig};
/// use schemashift::changelog::ChangeSet;
///
/// let change_set = ChangeSet::new("1", "bob", "db/changelog.yaml")
///     .add_operation(ChangeOperation::create_table(
///         "users",
///         vec![ColumnConfig::new("id", "INTEGER").primary_key()],
///     ));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    key: ChangeSetKey,
    operations: Vec<ChangeOperation>,
    context: ContextExpression,
    labels: Labels,
    always_run: bool,
    run_on_change: bool,
    rollback: Option<String>,
    comments: Option<String>,
    valid_checksums: Vec<ValidCheckSum>,
}

impl ChangeSet {
    pub fn new(id: &str, author: &str, path: &str) -> Self {
        ChangeSet {
            key: ChangeSetKey::new(id, author, path),
            operations: Vec::new(),
            context: ContextExpression::default(),
            labels: Labels::default(),
            always_run: false,
            run_on_change: false,
            rollback: None,
            comments: None,
            valid_checksums: Vec::new(),
        }
    }

    pub fn add_operation(mut self, operation: ChangeOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn context(mut self, context: ContextExpression) -> Self {
        self.context = context;
        self
    }

    /// Labels matched against a run's label expression. They do not take
    /// part in the checksum.
    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn always_run(mut self, always_run: bool) -> Self {
        self.always_run = always_run;
        self
    }

    pub fn run_on_change(mut self, run_on_change: bool) -> Self {
        self.run_on_change = run_on_change;
        self
    }

    /// Literal rollback statements, used verbatim instead of derived inverses.
    pub fn rollback_sql(mut self, sql: &str) -> Self {
        self.rollback = Some(sql.to_string());
        self
    }

    pub fn comments(mut self, comments: &str) -> Self {
        self.comments = Some(comments.to_string());
        self
    }

    pub fn valid_checksum(mut self, checksum: ValidCheckSum) -> Self {
        self.valid_checksums.push(checksum);
        self
    }

    pub fn key(&self) -> &ChangeSetKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn author(&self) -> &str {
        self.key.author()
    }

    pub fn path(&self) -> &str {
        self.key.path()
    }

    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }

    pub fn context_expression(&self) -> &ContextExpression {
        &self.context
    }

    pub fn get_labels(&self) -> &Labels {
        &self.labels
    }

    pub fn is_always_run(&self) -> bool {
        self.always_run
    }

    pub fn is_run_on_change(&self) -> bool {
        self.run_on_change
    }

    pub fn rollback_text(&self) -> Option<&str> {
        self.rollback.as_deref()
    }

    pub fn get_comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn valid_checksums(&self) -> &[ValidCheckSum] {
        &self.valid_checksums
    }

    /// Hash over the serialized operations in declaration order.
    ///
    /// Every operation is hashed on its own and the digests are joined with
    /// `:` before the final hash, so both content and order count.
    pub fn checksum(&self) -> ShiftResult<CheckSum> {
        let mut input = String::new();
        for operation in &self.operations {
            let text = operation.checksum_text()?;
            input.push_str(&CheckSum::compute(&text).to_string());
            input.push(':');
        }
        Ok(CheckSum::compute(&input))
    }

    /// Whether `stored` is acceptable for this changeset as it is now.
    pub fn is_checksum_valid(&self, stored: &CheckSum) -> ShiftResult<bool> {
        if self.valid_checksums.iter().any(|it| it.accepts(stored)) {
            return Ok(true);
        }
        Ok(&self.checksum()? == stored)
    }

    pub fn description(&self) -> String {
        self.operations
            .iter()
            .map(|it| it.description())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Tag declared by a tag database operation, the last one wins.
    pub fn declared_tag(&self) -> Option<&str> {
        self.operations.iter().rev().find_map(|it| match it {
            ChangeOperation::TagDatabase { tag } => Some(tag.as_str()),
            _ => None,
        })
    }
}

impl Display for ChangeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}
