use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use crate::errors::{ErrorKind, ShiftError, ShiftResult};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(|\)|!|,|[^\s(),!]+").expect("context token pattern is valid")
});

/// The set of contexts requested for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contexts {
    names: BTreeSet<String>,
}

impl Contexts {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Contexts {
            names: names
                .into_iter()
                .map(|it| it.as_ref().trim().to_lowercase())
                .filter(|it| !it.is_empty())
                .collect(),
        }
    }

    /// No context requested: only unrestricted changesets run.
    pub fn none() -> Self {
        Contexts::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }
}

impl Display for Contexts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.names.iter().map(|it| it.as_str()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Parsed form shared by context and label expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ContextNode {
    Name(String),
    Not(Box<ContextNode>),
    And(Vec<ContextNode>),
    Or(Vec<ContextNode>),
}

impl ContextNode {
    /// Parses `text`, `None` when it holds no tokens. `what` names the
    /// expression in error messages.
    pub(super) fn parse(text: &str, what: &'static str) -> ShiftResult<Option<ContextNode>> {
        let tokens: Vec<String> = TOKEN
            .find_iter(text)
            .map(|it| it.as_str().to_lowercase())
            .collect();
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut parser = Parser {
            tokens: &tokens,
            position: 0,
            source: text,
            what,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(&format!("unexpected '{}'", token)));
        }
        Ok(Some(root))
    }

    fn evaluate(&self, requested: &Contexts) -> bool {
        match self {
            ContextNode::Name(name) => requested.contains(name),
            ContextNode::Not(inner) => !inner.evaluate(requested),
            ContextNode::And(nodes) => nodes.iter().all(|it| it.evaluate(requested)),
            ContextNode::Or(nodes) => nodes.iter().any(|it| it.evaluate(requested)),
        }
    }
}

/// A changeset's context restriction.
///
/// Names combine with `,` or `or`, `and`, `!` or `not`, and parentheses;
/// `and` binds tighter than `or`. Matching ignores case.
///
/// An empty expression matches every run. A non-empty expression never
/// matches a run that requested no contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextExpression {
    source: String,
    root: Option<ContextNode>,
}

impl ContextExpression {
    pub fn parse(text: &str) -> ShiftResult<ContextExpression> {
        let root = ContextNode::parse(text, "context")?;
        Ok(ContextExpression {
            source: if root.is_some() { text.trim().to_string() } else { String::new() },
            root,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn matches(&self, requested: &Contexts) -> bool {
        match &self.root {
            None => true,
            Some(_) if requested.is_empty() => false,
            Some(root) => root.evaluate(requested),
        }
    }
}

impl Display for ContextExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct Parser<'a> {
    tokens: &'a [String],
    position: usize,
    source: &'a str,
    what: &'static str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.position).map(|it| it.as_str())
    }

    fn advance(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.position).map(|it| it.as_str());
        self.position += 1;
        token
    }

    fn error(&self, detail: &str) -> ShiftError {
        ShiftError::new(
            &format!("Invalid {} expression '{}': {}", self.what, self.source, detail),
            ErrorKind::ValidationError,
        )
    }

    fn parse_or(&mut self) -> ShiftResult<ContextNode> {
        let mut nodes = vec![self.parse_and()?];
        while matches!(self.peek(), Some(",") | Some("or")) {
            self.advance();
            nodes.push(self.parse_and()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            ContextNode::Or(nodes)
        })
    }

    fn parse_and(&mut self) -> ShiftResult<ContextNode> {
        let mut nodes = vec![self.parse_unary()?];
        while self.peek() == Some("and") {
            self.advance();
            nodes.push(self.parse_unary()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            ContextNode::And(nodes)
        })
    }

    fn parse_unary(&mut self) -> ShiftResult<ContextNode> {
        match self.advance() {
            Some("!") | Some("not") => Ok(ContextNode::Not(Box::new(self.parse_unary()?))),
            Some("(") => {
                let node = self.parse_or()?;
                match self.advance() {
                    Some(")") => Ok(node),
                    _ => Err(self.error("missing ')'")),
                }
            }
            Some(token @ (")" | "," | "and" | "or")) => {
                Err(self.error(&format!("unexpected '{}'", token)))
            }
            Some(name) => Ok(ContextNode::Name(name.to_string())),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(text: &str) -> ContextExpression {
        ContextExpression::parse(text).unwrap()
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        let e = expr("  ");
        assert!(e.is_empty());
        assert!(e.matches(&Contexts::none()));
        assert!(e.matches(&Contexts::new(["prod"])));
    }

    #[test]
    fn test_restricted_changeset_skipped_without_requested_contexts() {
        assert!(!expr("prod").matches(&Contexts::none()));
    }

    #[test]
    fn test_comma_and_or_are_alternatives() {
        let requested = Contexts::new(["test"]);
        assert!(expr("prod, test").matches(&requested));
        assert!(expr("prod or test").matches(&requested));
        assert!(!expr("prod, qa").matches(&requested));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let requested = Contexts::new(["a"]);
        assert!(expr("a or b and c").matches(&requested));
        assert!(!expr("(a or b) and c").matches(&requested));
    }

    #[test]
    fn test_negation() {
        let requested = Contexts::new(["prod"]);
        assert!(!expr("!prod").matches(&requested));
        assert!(expr("not test").matches(&requested));
        assert!(expr("prod and !test").matches(&requested));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(expr("PROD").matches(&Contexts::new(["Prod"])));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(ContextExpression::parse("(prod").is_err());
        assert!(ContextExpression::parse("prod and").is_err());
        assert!(ContextExpression::parse("prod)").is_err());
        let err = ContextExpression::parse(", prod").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
