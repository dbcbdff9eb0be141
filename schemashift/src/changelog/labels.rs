use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use super::context::ContextNode;
use crate::errors::ShiftResult;

/// Labels attached to a changeset. Names are split on `,` and compared
/// ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    names: BTreeSet<String>,
}

impl Labels {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Labels {
            names: names
                .into_iter()
                .flat_map(|it| {
                    it.as_ref()
                        .split(',')
                        .map(|name| name.trim().to_lowercase())
                        .collect::<Vec<_>>()
                })
                .filter(|it| !it.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }
}

impl Display for Labels {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.names.iter().map(|it| it.as_str()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// The label filter of a run, in the same syntax as a context expression.
///
/// A changeset without labels passes every plain name. A name written as
/// `@name` is required: it only holds for a changeset that carries it, so an
/// unlabeled changeset fails it. An empty expression accepts everything.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::changelog::{LabelExpression, Labels};
///
/// let filter = LabelExpression::parse("@billing, reports")?;
/// assert!(filter.matches(&Labels::default()));
/// assert!(!LabelExpression::parse("@billing")?.matches(&Labels::default()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelExpression {
    source: String,
    root: Option<ContextNode>,
}

impl LabelExpression {
    pub fn parse(text: &str) -> ShiftResult<LabelExpression> {
        let root = ContextNode::parse(text, "label")?;
        Ok(LabelExpression {
            source: if root.is_some() { text.trim().to_string() } else { String::new() },
            root,
        })
    }

    /// No label filter.
    pub fn none() -> Self {
        LabelExpression::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match &self.root {
            None => true,
            Some(root) => accepts(root, labels),
        }
    }
}

impl Display for LabelExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn accepts(node: &ContextNode, labels: &Labels) -> bool {
    match node {
        ContextNode::Name(name) => {
            let (required, name) = match name.strip_prefix('@') {
                Some(stripped) => (true, stripped),
                None => (false, name.as_str()),
            };
            if labels.is_empty() {
                !required
            } else {
                labels.contains(name)
            }
        }
        // negation never excludes an unlabeled changeset
        ContextNode::Not(inner) if labels.is_empty() => accepts(inner, labels),
        ContextNode::Not(inner) => !accepts(inner, labels),
        ContextNode::And(nodes) => nodes.iter().all(|it| accepts(it, labels)),
        ContextNode::Or(nodes) => nodes.iter().any(|it| accepts(it, labels)),
    }
}
