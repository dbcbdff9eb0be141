use std::fmt::{Display, Formatter};

use super::{Contexts, LabelExpression};

/// What a run selects from a changelog: the requested contexts and a label
/// filter.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::changelog::{Contexts, LabelExpression, RunFilter};
///
/// let filter = RunFilter::new(Contexts::new(["prod"]))
///     .with_labels(LabelExpression::parse("@billing")?);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    contexts: Contexts,
    labels: LabelExpression,
}

impl RunFilter {
    pub fn new(contexts: Contexts) -> Self {
        RunFilter {
            contexts,
            labels: LabelExpression::none(),
        }
    }

    /// No contexts and no label filter: only changesets without a context
    /// restriction run.
    pub fn none() -> Self {
        RunFilter::default()
    }

    pub fn with_labels(mut self, labels: LabelExpression) -> Self {
        self.labels = labels;
        self
    }

    pub fn contexts(&self) -> &Contexts {
        &self.contexts
    }

    pub fn labels(&self) -> &LabelExpression {
        &self.labels
    }
}

impl From<Contexts> for RunFilter {
    fn from(contexts: Contexts) -> Self {
        RunFilter::new(contexts)
    }
}

impl Display for RunFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "contexts [{}], labels [{}]", self.contexts, self.labels)
    }
}
