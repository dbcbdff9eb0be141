use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use super::{ChangeSetKey, CheckSum};
use crate::errors::{ErrorKind, ShiftError};

/// How a history row came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecType {
    Executed,
    Failed,
    Skipped,
    Reran,
    MarkRan,
}

impl ExecType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecType::Executed => "EXECUTED",
            ExecType::Failed => "FAILED",
            ExecType::Skipped => "SKIPPED",
            ExecType::Reran => "RERAN",
            ExecType::MarkRan => "MARK_RAN",
        }
    }
}

impl Display for ExecType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExecType {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EXECUTED" => Ok(ExecType::Executed),
            "FAILED" => Ok(ExecType::Failed),
            "SKIPPED" => Ok(ExecType::Skipped),
            "RERAN" => Ok(ExecType::Reran),
            "MARK_RAN" => Ok(ExecType::MarkRan),
            other => Err(ShiftError::new(
                &format!("Unknown exec type '{}'", other),
                ErrorKind::EncodingError,
            )),
        }
    }
}

/// A row of the change history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RanChangeSet {
    key: ChangeSetKey,
    checksum: Option<CheckSum>,
    executed_at: DateTime<Utc>,
    order_executed: i64,
    exec_type: ExecType,
    description: Option<String>,
    tag: Option<String>,
    deployment_id: Option<String>,
}

impl RanChangeSet {
    pub fn new(
        key: ChangeSetKey,
        checksum: Option<CheckSum>,
        executed_at: DateTime<Utc>,
        order_executed: i64,
        exec_type: ExecType,
    ) -> Self {
        RanChangeSet {
            key,
            checksum,
            executed_at,
            order_executed,
            exec_type,
            description: None,
            tag: None,
            deployment_id: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_deployment_id(mut self, deployment_id: Option<String>) -> Self {
        self.deployment_id = deployment_id;
        self
    }

    pub fn key(&self) -> &ChangeSetKey {
        &self.key
    }

    pub fn checksum(&self) -> Option<&CheckSum> {
        self.checksum.as_ref()
    }

    pub fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    pub fn order_executed(&self) -> i64 {
        self.order_executed
    }

    pub fn exec_type(&self) -> ExecType {
        self.exec_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn deployment_id(&self) -> Option<&str> {
        self.deployment_id.as_deref()
    }

    pub(crate) fn set_checksum(&mut self, checksum: Option<CheckSum>) {
        self.checksum = checksum;
    }

    pub(crate) fn set_tag(&mut self, tag: &str) {
        self.tag = Some(tag.to_string());
    }
}
