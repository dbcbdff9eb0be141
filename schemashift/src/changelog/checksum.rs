use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

use crate::common::CURRENT_CHECKSUM_VERSION;
use crate::errors::{ErrorKind, ShiftError, ShiftResult};

/// A versioned content hash, rendered as `<version>:<hex digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckSum {
    version: u32,
    value: String,
}

impl CheckSum {
    /// Hashes `text` with the current algorithm.
    pub fn compute(text: &str) -> CheckSum {
        let digest = Sha256::digest(text.as_bytes());
        CheckSum {
            version: CURRENT_CHECKSUM_VERSION,
            value: hex::encode(digest),
        }
    }

    /// Parses a stored checksum. Values without a version prefix predate
    /// versioning and are read as version 1.
    pub fn parse(text: &str) -> ShiftResult<CheckSum> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ShiftError::new(
                "Checksum text cannot be empty",
                ErrorKind::EncodingError,
            ));
        }

        match text.split_once(':') {
            Some((version, value)) => {
                let version = version.parse::<u32>().map_err(|e| {
                    ShiftError::new(
                        &format!("Invalid checksum version in '{}': {}", text, e),
                        ErrorKind::EncodingError,
                    )
                })?;
                Ok(CheckSum {
                    version,
                    value: value.to_string(),
                })
            }
            None => Ok(CheckSum {
                version: 1,
                value: text.to_string(),
            }),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_current(&self) -> bool {
        self.version == CURRENT_CHECKSUM_VERSION
    }
}

impl Display for CheckSum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.version, self.value)
    }
}

/// An additional checksum a changeset declares acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidCheckSum {
    /// Accept whatever is recorded.
    Any,
    Exact(CheckSum),
}

impl ValidCheckSum {
    /// Parses `ANY` (also `1:any`, `1:all`, `1:*`) or a concrete checksum.
    pub fn parse(text: &str) -> ShiftResult<ValidCheckSum> {
        let lowered = text.trim().to_lowercase();
        match lowered.as_str() {
            "any" | "1:any" | "1:all" | "1:*" => Ok(ValidCheckSum::Any),
            _ => Ok(ValidCheckSum::Exact(CheckSum::parse(text)?)),
        }
    }

    pub fn accepts(&self, stored: &CheckSum) -> bool {
        match self {
            ValidCheckSum::Any => true,
            ValidCheckSum::Exact(checksum) => checksum == stored,
        }
    }
}
