use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for schemashift operations
///
/// Each kind names one category of failure so callers can decide how to
/// react without parsing messages. The first six mirror the failure
/// taxonomy of a run; the rest cover store and configuration problems.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::errors::{ShiftError, ErrorKind, ShiftResult};
///
/// fn example() -> ShiftResult<()> {
///     Err(ShiftError::new("lock not granted", ErrorKind::LockTimeout))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Input rejected before any statement ran (missing fields, disallowed combinations)
    ValidationError,
    /// A ran changeset no longer matches its recorded checksum
    ChecksumMismatch,
    /// No generator candidate can express the operation for the dialect
    UnsupportedOperation,
    /// The changelog lock was not granted within the wait timeout
    LockTimeout,
    /// The lock table could not be read or updated
    LockError,
    /// A statement failed at the store
    ExecutionFailure,
    /// A changeset selected for rollback cannot be reversed
    NonInvertibleChangeSet,
    /// The rollback target (tag, date) does not select anything in history
    RollbackTargetNotFound,
    /// Two changesets in one run share the same identity
    DuplicateChangeSet,
    /// Error reported by the storage backend
    BackendError,
    /// Error encoding or decoding data
    EncodingError,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::ChecksumMismatch => write!(f, "Checksum mismatch"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation for dialect"),
            ErrorKind::LockTimeout => write!(f, "Lock timeout"),
            ErrorKind::LockError => write!(f, "Lock error"),
            ErrorKind::ExecutionFailure => write!(f, "Execution failure"),
            ErrorKind::NonInvertibleChangeSet => write!(f, "Non-invertible changeset"),
            ErrorKind::RollbackTargetNotFound => write!(f, "Rollback target not found"),
            ErrorKind::DuplicateChangeSet => write!(f, "Duplicate changeset"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom schemashift error type.
///
/// `ShiftError` carries a message, a kind, an optional cause and the
/// backtrace captured where it was created.
///
/// # Examples
///
/// ```rust,ignore
/// use schemashift::errors::{ShiftError, ErrorKind};
///
/// let cause = ShiftError::new("no such table: users", ErrorKind::BackendError);
/// let err = ShiftError::new_with_cause("changeset 1::bob failed", ErrorKind::ExecutionFailure, cause);
/// ```
#[derive(Clone)]
pub struct ShiftError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<ShiftError>>,
    backtrace: Atomic<Backtrace>,
}

impl ShiftError {
    /// Creates a new `ShiftError` with the specified message and error kind.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ShiftError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `ShiftError` that wraps an underlying cause.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error that caused this error
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: ShiftError) -> Self {
        ShiftError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&ShiftError> {
        self.cause.as_deref()
    }

    /// Walks the cause chain and returns the innermost error.
    pub fn root_cause(&self) -> &ShiftError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for ShiftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ShiftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for ShiftError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for schemashift operations.
pub type ShiftResult<T> = Result<T, ShiftError>;

impl From<std::io::Error> for ShiftError {
    fn from(err: std::io::Error) -> Self {
        ShiftError::new(&format!("IO error: {}", err), ErrorKind::BackendError)
    }
}

impl From<serde_json::Error> for ShiftError {
    fn from(err: serde_json::Error) -> Self {
        ShiftError::new(
            &format!("Serialization error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<chrono::ParseError> for ShiftError {
    fn from(err: chrono::ParseError) -> Self {
        ShiftError::new(
            &format!("Timestamp parsing error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::num::ParseIntError> for ShiftError {
    fn from(err: std::num::ParseIntError) -> Self {
        ShiftError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for ShiftError {
    fn from(msg: String) -> Self {
        ShiftError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for ShiftError {
    fn from(msg: &str) -> Self {
        ShiftError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_error() {
        let error = ShiftError::new("lock not granted", ErrorKind::LockTimeout);
        assert_eq!(error.message(), "lock not granted");
        assert_eq!(error.kind(), &ErrorKind::LockTimeout);
        assert!(error.cause().is_none());
    }

    #[test]
    fn test_new_with_cause_keeps_chain() {
        let cause = ShiftError::new("no such table: users", ErrorKind::BackendError);
        let error = ShiftError::new_with_cause(
            "changeset failed",
            ErrorKind::ExecutionFailure,
            cause,
        );
        assert_eq!(error.kind(), &ErrorKind::ExecutionFailure);
        assert_eq!(error.cause().map(|c| c.message()), Some("no such table: users"));
        assert_eq!(error.root_cause().kind(), &ErrorKind::BackendError);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_display_is_message_only() {
        let error = ShiftError::new("boom", ErrorKind::InternalError);
        assert_eq!(format!("{}", error), "boom");
    }

    #[test]
    fn test_debug_prints_cause() {
        let cause = ShiftError::new("inner", ErrorKind::BackendError);
        let error = ShiftError::new_with_cause("outer", ErrorKind::ExecutionFailure, cause);
        let debug = format!("{:?}", error);
        assert!(debug.contains("outer"));
        assert!(debug.contains("Caused by: inner"));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ChecksumMismatch.to_string(), "Checksum mismatch");
        assert_eq!(
            ErrorKind::UnsupportedOperation.to_string(),
            "Unsupported operation for dialect"
        );
        assert_eq!(ErrorKind::NonInvertibleChangeSet.to_string(), "Non-invertible changeset");
    }

    #[test]
    fn test_from_io_error() {
        let err: ShiftError = std::io::Error::other("disk").into();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
        assert!(err.message().contains("disk"));
    }

    #[test]
    fn test_from_string() {
        let err: ShiftError = "plain".to_string().into();
        assert_eq!(err.kind(), &ErrorKind::InternalError);
    }
}
