//! Error types for pathdb.
//!
//! All errors in pathdb are strongly typed using thiserror.
//! Every family is `Clone` so a single failure (for example a lost worker
//! transport) can be delivered to many outstanding calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Path cannot be empty")]
    EmptyPath,

    #[error("Path segment at position {position} is empty")]
    EmptySegment {
        position: usize,
    },

    #[error("Path segment '{segment}' contains the separator '/'")]
    SeparatorInSegment {
        segment: String,
    },

    #[error("Numeric segment {index} at position {position} is not allowed in a node path")]
    NumericSegment {
        index: u64,
        position: usize,
    },

    #[error("Operation '{operation}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid argument for '{operation}': {reason}")]
    InvalidArgument {
        operation: String,
        reason: String,
    },
}

/// State errors for builders and database handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Batch has already been committed")]
    AlreadyCommitted,

    #[error("Database '{name}' is closed")]
    DatabaseClosed {
        name: String,
    },
}

/// Errors raised by dispatchers and handler tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown operation: {operation}")]
    UnknownOperation {
        operation: String,
    },

    #[error("A handler for '{operation}' is already registered")]
    DuplicateHandler {
        operation: String,
    },
}

/// Errors at the boundary between a dispatcher and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Pending operation aborted: {reason}")]
    Aborted {
        reason: String,
    },

    #[error("Failed to send request: {message}")]
    SendFailed {
        message: String,
    },

    #[error("Failed to encode message: {message}")]
    Encode {
        message: String,
    },

    #[error("Failed to decode message: {message}")]
    Decode {
        message: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Errors reported by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("No entry contains path '{path}'")]
    MissingEntry {
        path: String,
    },

    #[error("Cannot address '{segment}' inside a {found} value at '{path}'")]
    TypeMismatch {
        path: String,
        segment: String,
        found: &'static str,
    },

    #[error("Index {index} is out of bounds for list of length {len} at '{path}'")]
    IndexOutOfBounds {
        path: String,
        index: u64,
        len: usize,
    },

    #[error("Cannot write '{path}' below the existing leaf '{leaf}'")]
    NestedLeaf {
        path: String,
        leaf: String,
    },

    #[error("Invalid entry key '{key}'")]
    InvalidKey {
        key: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Poisoned lock: {0}")]
    PoisonedLock(&'static str),
}

/// Plain error record carried across the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorRecord {
    /// Creates a record without a stack.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }
}

/// Top-level error type for pathdb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathDbError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Operation was canceled")]
    Canceled,

    #[error("{}: {}", .0.name, .0.message)]
    Remote(ErrorRecord),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl PathDbError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a state error.
    #[must_use]
    pub const fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }

    /// Returns true if this is a dispatch error.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an orderly cancellation.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Stable name of the error family, used as `ErrorRecord::name`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::State(_) => "StateError",
            Self::Dispatch(_) => "DispatchError",
            Self::Transport(_) => "TransportError",
            Self::Storage(_) => "StorageError",
            Self::Canceled => "CanceledError",
            Self::Remote(record) => &record.name,
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Reduces this error to the record shape that crosses the boundary.
    #[must_use]
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            Self::Remote(record) => record.clone(),
            Self::Validation(e) => ErrorRecord::new(self.name(), e.to_string()),
            Self::State(e) => ErrorRecord::new(self.name(), e.to_string()),
            Self::Dispatch(e) => ErrorRecord::new(self.name(), e.to_string()),
            Self::Transport(e) => ErrorRecord::new(self.name(), e.to_string()),
            Self::Storage(e) => ErrorRecord::new(self.name(), e.to_string()),
            Self::Canceled | Self::Internal { .. } => {
                ErrorRecord::new(self.name(), self.to_string())
            }
        }
    }
}

impl From<ErrorRecord> for PathDbError {
    /// Cancellation keeps its own kind across the boundary; every other
    /// record becomes [`PathDbError::Remote`].
    fn from(record: ErrorRecord) -> Self {
        if record.name == "CanceledError" {
            Self::Canceled
        } else {
            Self::Remote(record)
        }
    }
}

/// Result type alias for pathdb operations.
pub type PathDbResult<T> = Result<T, PathDbError>;
