//! Error types.

use thiserror::Error;

use crate::models::TaskId;

/// Failure reported by a persistence adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("adapter error{}: {}", .status.map(|s| format!(" ({s})")).unwrap_or_default(), .message)]
pub struct AdapterError {
    pub message: String,
    /// Transport status, when the adapter has one.
    pub status: Option<u16>,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Errors returned by edit operations.
///
/// Whenever an operation returns `Err`, the task store has been restored to
/// its state before the operation began.
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task id {0} is already in use")]
    DuplicateTaskId(TaskId),

    #[error("a save is in flight; edits are blocked until it resolves")]
    SaveInFlight,

    #[error("a link validation decision is pending")]
    ValidationPending,

    #[error("no edit is waiting for a link validation decision")]
    NoPendingValidation,

    #[error("linking {from} to {to} would create a dependency cycle")]
    CyclicDependency { from: TaskId, to: TaskId },

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("{0} is not available in resource view")]
    UnsupportedInResourceView(&'static str),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl EditError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
