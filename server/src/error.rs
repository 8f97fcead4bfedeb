//! Error taxonomy for engine operations and the store underneath them.

use shared::{ErrorKind, WireError};
use thiserror::Error;

/// Failures surfaced by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer committed between our read and our write.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    Missing(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a single engine operation. Any error means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("caller identity is missing")]
    Unauthenticated,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("games need between 5 and 10 players, got {0}")]
    InvalidConfiguration(usize),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    ResourceExhausted(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("cannot draw {requested} cards, only {remaining} left")]
    EmptyDeck { requested: usize, remaining: usize },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Unauthenticated => ErrorKind::Unauthenticated,
            EngineError::InvalidArgument(_) | EngineError::InvalidConfiguration(_) => {
                ErrorKind::InvalidArgument
            }
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            EngineError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            EngineError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            EngineError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            EngineError::EmptyDeck { .. } => ErrorKind::EmptyDeck,
            EngineError::Internal(_) | EngineError::Store(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        EngineError::FailedPrecondition(message.into())
    }

    pub(crate) fn denied(message: impl Into<String>) -> Self {
        EngineError::PermissionDenied(message.into())
    }
}

impl From<EngineError> for WireError {
    fn from(err: EngineError) -> Self {
        WireError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
