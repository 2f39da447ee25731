use std::fmt;

use crate::storage::StorageError;

/// Top-level error type for the orchestration core.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// A referenced orchestration or operation does not exist.
    NotFound(String),
    /// The caller supplied an invalid request.
    BadRequest(String),
    /// The storage backend failed for a reason other than not-found.
    StorageError(String),
    /// The operation executor reported a failure.
    ExecutorError(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::NotFound(msg) => write!(f, "Not found: {msg}"),
            OrchestratorError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            OrchestratorError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            OrchestratorError::ExecutorError(msg) => write!(f, "Executor error: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<StorageError> for OrchestratorError {
    fn from(error: StorageError) -> Self {
        if error.is_not_found() {
            OrchestratorError::NotFound(error.to_string())
        } else {
            OrchestratorError::StorageError(error.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err: OrchestratorError = StorageError::not_found("orchestration", "o-1").into();
        assert!(matches!(err, OrchestratorError::NotFound(_)));

        let err: OrchestratorError = StorageError::Backend("boom".into()).into();
        assert!(matches!(err, OrchestratorError::StorageError(_)));
    }
}
