//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(PathBuf),

    #[error("invalid snapshot {path}: {message}")]
    InvalidSnapshot { path: PathBuf, message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// Whether the error comes from corrupt or unreadable snapshot data.
    pub fn is_data_error(&self) -> bool {
        match self {
            ApplicationError::Domain(e) => e.is_integrity(),
            ApplicationError::InvalidSnapshot { .. } => true,
            _ => false,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
