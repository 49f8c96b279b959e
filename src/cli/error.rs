//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Editor { .. } => crate::exitcode::SOFTWARE,
                InfraError::Application(app) => match app {
                    _ if app.is_data_error() => crate::exitcode::DATAERR,
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::SnapshotNotFound(_) => crate::exitcode::NOINPUT,
                    ApplicationError::Domain(DomainError::UnknownDistributor(_)) => {
                        crate::exitcode::USAGE
                    }
                    ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
                    _ => crate::exitcode::SOFTWARE,
                },
            },
        }
    }
}
