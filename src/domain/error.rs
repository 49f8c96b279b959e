//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent structural violations of the genealogy.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("distributor {id} references unknown placement: {placement_id}")]
    UnknownPlacement { id: String, placement_id: String },

    #[error("no root distributor found among {count} records")]
    MissingRoot { count: usize },

    #[error("multiple root distributors found: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("cycle detected in placement tree at: {0}")]
    CycleDetected(String),

    #[error("distributor not found: {0}")]
    UnknownDistributor(String),

    #[error("invalid rank ladder: {0}")]
    InvalidRankLadder(String),
}

impl DomainError {
    /// Whether the error describes corrupt snapshot data rather than bad setup.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownPlacement { .. }
                | DomainError::MissingRoot { .. }
                | DomainError::MultipleRoots(_)
                | DomainError::CycleDetected(_)
        )
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
