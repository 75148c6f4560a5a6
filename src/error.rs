// Errors reported back to the presentation layer

use thiserror::Error;

/// Rejected input. The store is left untouched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Invalid filter: {0} (expected all, active or completed)")]
    InvalidFilter(String),

    #[error("No task ids left to assign")]
    IdsExhausted,
}
