//! Error types for regrow-progress.

use thiserror::Error;

/// Result type for progression operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors returned by the progression engine.
///
/// A failed action never mutates state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressError {
    /// The balance does not cover the cost of the action.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// The action parameters are out of range (zero cost, non-positive delta).
    #[error("invalid action: {0}")]
    InvalidAction(String),
}
