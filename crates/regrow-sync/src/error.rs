//! Error types for regrow-sync.

use regrow_progress::ProgressError;
use thiserror::Error;

/// Result type for store and cache operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the remote store or the local cache.
///
/// None of these reach the user: loads fall back to defaults and saves are
/// dropped until the next change.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The store answered with a non-success status.
    #[error("store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The store address cannot be turned into an endpoint.
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    /// The response body was not a progress record.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Malformed(e.to_string())
        } else {
            StoreError::Network(e.to_string())
        }
    }
}

/// Errors returned to the presentation layer for a user intent.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The engine rejected the action; state is unchanged.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// The current identity may not act; the user should sign in.
    #[error("login required")]
    LoginRequired,

    /// The session actor has stopped.
    #[error("game session closed")]
    SessionClosed,
}

impl ActionError {
    /// Whether the action was rejected for lack of currency.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            ActionError::Progress(ProgressError::InsufficientFunds { .. })
        )
    }
}
