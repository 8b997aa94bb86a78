use std::result::Result as StdResult;

use thiserror::Error;

/// Errors that can occur while paging a listing.
///
/// `Clone` because a single load-more result is shared between every caller
/// that joined the in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PagerError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Source error in {context}: {message}")]
    Source { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PagerError {
    /// Whether this error is a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether a retry of the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Source { .. })
    }
}

pub type Result<T> = StdResult<T, PagerError>;
