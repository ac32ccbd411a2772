//! Error types for optx-feed.

use std::time::Duration;
use thiserror::Error;

/// Feed error types.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Quote source rate limited us; retry after the given delay.
    #[error("Rate limited; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed chain payload: {0}")]
    Payload(String),
}

/// Result type alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
