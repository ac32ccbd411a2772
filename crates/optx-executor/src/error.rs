//! Error types for optx-executor.

use thiserror::Error;

/// Executor error types.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown order id: {0}")]
    UnknownOrder(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] optx_core::CoreError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Broker error: {0}")]
    Broker(String),
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Result type alias for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
