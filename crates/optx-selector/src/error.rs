//! Error types for optx-selector.

use thiserror::Error;

/// Selector error types.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("Unknown selector: {0}")]
    UnknownSelector(String),
}

/// Result type alias for selector operations.
pub type SelectorResult<T> = std::result::Result<T, SelectorError>;
