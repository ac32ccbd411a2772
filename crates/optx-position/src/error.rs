//! Error types for optx-position.

use thiserror::Error;

/// Position error types.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Unknown position: {0}")]
    UnknownPosition(String),

    #[error("Position {0} is closed")]
    PositionClosed(String),

    #[error("Invalid quantity: requested {requested}, open {open}")]
    InvalidQuantity { requested: u32, open: u32 },

    #[error("Order not filled: {0}")]
    NotFilled(String),

    #[error(transparent)]
    Selector(#[from] optx_selector::SelectorError),

    #[error(transparent)]
    Executor(#[from] optx_executor::ExecutorError),

    /// The fill is committed at the broker but not recorded; the
    /// caller must reconcile manually.
    #[error("Ledger write failed: {0}")]
    Ledger(#[from] optx_ledger::LedgerError),
}

/// Result type alias for position operations.
pub type PositionResult<T> = std::result::Result<T, PositionError>;
