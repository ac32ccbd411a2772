//! Position lifecycle management.
//!
//! [`OrderManager`] owns position state and drives it through
//! open/add/trim/close, writing every transition to the trade ledger
//! before reporting success. [`PositionWatcher`] is a read-only
//! observer streaming mark-to-market updates for open positions.
//! [`recovery`] rebuilds open positions from the ledger after a
//! restart.

pub mod error;
pub mod hooks;
pub mod manager;
pub mod position;
pub mod recovery;
pub mod watcher;

pub use error::{PositionError, PositionResult};
pub use hooks::PositionHooks;
pub use manager::{OpenOutcome, OrderContext, OrderManager, PositionsProvider};
pub use position::{Position, PositionStatus};
pub use recovery::{recover_positions, RecoveredPosition};
pub use watcher::{MarkSource, PositionUpdate, PositionWatcher};
