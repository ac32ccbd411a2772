//! Durable trade records.
//!
//! [`TradeLedger`] is the append-only JSONL record of every position
//! lifecycle transition; it is the source of truth for recovery and
//! daily P&L. [`CorrelationStore`] maps position ids to external
//! notification message ids so restarts can keep editing the same
//! message.

pub mod correlation;
pub mod error;
pub mod event;
pub mod ledger;

pub use correlation::CorrelationStore;
pub use error::{LedgerError, LedgerResult};
pub use event::{EventKind, TradeEvent};
pub use ledger::TradeLedger;
