//! Option quote snapshots.

use crate::{OptionContract, Price};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-in-time quote for one option contract.
///
/// Immutable snapshot; a new quote replaces, never mutates, the
/// previous one for the same contract key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: Option<Price>,
    pub ask: Option<Price>,
    pub last: Option<Price>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl OptionQuote {
    /// Mid price: `(bid + ask) / 2` when both sides are present.
    pub fn mid(&self) -> Option<Price> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(Price::new((bid.inner() + ask.inner()) / Decimal::TWO)),
            _ => None,
        }
    }

    /// Whether the priced fields differ from another quote.
    ///
    /// Change detection compares bid, ask, and last only. Volume and
    /// open interest are carried as data but do not trigger fanout.
    pub fn changed_from(&self, other: &OptionQuote) -> bool {
        self.bid != other.bid || self.ask != other.ask || self.last != other.last
    }

    /// Age of this quote in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.updated_at).num_milliseconds()
    }
}
