//! Selection request and result types.

use chrono::NaiveDate;
use optx_core::{OptionKind, OptionQuote, Price};
use serde::{Deserialize, Serialize};

/// What the caller wants picked from the chain.
///
/// Stateless; not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub symbol: String,
    pub kind: OptionKind,
    pub expiration: NaiveDate,
    pub underlying_price: Price,
    /// Maximum distance from the underlying, in strike units.
    pub max_otm: Price,
}

/// A chosen contract plus the human-readable reason it won.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    /// The quote the choice was made from; `quote.contract` is the
    /// selected contract.
    pub quote: OptionQuote,
    pub reason: String,
}
