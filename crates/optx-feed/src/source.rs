//! Quote source capability.

use crate::error::FeedResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use optx_core::OptionQuote;
use std::collections::HashMap;

/// A source of option chain quotes.
///
/// Any implementation satisfying this signature can back the
/// `QuoteCache`: a broker REST API, a replay file, or the synthetic
/// generator used in tests and paper sessions.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the full chain for one symbol and expiration.
    async fn fetch_quotes(&self, symbol: &str, expiration: NaiveDate)
        -> FeedResult<Vec<OptionQuote>>;
}

/// Read-only view over cached quotes.
///
/// Consumers that only select or price against the chain depend on
/// this instead of the full `QuoteCache`.
pub trait QuoteView: Send + Sync {
    /// Atomic point-in-time copy of the full key -> quote mapping.
    fn get_snapshot(&self) -> HashMap<String, OptionQuote>;

    /// Latest quote for one contract key.
    fn get_quote(&self, contract_key: &str) -> Option<OptionQuote>;
}
