//! Option chain quote cache.
//!
//! Polls a `QuoteSource`, keeps the latest quote per contract key,
//! detects changes, and fans out changed quotes to subscribers. One
//! cache instance serves one underlying symbol and one expiration at
//! a time.

pub mod cache;
pub mod error;
pub mod source;
pub mod synthetic;
pub mod tradier;

pub use cache::{QuoteCache, QuoteCacheConfig};
pub use error::{FeedError, FeedResult};
pub use source::{QuoteSource, QuoteView};
pub use synthetic::{SyntheticChainConfig, SyntheticQuoteSource};
pub use tradier::TradierQuoteSource;
