//! Tradier option chain source.
//!
//! Fetches the chain over REST with bearer auth. 429 responses are
//! surfaced as `FeedError::RateLimited` carrying the server's
//! `Retry-After` so the cache can back off instead of hammering.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use optx_core::{OptionContract, OptionKind, OptionQuote, Price};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::source::QuoteSource;

/// Default timeout for chain requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ChainResponse {
    options: Option<ChainOptions>,
}

#[derive(Debug, Deserialize)]
struct ChainOptions {
    #[serde(default)]
    option: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    option_type: Option<String>,
    strike: Option<Price>,
    bid: Option<Price>,
    ask: Option<Price>,
    last: Option<Price>,
    volume: Option<u64>,
    open_interest: Option<u64>,
}

/// Quote source backed by the Tradier market-data REST API.
pub struct TradierQuoteSource {
    client: Client,
    base_url: String,
    access_token: String,
}

impl TradierQuoteSource {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            access_token: access_token.into(),
        })
    }

    fn parse_option(
        &self,
        raw: RawOption,
        symbol: &str,
        expiration: NaiveDate,
        now: chrono::DateTime<Utc>,
    ) -> Option<OptionQuote> {
        let kind = match raw.option_type.as_deref() {
            Some("call") => OptionKind::Call,
            Some("put") => OptionKind::Put,
            _ => return None,
        };
        let strike = raw.strike?;

        Some(OptionQuote {
            contract: OptionContract::new(symbol, kind, strike, expiration),
            bid: raw.bid,
            ask: raw.ask,
            last: raw.last,
            volume: raw.volume,
            open_interest: raw.open_interest,
            updated_at: now,
        })
    }
}

#[async_trait]
impl QuoteSource for TradierQuoteSource {
    async fn fetch_quotes(
        &self,
        symbol: &str,
        expiration: NaiveDate,
    ) -> FeedResult<Vec<OptionQuote>> {
        let url = format!(
            "{}/markets/options/chains?symbol={}&expiration={}",
            self.base_url,
            symbol,
            expiration.format("%Y-%m-%d")
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("Chain request failed: {e}")))?;

        if response.status().as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(1.0);
            return Err(FeedError::RateLimited {
                retry_after: Duration::from_secs_f64(retry_after),
            });
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("Chain error {status}: {body}")));
        }

        let payload: ChainResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Payload(format!("Failed to parse chain: {e}")))?;

        let now = Utc::now();
        let quotes: Vec<OptionQuote> = payload
            .options
            .map(|o| o.option)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| self.parse_option(raw, symbol, expiration, now))
            .collect();

        debug!(symbol, count = quotes.len(), "Fetched option chain");
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let source = TradierQuoteSource::new("https://api.tradier.com/v1/", "token").unwrap();
        assert_eq!(source.base_url, "https://api.tradier.com/v1");
    }

    #[test]
    fn test_parse_option_skips_unknown_kind() {
        let source = TradierQuoteSource::new("https://api.tradier.com/v1", "token").unwrap();
        let raw = RawOption {
            option_type: Some("straddle".to_string()),
            strike: Some(Price::new(rust_decimal::Decimal::from(520))),
            bid: None,
            ask: None,
            last: None,
            volume: None,
            open_interest: None,
        };
        let expiration = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        assert!(source.parse_option(raw, "SPY", expiration, Utc::now()).is_none());
    }
}
