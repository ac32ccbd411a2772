//! Synthetic option chain generator.
//!
//! Backs the quote cache in tests and paper sessions without any
//! network dependency. The underlying random-walks between polls;
//! premiums are intrinsic value plus a time value that decays with
//! distance from the money.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use optx_core::{OptionContract, OptionKind, OptionQuote, Price};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::FeedResult;
use crate::source::QuoteSource;

/// Synthetic chain parameters.
#[derive(Debug, Clone)]
pub struct SyntheticChainConfig {
    pub underlying_price: f64,
    pub strike_step: f64,
    pub strikes_each_side: u32,
    /// Max underlying move per poll.
    pub price_jitter: f64,
    pub spread_pct: f64,
    pub min_spread: f64,
    pub time_value_atm: f64,
    pub time_value_decay: f64,
    pub min_time_value: f64,
    pub seed: Option<u64>,
}

impl Default for SyntheticChainConfig {
    fn default() -> Self {
        Self {
            underlying_price: 500.0,
            strike_step: 1.0,
            strikes_each_side: 50,
            price_jitter: 0.25,
            spread_pct: 0.02,
            min_spread: 0.01,
            time_value_atm: 0.5,
            time_value_decay: 0.02,
            min_time_value: 0.05,
            seed: None,
        }
    }
}

struct WalkState {
    price: f64,
    rng: StdRng,
}

/// Deterministic-seedable synthetic quote source.
pub struct SyntheticQuoteSource {
    config: SyntheticChainConfig,
    state: Mutex<WalkState>,
}

impl SyntheticQuoteSource {
    pub fn new(config: SyntheticChainConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let price = config.underlying_price;
        Self {
            config,
            state: Mutex::new(WalkState { price, rng }),
        }
    }

    /// Current simulated underlying price.
    pub fn underlying_price(&self) -> f64 {
        self.state.lock().price
    }
}

#[async_trait]
impl QuoteSource for SyntheticQuoteSource {
    async fn fetch_quotes(
        &self,
        symbol: &str,
        expiration: NaiveDate,
    ) -> FeedResult<Vec<OptionQuote>> {
        let config = &self.config;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let jitter = config.price_jitter;
        if jitter > 0.0 {
            state.price += state.rng.gen_range(-jitter..=jitter);
        }
        let underlying = state.price;

        let base = (underlying / config.strike_step).round() * config.strike_step;
        let now = Utc::now();
        let side = config.strikes_each_side as i64;
        let mut quotes = Vec::with_capacity((side as usize * 2 + 1) * 2);

        for offset in -side..=side {
            let strike = base + offset as f64 * config.strike_step;
            for kind in [OptionKind::Call, OptionKind::Put] {
                quotes.push(build_quote(
                    symbol,
                    expiration,
                    kind,
                    strike,
                    underlying,
                    now,
                    config,
                    &mut state.rng,
                ));
            }
        }

        Ok(quotes)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_quote(
    symbol: &str,
    expiration: NaiveDate,
    kind: OptionKind,
    strike: f64,
    underlying: f64,
    now: chrono::DateTime<Utc>,
    config: &SyntheticChainConfig,
    rng: &mut StdRng,
) -> OptionQuote {
    let intrinsic = match kind {
        OptionKind::Call => (underlying - strike).max(0.0),
        OptionKind::Put => (strike - underlying).max(0.0),
    };
    let distance = (strike - underlying).abs();
    let time_value = (config.time_value_atm - distance * config.time_value_decay)
        .max(config.min_time_value);
    let mid = intrinsic + time_value;
    let spread = (mid * config.spread_pct).max(config.min_spread);
    let bid = (mid - spread / 2.0).max(0.0);
    let ask = bid + spread;
    let last = (mid + rng.gen_range(-spread / 4.0..=spread / 4.0)).max(0.0);

    OptionQuote {
        contract: OptionContract::new(symbol, kind, price(strike), expiration),
        bid: Some(price(bid)),
        ask: Some(price(ask)),
        last: Some(price(last)),
        volume: None,
        open_interest: None,
        updated_at: now,
    }
}

fn price(value: f64) -> Price {
    Price::new(Decimal::from_f64(value).unwrap_or_default().round_dp(4))
}
