//! Default selection policy: nearest to the money within a band.

use optx_core::{OptionKind, OptionQuote, Price};
use tracing::debug;

use crate::registry::ContractSelector;
use crate::request::{SelectionRequest, SelectionResult};

/// Picks the contract with the minimum absolute distance from the
/// requested underlying price, among quotes of the requested kind and
/// expiration within `max_otm`. Ties break toward the strike that is
/// closer to in-the-money: lower strike for calls, higher for puts.
/// Quotes without an ask are not tradeable and are excluded.
#[derive(Debug, Default)]
pub struct PriceRangeOtmSelector;

impl ContractSelector for PriceRangeOtmSelector {
    fn name(&self) -> &str {
        "price-range-otm"
    }

    fn select(
        &self,
        quotes: &[OptionQuote],
        request: &SelectionRequest,
    ) -> Option<SelectionResult> {
        let mut best: Option<(&OptionQuote, Price)> = None;

        for quote in quotes {
            let contract = &quote.contract;
            if contract.symbol != request.symbol
                || contract.kind != request.kind
                || contract.expiration != request.expiration
                || quote.ask.is_none()
            {
                continue;
            }

            let distance = contract.strike.distance_from(request.underlying_price);
            if distance > request.max_otm {
                continue;
            }

            let wins = match &best {
                None => true,
                Some((current, best_distance)) => {
                    if distance != *best_distance {
                        distance < *best_distance
                    } else {
                        match request.kind {
                            OptionKind::Call => contract.strike < current.contract.strike,
                            OptionKind::Put => contract.strike > current.contract.strike,
                        }
                    }
                }
            };
            if wins {
                best = Some((quote, distance));
            }
        }

        best.map(|(quote, distance)| {
            debug!(
                contract = %quote.contract,
                distance = %distance,
                "Selected contract"
            );
            SelectionResult {
                quote: quote.clone(),
                reason: format!("otm-distance={distance}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use optx_core::OptionContract;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
    }

    fn quote(kind: OptionKind, strike: Decimal, ask: Option<Decimal>) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new("SPY", kind, Price::new(strike), expiry()),
            bid: Some(Price::new(dec!(0.9))),
            ask: ask.map(Price::new),
            last: None,
            volume: None,
            open_interest: None,
            updated_at: Utc::now(),
        }
    }

    fn request(kind: OptionKind, underlying: Decimal, max_otm: Decimal) -> SelectionRequest {
        SelectionRequest {
            symbol: "SPY".to_string(),
            kind,
            expiration: expiry(),
            underlying_price: Price::new(underlying),
            max_otm: Price::new(max_otm),
        }
    }

    #[test]
    fn test_picks_minimum_distance() {
        let quotes = vec![
            quote(OptionKind::Call, dec!(502), Some(dec!(1.0))),
            quote(OptionKind::Call, dec!(501), Some(dec!(1.2))),
            quote(OptionKind::Call, dec!(504), Some(dec!(0.6))),
        ];
        let result = PriceRangeOtmSelector
            .select(&quotes, &request(OptionKind::Call, dec!(500.4), dec!(5)))
            .unwrap();
        assert_eq!(result.quote.contract.strike, Price::new(dec!(501)));
    }

    #[test]
    fn test_never_exceeds_max_otm() {
        let quotes = vec![
            quote(OptionKind::Call, dec!(506), Some(dec!(0.4))),
            quote(OptionKind::Call, dec!(510), Some(dec!(0.2))),
        ];
        let result =
            PriceRangeOtmSelector.select(&quotes, &request(OptionKind::Call, dec!(500), dec!(5)));
        assert!(result.is_none());
    }

    #[test]
    fn test_tie_breaks_lower_strike_for_calls() {
        // 499 and 501 are both 1.0 away from 500.
        let quotes = vec![
            quote(OptionKind::Call, dec!(501), Some(dec!(1.0))),
            quote(OptionKind::Call, dec!(499), Some(dec!(1.4))),
        ];
        let result = PriceRangeOtmSelector
            .select(&quotes, &request(OptionKind::Call, dec!(500), dec!(5)))
            .unwrap();
        assert_eq!(result.quote.contract.strike, Price::new(dec!(499)));
    }

    #[test]
    fn test_tie_breaks_higher_strike_for_puts() {
        let quotes = vec![
            quote(OptionKind::Put, dec!(499), Some(dec!(1.0))),
            quote(OptionKind::Put, dec!(501), Some(dec!(1.4))),
        ];
        let result = PriceRangeOtmSelector
            .select(&quotes, &request(OptionKind::Put, dec!(500), dec!(5)))
            .unwrap();
        assert_eq!(result.quote.contract.strike, Price::new(dec!(501)));
    }

    #[test]
    fn test_filters_kind_and_missing_ask() {
        let quotes = vec![
            quote(OptionKind::Put, dec!(500), Some(dec!(1.0))),
            quote(OptionKind::Call, dec!(500), None),
        ];
        let result =
            PriceRangeOtmSelector.select(&quotes, &request(OptionKind::Call, dec!(500), dec!(5)));
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_chain_returns_none() {
        let result =
            PriceRangeOtmSelector.select(&[], &request(OptionKind::Call, dec!(500), dec!(5)));
        assert!(result.is_none());
    }
}
