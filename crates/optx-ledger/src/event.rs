//! Trade event schema.

use chrono::{DateTime, NaiveDate, Utc};
use optx_core::{OptionContract, OptionKind, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Options contracts carry 100 shares of the underlying; used only
/// for the notional `total_value` field.
pub const CONTRACT_MULTIPLIER: u32 = 100;

/// Position lifecycle transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Add,
    Trim,
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Add => write!(f, "add"),
            Self::Trim => write!(f, "trim"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// One lifecycle transition, written as a single JSON line.
///
/// Once written, never edited or deleted. Carries enough contract and
/// position state to reconstruct open positions by replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub ts: DateTime<Utc>,
    pub event: EventKind,
    pub position_id: String,
    pub order_id: Option<String>,
    pub order_status: Option<String>,
    pub symbol: String,
    pub kind: OptionKind,
    pub strike: Price,
    pub expiration: NaiveDate,
    pub contract_key: String,
    pub strategy_tag: Option<String>,
    /// Chart timeframe the decision was made on, e.g. "5m".
    pub timeframe: Option<String>,
    pub quantity: Option<u32>,
    pub fill_price: Option<Price>,
    /// Notional of the fill: quantity x fill price x 100.
    pub total_value: Option<Decimal>,
    pub avg_entry: Option<Price>,
    pub quantity_open: u32,
    pub position_status: String,
    pub realized_pnl: Option<Decimal>,
    pub reason: Option<String>,
}

impl TradeEvent {
    /// The contract this event refers to.
    pub fn contract(&self) -> OptionContract {
        OptionContract::new(self.symbol.clone(), self.kind, self.strike, self.expiration)
    }

    /// Notional for a fill, or `None` when either part is missing.
    pub fn total_value_of(quantity: Option<u32>, fill_price: Option<Price>) -> Option<Decimal> {
        match (quantity, fill_price) {
            (Some(qty), Some(price)) => {
                Some(Decimal::from(qty) * price.inner() * Decimal::from(CONTRACT_MULTIPLIER))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_value() {
        assert_eq!(
            TradeEvent::total_value_of(Some(2), Some(Price::new(dec!(1.20)))),
            Some(dec!(240.00))
        );
        assert_eq!(TradeEvent::total_value_of(None, Some(Price::ZERO)), None);
        assert_eq!(TradeEvent::total_value_of(Some(1), None), None);
    }

    #[test]
    fn test_event_kind_serde() {
        assert_eq!(serde_json::to_string(&EventKind::Open).unwrap(), "\"open\"");
        assert_eq!(
            serde_json::from_str::<EventKind>("\"close\"").unwrap(),
            EventKind::Close
        );
    }
}
