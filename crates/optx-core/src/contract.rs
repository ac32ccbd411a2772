//! Option contract identity.

use crate::Price;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Option kind: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// An option contract: underlying symbol, kind, strike, expiration.
///
/// Immutable once constructed. `key()` is the canonical lookup key
/// used everywhere a contract identifies a quote or position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub kind: OptionKind,
    pub strike: Price,
    pub expiration: NaiveDate,
}

impl OptionContract {
    pub fn new(
        symbol: impl Into<String>,
        kind: OptionKind,
        strike: Price,
        expiration: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            strike,
            expiration,
        }
    }

    /// Canonical contract key: `{symbol}-{kind}-{strike}-{expiration}`.
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.symbol,
            self.kind,
            self.strike,
            self.expiration.format("%Y%m%d")
        )
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_contract_key_format() {
        let contract = OptionContract::new(
            "SPY",
            OptionKind::Call,
            Price::new(dec!(520)),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
        );
        assert_eq!(contract.key(), "SPY-call-520-20260106");
    }

    #[test]
    fn test_contract_key_put() {
        let contract = OptionContract::new(
            "SPY",
            OptionKind::Put,
            Price::new(dec!(499.5)),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
        );
        assert_eq!(contract.key(), "SPY-put-499.5-20260106");
    }
}
