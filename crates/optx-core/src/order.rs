//! Order submission types shared by all executors.

use crate::{CoreError, OptionContract, OptionKind, Price, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side. Long-only engine: buys open/add, sells trim/close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Broker wire value for option orders.
    pub fn wire(&self) -> &'static str {
        match self {
            Self::Buy => "buy_to_open",
            Self::Sell => "sell_to_close",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

/// Unique order identifier.
///
/// Simulated orders carry a generated `paper-` id; live orders carry
/// the broker-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh paper order id.
    pub fn paper() -> Self {
        Self(format!("paper-{}", Uuid::new_v4().simple()))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A request to buy or sell option contracts.
///
/// Accepted byte-identical by both the paper and live executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub kind: OptionKind,
    pub strike: Price,
    pub expiration: NaiveDate,
    pub quantity: u32,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub limit_price: Option<Price>,
}

impl OrderRequest {
    /// Market order for a specific contract.
    pub fn market(contract: &OptionContract, quantity: u32, side: OrderSide) -> Self {
        Self {
            symbol: contract.symbol.clone(),
            kind: contract.kind,
            strike: contract.strike,
            expiration: contract.expiration,
            quantity,
            side,
            order_type: OrderType::Market,
            limit_price: None,
        }
    }

    /// The contract this order targets.
    pub fn contract(&self) -> OptionContract {
        OptionContract::new(self.symbol.clone(), self.kind, self.strike, self.expiration)
    }

    /// Validate quantity and limit-price consistency.
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(CoreError::InvalidOrder("quantity must be positive".into()));
        }
        if self.order_type == OrderType::Limit && self.limit_price.is_none() {
            return Err(CoreError::InvalidOrder(
                "limit_price required for limit orders".into(),
            ));
        }
        Ok(())
    }
}
