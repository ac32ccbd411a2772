//! Position state and fill arithmetic.

use chrono::{DateTime, Utc};
use optx_core::{OptionContract, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position lifecycle status.
///
/// `Closed` is terminal; re-entering the same contract requires a new
/// position id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::PartiallyClosed => write!(f, "partially_closed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl PositionStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "partially_closed" => Self::PartiallyClosed,
            "closed" => Self::Closed,
            _ => Self::Open,
        }
    }
}

/// One long option position built from filled orders.
///
/// Open quantity and average entry are recomputed only from fills;
/// realized P&L accumulates only on sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub contract: OptionContract,
    pub quantity_open: u32,
    pub avg_entry: Option<Price>,
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
    pub strategy_tag: Option<String>,
    pub opened_at: DateTime<Utc>,
    /// Order ids in submission order, opens and closes alike.
    pub order_ids: Vec<String>,
}

impl Position {
    /// Create a position from its first buy fill.
    pub fn open(
        contract: OptionContract,
        quantity: u32,
        fill_price: Price,
        strategy_tag: Option<String>,
        order_id: String,
    ) -> Self {
        let opened_at = Utc::now();
        let id = generate_position_id(&contract, strategy_tag.as_deref(), opened_at);
        Self {
            id,
            contract,
            quantity_open: quantity,
            avg_entry: Some(fill_price),
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            strategy_tag,
            opened_at,
            order_ids: vec![order_id],
        }
    }

    /// Fold a buy fill into the volume-weighted average entry.
    pub fn apply_add(&mut self, quantity: u32, fill_price: Price, order_id: String) {
        let prior = self.avg_entry.map(|p| p.inner()).unwrap_or(Decimal::ZERO)
            * Decimal::from(self.quantity_open);
        let added = fill_price.inner() * Decimal::from(quantity);
        let total = self.quantity_open + quantity;
        self.avg_entry = Some(Price::new((prior + added) / Decimal::from(total)));
        self.quantity_open = total;
        self.order_ids.push(order_id);
    }

    /// Apply a sell fill: lock in P&L against the current average
    /// entry and reduce the open quantity. Caller validates quantity.
    pub fn apply_trim(&mut self, quantity: u32, fill_price: Price, order_id: String) {
        let avg = self.avg_entry.map(|p| p.inner()).unwrap_or(Decimal::ZERO);
        self.realized_pnl += (fill_price.inner() - avg) * Decimal::from(quantity);
        self.quantity_open -= quantity;
        self.status = if self.quantity_open == 0 {
            PositionStatus::Closed
        } else {
            PositionStatus::PartiallyClosed
        };
        self.order_ids.push(order_id);
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }
}

/// Human-readable position id:
/// `pos-{symbol}-{kind}-{strike}-{expiration}[-tag-{tag}]-{unix_ms}`.
pub fn generate_position_id(
    contract: &OptionContract,
    strategy_tag: Option<&str>,
    opened_at: DateTime<Utc>,
) -> String {
    let tag = strategy_tag
        .map(|t| format!("-tag-{t}"))
        .unwrap_or_default();
    format!(
        "pos-{}-{}-{}-{}{}-{}",
        contract.symbol,
        contract.kind,
        contract.strike,
        contract.expiration.format("%Y%m%d"),
        tag,
        opened_at.timestamp_millis()
    )
}
