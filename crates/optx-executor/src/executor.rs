//! The executor trait and its result types.

use async_trait::async_trait;
use optx_core::{OrderId, OrderRequest, Price};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ExecutorResult;

/// Normalized order state across paper and live executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Submitted,
    Filled,
    PartiallyFilled,
    Rejected,
}

impl OrderStatus {
    /// Map a broker status string onto the normalized set.
    ///
    /// Unrecognized working states (open, accepted, ...) read as
    /// `Submitted`; the order manager keeps polling those.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "filled" => Self::Filled,
            "partially_filled" => Self::PartiallyFilled,
            "rejected" | "canceled" | "expired" | "error" => Self::Rejected,
            "pending" => Self::Pending,
            _ => Self::Submitted,
        }
    }

    /// Whether the order can still change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitted => write!(f, "submitted"),
            Self::Filled => write!(f, "filled"),
            Self::PartiallyFilled => write!(f, "partially_filled"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Outcome of an order submission.
///
/// A rejection is a normal outcome, reported here with a reason, not
/// an `Err`. Errors are reserved for transport and protocol failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmit {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub fill_price: Option<Price>,
    pub filled_quantity: Option<u32>,
    pub rejection_reason: Option<String>,
}

/// Refreshed view of a previously submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub avg_fill_price: Option<Price>,
    pub filled_quantity: Option<u32>,
}

/// Submits option orders and reports their status.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit_option_order(&self, request: &OrderRequest) -> ExecutorResult<OrderSubmit>;

    async fn get_order_status(&self, order_id: &str) -> ExecutorResult<StatusReport>;
}
