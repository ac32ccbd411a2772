//! Paper executor: simulated fills against cached quotes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use optx_core::{OptionQuote, OrderId, OrderRequest, OrderSide, OrderType, Price};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::executor::{OrderExecutor, OrderStatus, OrderSubmit, StatusReport};

/// Looks up the latest cached quote for a contract key.
pub type QuoteGetter = Arc<dyn Fn(&str) -> Option<OptionQuote> + Send + Sync>;

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    status: OrderStatus,
    submitted_at: DateTime<Utc>,
    filled_at: Option<DateTime<Utc>>,
    fill_price: Option<Price>,
    rejection_reason: Option<String>,
}

/// Simulated executor. Fills immediately at the best available quote
/// side, or rejects when no price can be resolved or a limit does not
/// cross. Never fabricates a price.
pub struct PaperExecutor {
    quote_getter: QuoteGetter,
    orders: DashMap<String, PaperOrder>,
}

impl PaperExecutor {
    pub fn new(quote_getter: QuoteGetter) -> Self {
        Self {
            quote_getter,
            orders: DashMap::new(),
        }
    }

    /// Fill price by side. Buys fill at the price a buyer pays, sells
    /// at the price a seller receives, falling back through the book:
    /// buy ask -> mid -> last -> bid, sell bid -> mid -> last -> ask.
    fn resolve_fill_price(&self, request: &OrderRequest) -> Option<Price> {
        let key = request.contract().key();
        let quote = (self.quote_getter)(&key)?;
        match request.side {
            OrderSide::Buy => quote.ask.or_else(|| quote.mid()).or(quote.last).or(quote.bid),
            OrderSide::Sell => quote.bid.or_else(|| quote.mid()).or(quote.last).or(quote.ask),
        }
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    async fn submit_option_order(&self, request: &OrderRequest) -> ExecutorResult<OrderSubmit> {
        request.validate()?;

        let now = Utc::now();
        let order_id = OrderId::paper();
        let mut order = PaperOrder {
            request: request.clone(),
            status: OrderStatus::Submitted,
            submitted_at: now,
            filled_at: None,
            fill_price: None,
            rejection_reason: None,
        };

        match self.resolve_fill_price(request) {
            None => {
                warn!(
                    contract = %request.contract(),
                    order_id = %order_id,
                    "No quote available, rejecting paper order"
                );
                order.status = OrderStatus::Rejected;
                order.rejection_reason = Some("missing_quote".to_string());
            }
            Some(price) => {
                let crosses = match (request.order_type, request.limit_price) {
                    (OrderType::Limit, Some(limit)) => match request.side {
                        OrderSide::Buy => price <= limit,
                        OrderSide::Sell => price >= limit,
                    },
                    _ => true,
                };
                if crosses {
                    order.status = OrderStatus::Filled;
                    order.filled_at = Some(now);
                    order.fill_price = Some(price);
                    debug!(
                        order_id = %order_id,
                        side = %request.side,
                        quantity = request.quantity,
                        fill_price = %price,
                        "Paper order filled"
                    );
                } else {
                    order.status = OrderStatus::Rejected;
                    order.rejection_reason = Some("limit_not_reached".to_string());
                }
            }
        }

        let submit = OrderSubmit {
            order_id: order_id.clone(),
            status: order.status,
            fill_price: order.fill_price,
            filled_quantity: order.fill_price.map(|_| request.quantity),
            rejection_reason: order.rejection_reason.clone(),
        };
        self.orders.insert(order_id.as_str().to_string(), order);
        Ok(submit)
    }

    async fn get_order_status(&self, order_id: &str) -> ExecutorResult<StatusReport> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| ExecutorError::UnknownOrder(order_id.to_string()))?;
        Ok(StatusReport {
            order_id: OrderId::from_string(order_id.to_string()),
            status: order.status,
            avg_fill_price: order.fill_price,
            filled_quantity: order.fill_price.map(|_| order.request.quantity),
        })
    }
}
