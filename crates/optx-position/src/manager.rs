//! Order manager: drives positions through their lifecycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use optx_core::{OptionContract, OrderRequest, OrderSide, OrderType, Price};
use optx_executor::{OrderExecutor, OrderStatus, OrderSubmit, StatusReport};
use optx_feed::QuoteView;
use optx_ledger::{EventKind, TradeEvent, TradeLedger};
use optx_selector::{SelectionRequest, SelectorRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{PositionError, PositionResult};
use crate::hooks::PositionHooks;
use crate::position::Position;

/// Selector used when the caller does not name one.
pub const DEFAULT_SELECTOR: &str = "price-range-otm";

/// Typed outcome of an open attempt. Only `Opened` creates state;
/// the other two are expected no-trade outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(String),
    NoSelection(String),
    NotFilled(String),
}

/// Record of one submitted order, updated on status refresh.
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub order_id: String,
    pub contract: OptionContract,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub requested_at: DateTime<Utc>,
    pub selector_name: Option<String>,
    /// Set once the affected position is known; opening orders get it
    /// after the fill creates the position.
    pub position_id: Option<String>,
    pub status: OrderStatus,
    pub fill_price: Option<Price>,
}

/// Read-only access to open positions, for the watcher.
#[async_trait]
pub trait PositionsProvider: Send + Sync {
    async fn open_positions(&self) -> Vec<Position>;
}

/// Owns all position state and serializes mutations per position.
///
/// Each position sits behind its own `tokio::sync::Mutex`, held for
/// the whole of an add/trim/close including the executor round trip,
/// so concurrent operations on one position apply one at a time while
/// different positions proceed in parallel. Every transition is
/// written to the ledger before hooks run and before the call returns.
pub struct OrderManager {
    quotes: Arc<dyn QuoteView>,
    executor: Arc<dyn OrderExecutor>,
    selectors: Arc<SelectorRegistry>,
    ledger: Arc<TradeLedger>,
    hooks: Vec<Arc<dyn PositionHooks>>,
    positions: DashMap<String, Arc<Mutex<Position>>>,
    orders: DashMap<String, OrderContext>,
}

impl OrderManager {
    pub fn new(
        quotes: Arc<dyn QuoteView>,
        executor: Arc<dyn OrderExecutor>,
        selectors: Arc<SelectorRegistry>,
        ledger: Arc<TradeLedger>,
    ) -> Self {
        Self {
            quotes,
            executor,
            selectors,
            ledger,
            hooks: Vec::new(),
            positions: DashMap::new(),
            orders: DashMap::new(),
        }
    }

    /// Attach a lifecycle hook. Call before sharing the manager.
    pub fn add_hooks(&mut self, hooks: Arc<dyn PositionHooks>) {
        self.hooks.push(hooks);
    }

    /// Open a new position with the default selector.
    pub async fn open_position(
        &self,
        request: &SelectionRequest,
        quantity: u32,
        strategy_tag: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<OpenOutcome> {
        self.open_position_with(DEFAULT_SELECTOR, request, quantity, strategy_tag, timeframe)
            .await
    }

    /// Open a new position: select a contract from the current quote
    /// snapshot, buy it, and create the position on fill. The event
    /// reason is the selector's; `timeframe` labels the triggering
    /// chart timeframe for the ledger and hooks.
    pub async fn open_position_with(
        &self,
        selector_name: &str,
        request: &SelectionRequest,
        quantity: u32,
        strategy_tag: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<OpenOutcome> {
        let selector = self.selectors.get(selector_name)?;
        let snapshot: Vec<_> = self.quotes.get_snapshot().into_values().collect();
        let Some(selection) = selector.select(&snapshot, request) else {
            return Ok(OpenOutcome::NoSelection(format!(
                "no contract matched selector '{selector_name}'"
            )));
        };

        let contract = selection.quote.contract.clone();
        let order = OrderRequest::market(&contract, quantity, OrderSide::Buy);
        let submit = self.executor.submit_option_order(&order).await?;
        self.track_order(&submit, &order, Some(selector_name.to_string()), None);

        // A partial fill still opens a position, sized by what filled.
        let (fill_price, filled) = match (submit.status, submit.fill_price) {
            (OrderStatus::Filled | OrderStatus::PartiallyFilled, Some(price)) => {
                (price, submit.filled_quantity.unwrap_or(quantity))
            }
            _ => {
                return Ok(OpenOutcome::NotFilled(
                    submit
                        .rejection_reason
                        .unwrap_or_else(|| submit.status.to_string()),
                ));
            }
        };

        let position = Position::open(
            contract,
            filled,
            fill_price,
            strategy_tag,
            submit.order_id.as_str().to_string(),
        );
        let event = build_event(
            EventKind::Open,
            &position,
            Some(&submit),
            Some(filled),
            Some(fill_price),
            Some(selection.reason.clone()),
            timeframe,
        );
        self.ledger.record_trade_event(&event)?;

        let id = position.id.clone();
        info!(
            position_id = %id,
            contract = %position.contract,
            quantity = filled,
            fill_price = %fill_price,
            "Position opened"
        );
        self.positions
            .insert(id.clone(), Arc::new(Mutex::new(position.clone())));
        self.link_order_to_position(submit.order_id.as_str(), &id);
        self.run_hooks(EventKind::Open, &position, &event).await;
        Ok(OpenOutcome::Opened(id))
    }

    /// Buy more of an existing position's contract, folding the fill
    /// into the volume-weighted average entry.
    pub async fn add_to_position(
        &self,
        position_id: &str,
        quantity: u32,
        reason: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<()> {
        let handle = self.position_handle(position_id)?;
        let mut position = handle.lock().await;
        if position.is_closed() {
            return Err(PositionError::PositionClosed(position_id.to_string()));
        }

        let order = OrderRequest::market(&position.contract, quantity, OrderSide::Buy);
        let submit = self.executor.submit_option_order(&order).await?;
        self.track_order(&submit, &order, None, Some(position_id.to_string()));
        let fill_price = filled_price(&submit)?;

        position.apply_add(quantity, fill_price, submit.order_id.as_str().to_string());
        let event = build_event(
            EventKind::Add,
            &position,
            Some(&submit),
            Some(quantity),
            Some(fill_price),
            reason,
            timeframe,
        );
        self.ledger.record_trade_event(&event)?;

        info!(
            position_id = %position.id,
            quantity,
            fill_price = %fill_price,
            avg_entry = %position.avg_entry.unwrap_or(Price::ZERO),
            "Position added"
        );
        let snapshot = position.clone();
        drop(position);
        self.run_hooks(EventKind::Add, &snapshot, &event).await;
        Ok(())
    }

    /// Sell part of a position, realizing P&L against the average
    /// entry. Closes the position when open quantity reaches zero.
    pub async fn trim_position(
        &self,
        position_id: &str,
        quantity: u32,
        reason: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<()> {
        let handle = self.position_handle(position_id)?;
        let mut position = handle.lock().await;
        self.trim_locked(&mut position, quantity, reason, timeframe)
            .await
    }

    /// Sell the full remaining quantity.
    pub async fn close_position(
        &self,
        position_id: &str,
        reason: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<()> {
        let handle = self.position_handle(position_id)?;
        let mut position = handle.lock().await;
        let quantity = position.quantity_open;
        self.trim_locked(&mut position, quantity, reason, timeframe)
            .await
    }

    async fn trim_locked(
        &self,
        position: &mut Position,
        quantity: u32,
        reason: Option<String>,
        timeframe: Option<String>,
    ) -> PositionResult<()> {
        if position.is_closed() {
            return Err(PositionError::PositionClosed(position.id.clone()));
        }
        if quantity == 0 || quantity > position.quantity_open {
            return Err(PositionError::InvalidQuantity {
                requested: quantity,
                open: position.quantity_open,
            });
        }

        let order = OrderRequest::market(&position.contract, quantity, OrderSide::Sell);
        let submit = self.executor.submit_option_order(&order).await?;
        self.track_order(&submit, &order, None, Some(position.id.clone()));
        let fill_price = filled_price(&submit)?;

        position.apply_trim(quantity, fill_price, submit.order_id.as_str().to_string());
        let kind = if position.is_closed() {
            EventKind::Close
        } else {
            EventKind::Trim
        };
        let event = build_event(
            kind,
            position,
            Some(&submit),
            Some(quantity),
            Some(fill_price),
            reason,
            timeframe,
        );
        self.ledger.record_trade_event(&event)?;

        info!(
            position_id = %position.id,
            quantity,
            fill_price = %fill_price,
            realized_pnl = %position.realized_pnl,
            status = %position.status,
            "Position trimmed"
        );
        let snapshot = position.clone();
        self.run_hooks(kind, &snapshot, &event).await;
        Ok(())
    }

    /// Refresh one order's status from the executor, updating the
    /// stored context.
    pub async fn get_status(&self, order_id: &str) -> PositionResult<StatusReport> {
        let report = self.executor.get_order_status(order_id).await?;
        if let Some(mut context) = self.orders.get_mut(order_id) {
            context.status = report.status;
            if report.avg_fill_price.is_some() {
                context.fill_price = report.avg_fill_price;
            }
        }
        Ok(report)
    }

    pub fn get_context(&self, order_id: &str) -> Option<OrderContext> {
        self.orders.get(order_id).map(|c| c.clone())
    }

    /// Point-in-time copy of one position.
    pub async fn get_position(&self, position_id: &str) -> PositionResult<Position> {
        let handle = self.position_handle(position_id)?;
        let position = handle.lock().await;
        Ok(position.clone())
    }

    /// Adopt a position reconstructed by recovery.
    pub fn restore_position(&self, position: Position) {
        self.positions
            .insert(position.id.clone(), Arc::new(Mutex::new(position)));
    }

    fn position_handle(&self, position_id: &str) -> PositionResult<Arc<Mutex<Position>>> {
        self.positions
            .get(position_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PositionError::UnknownPosition(position_id.to_string()))
    }

    fn track_order(
        &self,
        submit: &OrderSubmit,
        order: &OrderRequest,
        selector_name: Option<String>,
        position_id: Option<String>,
    ) {
        self.orders.insert(
            submit.order_id.as_str().to_string(),
            OrderContext {
                order_id: submit.order_id.as_str().to_string(),
                contract: order.contract(),
                side: order.side,
                quantity: order.quantity,
                order_type: order.order_type,
                requested_at: Utc::now(),
                selector_name,
                position_id,
                status: submit.status,
                fill_price: submit.fill_price,
            },
        );
    }

    fn link_order_to_position(&self, order_id: &str, position_id: &str) {
        if let Some(mut context) = self.orders.get_mut(order_id) {
            context.position_id = Some(position_id.to_string());
        }
    }

    async fn run_hooks(&self, kind: EventKind, position: &Position, event: &TradeEvent) {
        for hooks in &self.hooks {
            let result = match kind {
                EventKind::Open => hooks.on_position_opened(position, event).await,
                EventKind::Add => hooks.on_position_added(position, event).await,
                EventKind::Trim => hooks.on_position_trimmed(position, event).await,
                EventKind::Close => hooks.on_position_closed(position, event).await,
            };
            if let Err(e) = result {
                warn!(position_id = %position.id, event = %kind, error = %e, "Position hook failed");
            }
        }
    }
}

#[async_trait]
impl PositionsProvider for OrderManager {
    async fn open_positions(&self) -> Vec<Position> {
        let handles: Vec<Arc<Mutex<Position>>> = self
            .positions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut open = Vec::new();
        for handle in handles {
            let position = handle.lock().await;
            if !position.is_closed() && position.quantity_open > 0 {
                open.push(position.clone());
            }
        }
        open
    }
}

fn filled_price(submit: &OrderSubmit) -> PositionResult<Price> {
    match (submit.status, submit.fill_price) {
        (OrderStatus::Filled, Some(price)) => Ok(price),
        _ => Err(PositionError::NotFilled(
            submit
                .rejection_reason
                .clone()
                .unwrap_or_else(|| submit.status.to_string()),
        )),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_event(
    kind: EventKind,
    position: &Position,
    submit: Option<&OrderSubmit>,
    quantity: Option<u32>,
    fill_price: Option<Price>,
    reason: Option<String>,
    timeframe: Option<String>,
) -> TradeEvent {
    TradeEvent {
        ts: Utc::now(),
        event: kind,
        position_id: position.id.clone(),
        order_id: submit.map(|s| s.order_id.as_str().to_string()),
        order_status: submit.map(|s| s.status.to_string()),
        symbol: position.contract.symbol.clone(),
        kind: position.contract.kind,
        strike: position.contract.strike,
        expiration: position.contract.expiration,
        contract_key: position.contract.key(),
        strategy_tag: position.strategy_tag.clone(),
        timeframe,
        quantity,
        fill_price,
        total_value: TradeEvent::total_value_of(quantity, fill_price),
        avg_entry: position.avg_entry,
        quantity_open: position.quantity_open,
        position_status: position.status.to_string(),
        realized_pnl: Some(position.realized_pnl),
        reason,
    }
}
