//! Mark-to-market streaming for open positions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use optx_bus::{DeliveryPolicy, Fanout, SubscriberId};
use optx_core::{OptionQuote, Price};
use optx_feed::QuoteCache;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::manager::PositionsProvider;
use crate::position::{Position, PositionStatus};

const QUOTE_QUEUE_CAPACITY: usize = 64;

/// Which quote field produced the mark price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSource {
    Bid,
    Mid,
    Last,
    Ask,
}

impl fmt::Display for MarkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Mid => write!(f, "mid"),
            Self::Last => write!(f, "last"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Conservative mark for a long position: bid first, then mid, last,
/// ask.
pub fn select_mark_price(quote: &OptionQuote) -> Option<(Price, MarkSource)> {
    if let Some(bid) = quote.bid {
        return Some((bid, MarkSource::Bid));
    }
    if let Some(mid) = quote.mid() {
        return Some((mid, MarkSource::Mid));
    }
    if let Some(last) = quote.last {
        return Some((last, MarkSource::Last));
    }
    quote.ask.map(|ask| (ask, MarkSource::Ask))
}

/// One mark-to-market observation for one position. Ephemeral; only
/// streamed, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub position_id: String,
    pub contract_key: String,
    pub quote: OptionQuote,
    pub mark_price: Option<Price>,
    pub mark_source: Option<MarkSource>,
    pub unrealized_pnl: Option<Decimal>,
    pub unrealized_pct: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub quantity_open: u32,
    pub avg_entry: Option<Price>,
    pub status: PositionStatus,
    pub strategy_tag: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct WatchState {
    positions: HashMap<String, Position>,
    /// Contract key -> ids of positions holding that contract.
    contract_map: HashMap<String, Vec<String>>,
    active_contracts: HashSet<String>,
}

/// Read-only observer over open positions.
///
/// Subscribes a filtered queue on the quote cache and re-derives the
/// watched contract set on an interval as positions open and close.
/// Never mutates position state.
pub struct PositionWatcher {
    cache: Arc<QuoteCache>,
    positions: Arc<dyn PositionsProvider>,
    refresh_interval: Duration,
    fanout: Fanout<PositionUpdate>,
    task: Mutex<Option<JoinHandle<()>>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    quote_sub: Mutex<Option<SubscriberId>>,
}

impl PositionWatcher {
    pub fn new(
        cache: Arc<QuoteCache>,
        positions: Arc<dyn PositionsProvider>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            cache,
            positions,
            refresh_interval,
            fanout: Fanout::keyed(|update: &PositionUpdate| update.position_id.clone()),
            task: Mutex::new(None),
            stop_tx: Mutex::new(None),
            quote_sub: Mutex::new(None),
        }
    }

    /// Begin watching. Idempotent: a second call while running is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let (sub_id, rx) = self
            .cache
            .register_queue(QUOTE_QUEUE_CAPACITY, DeliveryPolicy::DropAndLog);
        // Nothing watched until the first refresh fills the filter in.
        self.cache.update_listener_contracts(sub_id, HashSet::new());
        *self.quote_sub.lock() = Some(sub_id);

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);

        let watcher = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            watcher.run(rx, stop_rx).await;
        }));

        info!("Position watcher started");
    }

    /// Halt watching and detach from the quote cache. Idempotent.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(true);
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        if let Some(sub_id) = self.quote_sub.lock().take() {
            self.cache.remove_listener(sub_id);
        }
        info!("Position watcher stopped");
    }

    async fn run(&self, mut rx: mpsc::Receiver<OptionQuote>, mut stop_rx: watch::Receiver<bool>) {
        let mut state = WatchState::default();
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {
                    self.refresh(&mut state).await;
                }
                quote = rx.recv() => {
                    let Some(quote) = quote else { break };
                    let updates = build_updates(&state.positions, &state.contract_map, &quote);
                    if !updates.is_empty() {
                        self.fanout.publish(&updates).await;
                    }
                }
            }
        }
    }

    /// Re-derive the watched positions and narrow the quote
    /// subscription to exactly their contracts.
    async fn refresh(&self, state: &mut WatchState) {
        let open = self.positions.open_positions().await;

        state.positions = open.iter().map(|p| (p.id.clone(), p.clone())).collect();
        state.contract_map.clear();
        for position in &open {
            state
                .contract_map
                .entry(position.contract.key())
                .or_default()
                .push(position.id.clone());
        }

        let active: HashSet<String> = state.contract_map.keys().cloned().collect();
        if active != state.active_contracts {
            if let Some(sub_id) = *self.quote_sub.lock() {
                debug!(contracts = active.len(), "Watched contract set changed");
                self.cache.update_listener_contracts(sub_id, active.clone());
            }
            state.active_contracts = active;
        }
    }

    /// Register a callback receiving each position update.
    pub fn register_listener(
        &self,
        callback: impl Fn(&PositionUpdate) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.fanout.subscribe_with(callback)
    }

    /// Register a bounded queue receiving position updates.
    pub fn register_queue(
        &self,
        capacity: usize,
        policy: DeliveryPolicy,
    ) -> (SubscriberId, mpsc::Receiver<PositionUpdate>) {
        self.fanout.subscribe_queue(capacity, policy)
    }

    /// Restrict a subscriber to a set of position ids.
    pub fn update_listener_positions(&self, id: SubscriberId, position_ids: HashSet<String>) {
        self.fanout.set_filter(id, position_ids);
    }

    /// Remove a subscriber. Safe with a stale id.
    pub fn remove_listener(&self, id: SubscriberId) {
        self.fanout.unsubscribe(id);
    }
}

/// Mark every position holding the quoted contract.
fn build_updates(
    positions: &HashMap<String, Position>,
    contract_map: &HashMap<String, Vec<String>>,
    quote: &OptionQuote,
) -> Vec<PositionUpdate> {
    let key = quote.contract.key();
    let Some(position_ids) = contract_map.get(&key) else {
        return Vec::new();
    };

    let now = Utc::now();
    let mark = select_mark_price(quote);
    let mut updates = Vec::with_capacity(position_ids.len());
    for position_id in position_ids {
        let Some(position) = positions.get(position_id) else {
            continue;
        };
        let (unrealized_pnl, unrealized_pct) = match (mark, position.avg_entry) {
            (Some((mark_price, _)), Some(avg_entry)) => {
                let pnl = (mark_price.inner() - avg_entry.inner())
                    * Decimal::from(position.quantity_open);
                (Some(pnl), mark_price.pct_from(avg_entry))
            }
            _ => (None, None),
        };
        updates.push(PositionUpdate {
            position_id: position.id.clone(),
            contract_key: key.clone(),
            quote: quote.clone(),
            mark_price: mark.map(|(price, _)| price),
            mark_source: mark.map(|(_, source)| source),
            unrealized_pnl,
            unrealized_pct,
            realized_pnl: position.realized_pnl,
            quantity_open: position.quantity_open,
            avg_entry: position.avg_entry,
            status: position.status,
            strategy_tag: position.strategy_tag.clone(),
            updated_at: now,
        });
    }
    updates
}
