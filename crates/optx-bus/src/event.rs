//! Candle-close events and the market event bus.

use crate::fanout::{DeliveryPolicy, Fanout, SubscriberId};
use chrono::{DateTime, Utc};
use optx_core::Price;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One closed candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
}

/// Published when a candle closes on some timeframe.
///
/// Ephemeral pub/sub payload; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleCloseEvent {
    pub symbol: String,
    pub timeframe: String,
    pub candle: Candle,
    pub closed_at: DateTime<Utc>,
    pub source: String,
}

/// In-process bus carrying candle-close notifications.
///
/// Every registered listener sees every published event exactly once;
/// delivery order across listeners is unspecified. No persistence, no
/// external transport.
pub struct MarketEventBus {
    fanout: Fanout<CandleCloseEvent>,
}

impl MarketEventBus {
    pub fn new() -> Self {
        Self {
            fanout: Fanout::new(),
        }
    }

    /// Register a callback listener.
    pub fn register_listener(
        &self,
        callback: impl Fn(&CandleCloseEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.fanout.subscribe_with(callback)
    }

    /// Register a bounded queue listener.
    pub fn register_queue(
        &self,
        capacity: usize,
        policy: DeliveryPolicy,
    ) -> (SubscriberId, mpsc::Receiver<CandleCloseEvent>) {
        self.fanout.subscribe_queue(capacity, policy)
    }

    /// Remove a listener. Safe with a stale id.
    pub fn remove_listener(&self, id: SubscriberId) {
        self.fanout.unsubscribe(id);
    }

    /// Deliver the event to every registered listener.
    pub async fn publish_candle_close(&self, event: CandleCloseEvent) {
        self.fanout.publish(std::slice::from_ref(&event)).await;
    }
}

impl Default for MarketEventBus {
    fn default() -> Self {
        Self::new()
    }
}
