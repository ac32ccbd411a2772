//! Polling quote cache with change-detection fanout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use optx_bus::{DeliveryPolicy, Fanout, SubscriberId};
use optx_core::OptionQuote;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::source::{QuoteSource, QuoteView};

/// Quote cache configuration.
#[derive(Debug, Clone)]
pub struct QuoteCacheConfig {
    /// Underlying symbol served by this cache.
    pub symbol: String,
    /// Expiration context for the chain.
    pub expiration: NaiveDate,
    /// How often to hit the quote source.
    pub poll_interval: Duration,
}

/// Central quote cache for a single symbol/expiration.
///
/// One writer (the poll task), many readers. Readers always see an
/// atomic point-in-time view: the poll task applies a whole cycle's
/// updates under one write lock, never entry by entry across locks.
/// A poll failure keeps the last-known-good quotes; stale-but-present
/// is preferred over empty.
pub struct QuoteCache {
    source: Arc<dyn QuoteSource>,
    symbol: String,
    expiration: RwLock<NaiveDate>,
    poll_interval: RwLock<Duration>,
    quotes: RwLock<HashMap<String, OptionQuote>>,
    fanout: Fanout<OptionQuote>,
    task: Mutex<Option<JoinHandle<()>>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl QuoteCache {
    pub fn new(source: Arc<dyn QuoteSource>, config: QuoteCacheConfig) -> Self {
        Self {
            source,
            symbol: config.symbol,
            expiration: RwLock::new(config.expiration),
            poll_interval: RwLock::new(config.poll_interval),
            quotes: RwLock::new(HashMap::new()),
            fanout: Fanout::keyed(|quote: &OptionQuote| quote.contract.key()),
            task: Mutex::new(None),
            stop_tx: Mutex::new(None),
        }
    }

    /// Begin the poll loop. Idempotent: a second call while running
    /// is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(stop_tx);

        let cache = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            cache.run(stop_rx).await;
        }));

        info!(symbol = %self.symbol, "Quote cache started");
    }

    /// Halt the poll loop and wait for the task to exit. Idempotent;
    /// already-delivered queue items stay with their subscribers.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.stop_tx.lock().take() {
            let _ = stop_tx.send(true);
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(symbol = %self.symbol, "Quote cache stopped");
    }

    async fn run(&self, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            let expiration = *self.expiration.read();
            match self.source.fetch_quotes(&self.symbol, expiration).await {
                Ok(quotes) => {
                    let changed = self.apply_updates(quotes);
                    if !changed.is_empty() {
                        debug!(
                            symbol = %self.symbol,
                            changed = changed.len(),
                            "Quote poll applied"
                        );
                        self.fanout.publish(&changed).await;
                    }
                }
                Err(FeedError::RateLimited { retry_after }) => {
                    warn!(
                        symbol = %self.symbol,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Quote source rate limited"
                    );
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = tokio::time::sleep(retry_after) => {}
                    }
                }
                Err(e) => {
                    // Cache keeps last-known-good; retry next tick.
                    warn!(symbol = %self.symbol, error = %e, "Quote poll failed");
                }
            }

            let interval = *self.poll_interval.read();
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Store incoming quotes, returning only those that are new or
    /// whose bid/ask/last differ from the cached value. One write
    /// lock covers the whole cycle so readers never see a partially
    /// applied poll.
    fn apply_updates(&self, incoming: Vec<OptionQuote>) -> Vec<OptionQuote> {
        let mut quotes = self.quotes.write();
        let mut changed = Vec::new();
        for quote in incoming {
            let key = quote.contract.key();
            let is_change = match quotes.get(&key) {
                Some(existing) => quote.changed_from(existing),
                None => true,
            };
            if is_change {
                quotes.insert(key, quote.clone());
                changed.push(quote);
            }
        }
        changed
    }

    /// Atomic point-in-time copy of the full key -> quote mapping.
    pub fn get_snapshot(&self) -> HashMap<String, OptionQuote> {
        self.quotes.read().clone()
    }

    /// Latest quote for one contract key.
    pub fn get_quote(&self, contract_key: &str) -> Option<OptionQuote> {
        self.quotes.read().get(contract_key).cloned()
    }

    /// Register a callback receiving each changed quote.
    pub fn register_listener(
        &self,
        callback: impl Fn(&OptionQuote) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.fanout.subscribe_with(callback)
    }

    /// Register a bounded queue receiving changed quotes.
    pub fn register_queue(
        &self,
        capacity: usize,
        policy: DeliveryPolicy,
    ) -> (SubscriberId, mpsc::Receiver<OptionQuote>) {
        self.fanout.subscribe_queue(capacity, policy)
    }

    /// Restrict a subscriber to a set of contract keys.
    pub fn update_listener_contracts(&self, id: SubscriberId, contract_keys: HashSet<String>) {
        self.fanout.set_filter(id, contract_keys);
    }

    /// Remove a subscriber. Safe with a stale id.
    pub fn remove_listener(&self, id: SubscriberId) {
        self.fanout.unsubscribe(id);
    }

    /// Switch the expiration context. Clears the cache when the
    /// expiration actually changes; stale keys from the old chain
    /// must not linger.
    pub fn set_expiration(&self, expiration: NaiveDate) {
        let mut current = self.expiration.write();
        if *current != expiration {
            self.quotes.write().clear();
            info!(
                symbol = %self.symbol,
                expiration = %expiration,
                "Expiration changed; cache cleared"
            );
        }
        *current = expiration;
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        *self.poll_interval.write() = interval;
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn expiration(&self) -> NaiveDate {
        *self.expiration.read()
    }
}

impl QuoteView for QuoteCache {
    fn get_snapshot(&self) -> HashMap<String, OptionQuote> {
        QuoteCache::get_snapshot(self)
    }

    fn get_quote(&self, contract_key: &str) -> Option<OptionQuote> {
        QuoteCache::get_quote(self, contract_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use optx_core::{OptionContract, OptionKind, Price};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
    }

    fn quote(strike: Decimal, bid: Decimal, ask: Decimal) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new("SPY", OptionKind::Call, Price::new(strike), expiry()),
            bid: Some(Price::new(bid)),
            ask: Some(Price::new(ask)),
            last: None,
            volume: None,
            open_interest: None,
            updated_at: Utc::now(),
        }
    }

    /// Source that replays scripted poll cycles, then errors.
    struct ScriptedSource {
        cycles: Mutex<Vec<FeedResult<Vec<OptionQuote>>>>,
    }

    impl ScriptedSource {
        fn new(cycles: Vec<FeedResult<Vec<OptionQuote>>>) -> Self {
            Self {
                cycles: Mutex::new(cycles),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn fetch_quotes(
            &self,
            _symbol: &str,
            _expiration: NaiveDate,
        ) -> FeedResult<Vec<OptionQuote>> {
            let mut cycles = self.cycles.lock();
            if cycles.is_empty() {
                return Err(FeedError::Http("script exhausted".into()));
            }
            cycles.remove(0)
        }
    }

    fn cache_with(cycles: Vec<FeedResult<Vec<OptionQuote>>>) -> Arc<QuoteCache> {
        Arc::new(QuoteCache::new(
            Arc::new(ScriptedSource::new(cycles)),
            QuoteCacheConfig {
                symbol: "SPY".to_string(),
                expiration: expiry(),
                poll_interval: Duration::from_millis(5),
            },
        ))
    }

    #[tokio::test]
    async fn test_unchanged_quotes_are_suppressed() {
        let cache = cache_with(vec![
            Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.2))]),
            // Identical bid/ask/last: no notification.
            Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.2))]),
            // Ask moved: notification.
            Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.3))]),
        ]);
        let (_id, mut rx) = cache.register_queue(8, DeliveryPolicy::DropAndLog);

        cache.start();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.ask, Some(Price::new(dec!(1.2))));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.ask, Some(Price::new(dec!(1.3))));
        cache.stop().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_cache() {
        let cache = cache_with(vec![
            Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.2))]),
            Err(FeedError::Http("timeout".into())),
        ]);
        let (_id, mut rx) = cache.register_queue(8, DeliveryPolicy::DropAndLog);

        cache.start();
        let _ = rx.recv().await.unwrap();
        // Give the failing poll a chance to run.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.stop().await;

        // Stale-but-present beats empty.
        let snapshot = cache.get_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(cache.get_quote("SPY-call-520-20260106").is_some());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let cache = cache_with(vec![Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.2))])]);
        cache.start();
        cache.start(); // second start is a no-op
        cache.stop().await;
        cache.stop().await; // second stop is a no-op
    }

    #[tokio::test]
    async fn test_key_filter_narrows_subscription() {
        let cache = cache_with(vec![Ok(vec![
            quote(dec!(520), dec!(1.0), dec!(1.2)),
            quote(dec!(521), dec!(0.8), dec!(1.0)),
        ])]);
        let (id, mut rx) = cache.register_queue(8, DeliveryPolicy::DropAndLog);
        cache.update_listener_contracts(id, HashSet::from(["SPY-call-521-20260106".to_string()]));

        cache.start();
        let only = rx.recv().await.unwrap();
        assert_eq!(only.contract.key(), "SPY-call-521-20260106");
        cache.stop().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_expiration_clears_cache() {
        let cache = cache_with(vec![Ok(vec![quote(dec!(520), dec!(1.0), dec!(1.2))])]);
        let (_id, mut rx) = cache.register_queue(8, DeliveryPolicy::DropAndLog);

        cache.start();
        let _ = rx.recv().await.unwrap();
        cache.stop().await;

        cache.set_expiration(NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert!(cache.get_snapshot().is_empty());
    }
}
