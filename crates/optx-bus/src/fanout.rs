//! Generic bounded fanout with per-subscriber delivery queues.
//!
//! Each subscriber owns a bounded mpsc queue or a callback. Delivery
//! never blocks the producer forever: the `Block` policy waits a
//! bounded time and logs the drop, `DropAndLog` drops immediately when
//! the queue is full. Subscribers may filter by item key so that large
//! fanouts (a full option chain) stay cheap for narrow consumers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Backpressure policy for a bounded subscriber queue.
#[derive(Debug, Clone, Copy)]
pub enum DeliveryPolicy {
    /// Wait up to the timeout for queue capacity, then drop and log.
    Block { timeout: Duration },
    /// Drop the item immediately and log when the queue is full.
    DropAndLog,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::DropAndLog
    }
}

/// Handle identifying one subscriber registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

enum Sink<T> {
    Queue {
        tx: mpsc::Sender<T>,
        policy: DeliveryPolicy,
    },
    Callback(Arc<dyn Fn(&T) + Send + Sync>),
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Queue { tx, policy } => Self::Queue {
                tx: tx.clone(),
                policy: *policy,
            },
            Self::Callback(callback) => Self::Callback(Arc::clone(callback)),
        }
    }
}

struct Subscriber<T> {
    sink: Sink<T>,
    /// When set, only items whose key is in this set are delivered.
    keys: Option<HashSet<String>>,
}

type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Fanout of cloneable items to registered subscribers.
pub struct Fanout<T> {
    next_id: AtomicU64,
    subscribers: DashMap<SubscriberId, Subscriber<T>>,
    key_fn: Option<KeyFn<T>>,
}

impl<T: Clone + Send + 'static> Fanout<T> {
    /// Fanout without key filtering; every subscriber sees every item.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: DashMap::new(),
            key_fn: None,
        }
    }

    /// Fanout with a key extractor enabling per-subscriber key filters.
    pub fn keyed(key_fn: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: DashMap::new(),
            key_fn: Some(Arc::new(key_fn)),
        }
    }

    fn insert(&self, subscriber: Subscriber<T>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(id, subscriber);
        id
    }

    /// Register a bounded queue subscriber.
    pub fn subscribe_queue(
        &self,
        capacity: usize,
        policy: DeliveryPolicy,
    ) -> (SubscriberId, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.insert(Subscriber {
            sink: Sink::Queue { tx, policy },
            keys: None,
        });
        (id, rx)
    }

    /// Register a callback subscriber invoked inline on publish.
    pub fn subscribe_with(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriberId {
        self.insert(Subscriber {
            sink: Sink::Callback(Arc::new(callback)),
            keys: None,
        })
    }

    /// Restrict a subscriber to items matching the given keys.
    ///
    /// An empty set delivers nothing until the filter is widened.
    /// No effect on fanouts constructed without a key extractor.
    pub fn set_filter(&self, id: SubscriberId, keys: HashSet<String>) {
        if let Some(mut entry) = self.subscribers.get_mut(&id) {
            entry.keys = Some(keys);
        }
    }

    /// Remove a subscriber. Safe to call with a stale id.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver each item to every matching subscriber exactly once.
    ///
    /// Items are delivered in iteration order per subscriber; closed
    /// queues are pruned after the batch. Subscribers and filters are
    /// snapshotted up front so no map shard guard is held across a
    /// bounded send: a `Block` delivery must never stall concurrent
    /// subscribe/filter calls, which would turn the bounded wait into
    /// a deadlock on a current-thread runtime.
    pub async fn publish(&self, items: &[T]) {
        let snapshot: Vec<(SubscriberId, Sink<T>, Option<HashSet<String>>)> = self
            .subscribers
            .iter()
            .map(|entry| {
                (
                    *entry.key(),
                    entry.value().sink.clone(),
                    entry.value().keys.clone(),
                )
            })
            .collect();

        let mut dead: Vec<SubscriberId> = Vec::new();

        for (id, sink, filter) in &snapshot {
            let id = *id;

            for item in items {
                if let (Some(keys), Some(key_fn)) = (filter, &self.key_fn) {
                    if !keys.contains(&key_fn(item)) {
                        continue;
                    }
                }

                match sink {
                    Sink::Callback(callback) => callback(item),
                    Sink::Queue { tx, policy } => match policy {
                        DeliveryPolicy::DropAndLog => match tx.try_send(item.clone()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                warn!(subscriber = id.0, "Subscriber queue full; dropping item");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                dead.push(id);
                                break;
                            }
                        },
                        DeliveryPolicy::Block { timeout } => {
                            match tokio::time::timeout(*timeout, tx.send(item.clone())).await {
                                Ok(Ok(())) => {}
                                Ok(Err(_)) => {
                                    dead.push(id);
                                    break;
                                }
                                Err(_) => {
                                    warn!(
                                        subscriber = id.0,
                                        timeout_ms = timeout.as_millis() as u64,
                                        "Subscriber send timed out; dropping item"
                                    );
                                }
                            }
                        }
                    },
                }
            }
        }

        for id in dead {
            debug!(subscriber = id.0, "Pruning closed subscriber queue");
            self.subscribers.remove(&id);
        }
    }
}

impl<T: Clone + Send + 'static> Default for Fanout<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_queue_subscriber_sees_every_item() {
        let fanout: Fanout<u32> = Fanout::new();
        let (_id, mut rx) = fanout.subscribe_queue(8, DeliveryPolicy::DropAndLog);

        fanout.publish(&[1, 2, 3]).await;

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_callback_subscriber() {
        let fanout: Fanout<u32> = Fanout::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        fanout.subscribe_with(move |item| sink.lock().unwrap().push(*item));

        fanout.publish(&[7, 8]).await;

        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_drop_and_log_on_full_queue() {
        let fanout: Fanout<u32> = Fanout::new();
        let (_id, mut rx) = fanout.subscribe_queue(1, DeliveryPolicy::DropAndLog);

        fanout.publish(&[1, 2]).await;

        // Second item dropped: queue capacity is 1.
        assert_eq!(rx.recv().await, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_block_policy_waits_then_drops() {
        let fanout: Fanout<u32> = Fanout::new();
        let (_id, mut rx) = fanout.subscribe_queue(
            1,
            DeliveryPolicy::Block {
                timeout: Duration::from_millis(20),
            },
        );

        fanout.publish(&[1]).await;
        // Queue full and nobody reading; publish must return after the
        // bounded wait instead of hanging.
        fanout.publish(&[2]).await;

        assert_eq!(rx.recv().await, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_filter_update_proceeds_while_publish_blocks() {
        let fanout: Arc<Fanout<(String, u32)>> =
            Arc::new(Fanout::keyed(|item: &(String, u32)| item.0.clone()));
        let (id, mut rx) = fanout.subscribe_queue(
            1,
            DeliveryPolicy::Block {
                timeout: Duration::from_millis(50),
            },
        );

        // Fill the queue so the next publish sits in its bounded wait.
        fanout.publish(&[("a".to_string(), 1)]).await;

        let writer = Arc::clone(&fanout);
        let update = tokio::spawn(async move {
            writer.set_filter(id, HashSet::from(["a".to_string()]));
        });

        // Must return after the bounded wait even with a concurrent
        // filter update on the same subscriber; on a current-thread
        // runtime a held map guard would wedge both tasks here.
        fanout.publish(&[("a".to_string(), 2)]).await;
        update.await.unwrap();

        assert_eq!(rx.recv().await, Some(("a".to_string(), 1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_key_filter_limits_delivery() {
        let fanout: Fanout<(String, u32)> = Fanout::keyed(|item: &(String, u32)| item.0.clone());
        let (id, mut rx) = fanout.subscribe_queue(8, DeliveryPolicy::DropAndLog);
        fanout.set_filter(id, HashSet::from(["a".to_string()]));

        fanout
            .publish(&[("a".to_string(), 1), ("b".to_string(), 2)])
            .await;

        assert_eq!(rx.recv().await, Some(("a".to_string(), 1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let fanout: Fanout<u32> = Fanout::new();
        let (id, mut rx) = fanout.subscribe_queue(8, DeliveryPolicy::DropAndLog);
        fanout.unsubscribe(id);

        fanout.publish(&[1]).await;

        assert!(rx.recv().await.is_none());
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_is_pruned() {
        let fanout: Fanout<u32> = Fanout::new();
        let (_id, rx) = fanout.subscribe_queue(8, DeliveryPolicy::DropAndLog);
        drop(rx);

        fanout.publish(&[1]).await;

        assert_eq!(fanout.subscriber_count(), 0);
    }
}
