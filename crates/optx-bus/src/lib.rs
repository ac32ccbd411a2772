//! In-process publish/subscribe for the options engine.
//!
//! Provides a generic bounded fanout used by the quote cache and the
//! position watcher, plus the `MarketEventBus` carrying candle-close
//! notifications that drive strategy evaluation timing.

pub mod event;
pub mod fanout;

pub use event::{Candle, CandleCloseEvent, MarketEventBus};
pub use fanout::{DeliveryPolicy, Fanout, SubscriberId};
