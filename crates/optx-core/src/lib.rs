//! Core domain types for the options execution engine.
//!
//! This crate provides fundamental types used throughout the system:
//! - `OptionContract`, `OptionQuote`: option chain identity and snapshots
//! - `Price`: precision-safe decimal price
//! - `OrderRequest`, `OrderSide`, `OrderType`: order submission types

pub mod contract;
pub mod decimal;
pub mod error;
pub mod order;
pub mod quote;

pub use contract::{OptionContract, OptionKind};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use order::{OrderId, OrderRequest, OrderSide, OrderType};
pub use quote::OptionQuote;
