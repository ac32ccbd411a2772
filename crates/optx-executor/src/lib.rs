//! Order execution.
//!
//! Both executors accept the same [`optx_core::OrderRequest`] and
//! report through the same [`OrderExecutor`] trait, so the order
//! manager is indifferent to whether fills are simulated or live.
//!
//! - [`PaperExecutor`]: fills synchronously against cached quotes
//! - [`TradierExecutor`]: live REST submission, no local simulation

pub mod error;
pub mod executor;
pub mod paper;
pub mod tradier;

pub use error::{ExecutorError, ExecutorResult};
pub use executor::{OrderExecutor, OrderStatus, OrderSubmit, StatusReport};
pub use paper::PaperExecutor;
pub use tradier::TradierExecutor;
