//! Contract selection.
//!
//! A selector is a pure function over a quote snapshot plus a
//! request, returning a chosen contract or none. Selectors are named
//! and held in an explicit registry so alternative policies can be
//! swapped by name without touching callers.

pub mod error;
pub mod otm;
pub mod registry;
pub mod request;

pub use error::{SelectorError, SelectorResult};
pub use otm::PriceRangeOtmSelector;
pub use registry::{ContractSelector, SelectorRegistry};
pub use request::{SelectionRequest, SelectionResult};
