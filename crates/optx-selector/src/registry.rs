//! Selector trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use optx_core::OptionQuote;

use crate::error::{SelectorError, SelectorResult};
use crate::otm::PriceRangeOtmSelector;
use crate::request::{SelectionRequest, SelectionResult};

/// A named contract selection policy.
///
/// `select` returning `None` means no contract satisfied the filter;
/// that is an expected outcome, not an error.
pub trait ContractSelector: Send + Sync {
    fn name(&self) -> &str;

    fn select(&self, quotes: &[OptionQuote], request: &SelectionRequest)
        -> Option<SelectionResult>;
}

/// Explicit registry of selectors, constructed once at startup and
/// passed to the components that need it.
pub struct SelectorRegistry {
    selectors: HashMap<String, Arc<dyn ContractSelector>>,
}

impl SelectorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            selectors: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the default policy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PriceRangeOtmSelector::default()));
        registry
    }

    pub fn register(&mut self, selector: Arc<dyn ContractSelector>) {
        self.selectors.insert(selector.name().to_string(), selector);
    }

    pub fn get(&self, name: &str) -> SelectorResult<Arc<dyn ContractSelector>> {
        self.selectors
            .get(name)
            .cloned()
            .ok_or_else(|| SelectorError::UnknownSelector(name.to_string()))
    }

    /// Sorted selector names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.selectors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
