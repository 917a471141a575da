use std::fmt;
use std::sync::Arc;

use crate::traits::{AtomicCounterStore, CounterStore};

/// A connected store, tagged with the increment strategy it supports.
///
/// Chosen once when the store is built from settings; the engine matches on
/// the variant instead of probing the store at runtime.
#[derive(Clone)]
pub enum CounterBackend {
    /// Store increments natively; no read-modify-write race exists.
    Atomic(Arc<dyn AtomicCounterStore>),
    /// Store offers conditional replace only; increments go through the
    /// optimistic retry loop.
    Optimistic(Arc<dyn CounterStore>),
}

impl CounterBackend {
    pub fn atomic(store: impl AtomicCounterStore + 'static) -> Self {
        Self::Atomic(Arc::new(store))
    }

    pub fn optimistic(store: impl CounterStore + 'static) -> Self {
        Self::Optimistic(Arc::new(store))
    }

    /// Short name of the strategy, used in logs.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Atomic(_) => "atomic",
            Self::Optimistic(_) => "optimistic",
        }
    }
}

impl fmt::Debug for CounterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterBackend")
            .field("strategy", &self.strategy())
            .finish()
    }
}
