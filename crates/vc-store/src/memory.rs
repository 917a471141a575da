//! In-memory counter stores for tests, local development, and ephemeral use.
//!
//! [`InMemoryCounterStore`] keeps documents in a `HashMap` behind a `RwLock`
//! and enforces ETag semantics exactly like a remote document store.
//! [`InMemoryAtomicStore`] keeps bare integers behind a `Mutex` and
//! increments them in place. Data is lost when the store is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use vc_types::{CounterKey, CounterRecord, VersionToken};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AtomicCounterStore, CounterStore};

fn poisoned(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {e}"))
}

/// An in-memory implementation of [`CounterStore`].
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    items: RwLock<HashMap<CounterKey, CounterRecord>>,
}

impl InMemoryCounterStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(key).cloned())
    }

    async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let mut items = self.items.write().map_err(poisoned)?;
        if items.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                key: record.id.clone(),
            });
        }
        let created = record.clone().stamped();
        items.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn conditional_replace(
        &self,
        key: &CounterKey,
        new_count: u64,
        expected: &VersionToken,
    ) -> StoreResult<CounterRecord> {
        let mut items = self.items.write().map_err(poisoned)?;
        let current = items
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        if !current.is_at(expected) {
            return Err(StoreError::Conflict { key: key.clone() });
        }
        *current = CounterRecord::with_count(key.clone(), new_count).stamped();
        Ok(current.clone())
    }

    async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let mut items = self.items.write().map_err(poisoned)?;
        let written = CounterRecord::with_count(record.id.clone(), record.count).stamped();
        items.insert(written.id.clone(), written.clone());
        Ok(written)
    }
}

/// An in-memory implementation of [`AtomicCounterStore`].
#[derive(Debug, Default)]
pub struct InMemoryAtomicStore {
    counts: Mutex<HashMap<CounterKey, u64>>,
}

impl InMemoryAtomicStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AtomicCounterStore for InMemoryAtomicStore {
    async fn atomic_increment(&self, key: &CounterKey) -> StoreResult<u64> {
        let mut counts = self.counts.lock().map_err(poisoned)?;
        let count = counts.entry(key.clone()).or_insert(0);
        *count = count
            .checked_add(1)
            .ok_or_else(|| StoreError::Unavailable(format!("counter {key} overflowed")))?;
        Ok(*count)
    }

    async fn read_count(&self, key: &CounterKey) -> StoreResult<Option<u64>> {
        let counts = self.counts.lock().map_err(poisoned)?;
        Ok(counts.get(key).copied())
    }

    async fn reset(&self, key: &CounterKey) -> StoreResult<()> {
        let mut counts = self.counts.lock().map_err(poisoned)?;
        counts.insert(key.clone(), 0);
        Ok(())
    }
}
