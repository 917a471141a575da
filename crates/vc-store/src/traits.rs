//! The store capability traits.
//!
//! Any backend implements exactly one of these: [`CounterStore`] for stores
//! that only offer ETag-guarded replace, [`AtomicCounterStore`] for stores
//! that can increment natively.

use async_trait::async_trait;
use tracing::{debug, warn};
use vc_types::{CounterKey, CounterRecord, VersionToken};

use crate::error::{StoreError, StoreResult};

/// Document store offering optimistic concurrency.
///
/// All implementations must satisfy these invariants:
/// - Every successful create or write issues a fresh version token.
/// - `conditional_replace` never mutates state when the token is stale.
/// - `create_item` never overwrites an existing record.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a record by key.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>>;

    /// Create a record. Fails with [`StoreError::AlreadyExists`] if a record
    /// with the same id is present.
    async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord>;

    /// Commit `new_count` only if the stored token equals `expected`.
    ///
    /// Fails with [`StoreError::Conflict`] on a stale token and
    /// [`StoreError::NotFound`] if the record is absent.
    async fn conditional_replace(
        &self,
        key: &CounterKey,
        new_count: u64,
        expected: &VersionToken,
    ) -> StoreResult<CounterRecord>;

    /// Unconditionally write a record. Maintenance use only.
    async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord>;

    /// Return the existing record, or create it at zero.
    ///
    /// When two callers race to create, the loser's create fails with
    /// `AlreadyExists` and it reads the winner's record instead.
    async fn get_or_create(&self, key: &CounterKey) -> StoreResult<CounterRecord> {
        if let Some(record) = self.read_item(key).await? {
            return Ok(record);
        }

        debug!(%key, "creating counter record");
        match self.create_item(&CounterRecord::zero(key.clone())).await {
            Ok(record) => Ok(record),
            Err(StoreError::AlreadyExists { .. }) => {
                warn!(%key, "lost counter creation race; reading existing record");
                self.read_item(key)
                    .await?
                    .ok_or_else(|| StoreError::NotFound { key: key.clone() })
            }
            Err(e) => Err(e),
        }
    }
}

/// Store with a native atomic increment-and-return.
#[async_trait]
pub trait AtomicCounterStore: Send + Sync {
    /// Increment the counter and return the new value. An absent counter is
    /// treated as zero, so the first call returns 1.
    async fn atomic_increment(&self, key: &CounterKey) -> StoreResult<u64>;

    /// Current value, or `None` if the counter was never touched.
    async fn read_count(&self, key: &CounterKey) -> StoreResult<Option<u64>>;

    /// Force the counter back to zero. Maintenance use only.
    async fn reset(&self, key: &CounterKey) -> StoreResult<()>;
}
