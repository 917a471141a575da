use tracing::{debug, error, info, warn};
use vc_store::{CounterBackend, CounterStore, StoreError, StoreSettings};
use vc_types::{CounterKey, CounterRecord};

use crate::error::{EngineError, EngineResult};
use crate::policy::RetryPolicy;

/// Runs the increment protocol against one counter.
///
/// The engine holds no counter state of its own. Every call goes to the
/// store, and the store's conditional write is the only synchronization
/// point, so any number of engines (in any number of processes) can share a
/// counter.
#[derive(Clone, Debug)]
pub struct IncrementEngine {
    backend: CounterBackend,
    key: CounterKey,
    policy: RetryPolicy,
}

impl IncrementEngine {
    pub fn new(backend: CounterBackend, key: CounterKey, policy: RetryPolicy) -> EngineResult<Self> {
        policy.validate()?;
        Ok(Self {
            backend,
            key,
            policy,
        })
    }

    /// Validate the policy and connect the store described by `settings`.
    /// Both checks happen before the store is called.
    pub fn from_settings(
        settings: &StoreSettings,
        key: CounterKey,
        policy: RetryPolicy,
    ) -> EngineResult<Self> {
        policy.validate()?;
        let backend = settings.connect()?;
        Self::new(backend, key, policy)
    }

    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn strategy(&self) -> &'static str {
        self.backend.strategy()
    }

    /// Increment the counter and return the committed value.
    pub async fn increment(&self) -> EngineResult<u64> {
        match &self.backend {
            CounterBackend::Atomic(store) => {
                let count = store.atomic_increment(&self.key).await?;
                info!(key = %self.key, count, "counter incremented");
                Ok(count)
            }
            CounterBackend::Optimistic(store) => self.increment_optimistic(store.as_ref()).await,
        }
    }

    /// Read-compute-conditional-write, retried on version conflicts.
    async fn increment_optimistic(&self, store: &dyn CounterStore) -> EngineResult<u64> {
        let max_retries = self.policy.max_retries;

        for attempt in 0..max_retries {
            let record = store.get_or_create(&self.key).await?;
            let (token, new_count) = self.next_write(&record)?;

            match store.conditional_replace(&self.key, new_count, token).await {
                Ok(committed) => {
                    info!(
                        key = %self.key,
                        from = record.count,
                        to = committed.count,
                        attempts = attempt + 1,
                        "counter incremented"
                    );
                    return Ok(committed.count);
                }
                Err(e) if e.is_conflict() => {
                    warn!(key = %self.key, attempt = attempt + 1, max_retries, "version conflict");
                    if attempt + 1 < max_retries {
                        let delay = self.policy.backoff(attempt);
                        debug!(delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(key = %self.key, attempts = max_retries, "increment retries exhausted");
        Err(EngineError::RetriesExhausted {
            attempts: max_retries,
        })
    }

    fn next_write<'a>(
        &self,
        record: &'a CounterRecord,
    ) -> EngineResult<(&'a vc_types::VersionToken, u64)> {
        let token = record.version.as_ref().ok_or_else(|| {
            EngineError::Store(StoreError::Unavailable(format!(
                "counter {} has no version token",
                self.key
            )))
        })?;
        let new_count = record.count.checked_add(1).ok_or_else(|| {
            EngineError::Store(StoreError::Unavailable(format!(
                "counter {} overflowed",
                self.key
            )))
        })?;
        Ok((token, new_count))
    }

    /// Current value without incrementing. Creates the record at zero on a
    /// document store that has never seen it.
    pub async fn current(&self) -> EngineResult<u64> {
        match &self.backend {
            CounterBackend::Atomic(store) => Ok(store.read_count(&self.key).await?.unwrap_or(0)),
            CounterBackend::Optimistic(store) => Ok(store.get_or_create(&self.key).await?.count),
        }
    }

    /// Force the counter back to zero. Development use only.
    pub async fn reset(&self) -> EngineResult<()> {
        match &self.backend {
            CounterBackend::Atomic(store) => store.reset(&self.key).await?,
            CounterBackend::Optimistic(store) => {
                store
                    .upsert_item(&CounterRecord::zero(self.key.clone()))
                    .await?;
            }
        }
        warn!(key = %self.key, "counter reset to zero");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use vc_store::{
        BackendKind, FileAtomicStore, FileCounterStore, InMemoryAtomicStore, InMemoryCounterStore,
        StoreResult,
    };
    use vc_types::VersionToken;

    /// Wraps the in-memory store and fails the next `conflicts` replaces.
    ///
    /// With `competitor` set, each injected conflict is a real one: another
    /// writer commits an increment first. Without it the conflict is reported
    /// and nothing changes.
    struct ScriptedStore {
        inner: InMemoryCounterStore,
        conflicts: AtomicU32,
        competitor: bool,
        replace_calls: AtomicU32,
    }

    impl ScriptedStore {
        fn new(conflicts: u32, competitor: bool) -> Self {
            Self {
                inner: InMemoryCounterStore::new(),
                conflicts: AtomicU32::new(conflicts),
                competitor,
                replace_calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.replace_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CounterStore for ScriptedStore {
        async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
            self.inner.read_item(key).await
        }

        async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
            self.inner.create_item(record).await
        }

        async fn conditional_replace(
            &self,
            key: &CounterKey,
            new_count: u64,
            expected: &VersionToken,
        ) -> StoreResult<CounterRecord> {
            self.replace_calls.fetch_add(1, Ordering::SeqCst);
            let inject = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if inject {
                if !self.competitor {
                    return Err(StoreError::Conflict { key: key.clone() });
                }
                let theirs = self.inner.get_or_create(key).await?;
                let token = theirs.version.clone().unwrap();
                self.inner
                    .conditional_replace(key, theirs.count + 1, &token)
                    .await?;
            }
            self.inner.conditional_replace(key, new_count, expected).await
        }

        async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
            self.inner.upsert_item(record).await
        }
    }

    /// Store whose writes fail with an unexpected error.
    struct BrokenStore {
        inner: InMemoryCounterStore,
        replace_calls: AtomicU32,
    }

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
            self.inner.read_item(key).await
        }

        async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
            self.inner.create_item(record).await
        }

        async fn conditional_replace(
            &self,
            _key: &CounterKey,
            _new_count: u64,
            _expected: &VersionToken,
        ) -> StoreResult<CounterRecord> {
            self.replace_calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection reset".into()))
        }

        async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
            self.inner.upsert_item(record).await
        }
    }

    fn engine_over(store: Arc<dyn CounterStore>, policy: RetryPolicy) -> IncrementEngine {
        IncrementEngine::new(CounterBackend::Optimistic(store), CounterKey::default(), policy)
            .unwrap()
    }

    #[tokio::test]
    async fn first_increment_on_fresh_counter_is_one() {
        let engine = engine_over(Arc::new(InMemoryCounterStore::new()), RetryPolicy::immediate(5));
        assert_eq!(engine.increment().await.unwrap(), 1);
        assert_eq!(engine.increment().await.unwrap(), 2);
        assert_eq!(engine.current().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recovers_after_fewer_conflicts_than_budget() {
        let store = Arc::new(ScriptedStore::new(3, false));
        let engine = engine_over(store.clone(), RetryPolicy::immediate(5));

        assert_eq!(engine.increment().await.unwrap(), 1);
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn competing_writes_are_not_lost() {
        let store = Arc::new(ScriptedStore::new(2, true));
        let engine = engine_over(store.clone(), RetryPolicy::immediate(5));

        // Two competitor increments land first, ours commits on the third try.
        assert_eq!(engine.increment().await.unwrap(), 3);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn persistent_conflict_exhausts_after_exactly_max_retries() {
        let store = Arc::new(ScriptedStore::new(u32::MAX, false));
        let engine = engine_over(store.clone(), RetryPolicy::immediate(5));

        let err = engine.increment().await.unwrap_err();
        assert!(matches!(err, EngineError::RetriesExhausted { attempts: 5 }));
        assert_eq!(store.calls(), 5);
        assert_eq!(engine.current().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scenario_count_one_two_then_three_after_conflict() {
        let store = Arc::new(ScriptedStore::new(0, false));
        let engine = engine_over(store.clone(), RetryPolicy::immediate(5));

        assert_eq!(engine.increment().await.unwrap(), 1);
        assert_eq!(engine.increment().await.unwrap(), 2);

        store.conflicts.store(1, Ordering::SeqCst);
        assert_eq!(engine.increment().await.unwrap(), 3);
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn unexpected_store_error_is_not_retried() {
        let store = Arc::new(BrokenStore {
            inner: InMemoryCounterStore::new(),
            replace_calls: AtomicU32::new(0),
        });
        let engine = engine_over(store.clone(), RetryPolicy::immediate(5));

        let err = engine.increment().await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.replace_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backoff_sleeps_between_attempts_only() {
        let store = Arc::new(ScriptedStore::new(u32::MAX, false));
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 1_000,
        };
        let engine = engine_over(store, policy);

        let started = std::time::Instant::now();
        engine.increment().await.unwrap_err();
        // 10ms + 20ms between three attempts, no sleep after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(30));
        assert!(elapsed < std::time::Duration::from_millis(70 + 500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_lose_no_updates() {
        const N: u64 = 50;
        let policy = RetryPolicy {
            max_retries: 500,
            base_delay_ms: 1,
            max_delay_ms: 4,
        };
        let engine = Arc::new(engine_over(Arc::new(InMemoryCounterStore::new()), policy));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.increment().await })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            seen.insert(h.await.unwrap().unwrap());
        }
        assert_eq!(seen, (1..=N).collect::<HashSet<_>>());
        assert_eq!(engine.current().await.unwrap(), N);
    }

    async fn increment_concurrently(engine: IncrementEngine, n: u64) -> HashSet<u64> {
        let engine = Arc::new(engine);
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.increment().await })
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            seen.insert(h.await.unwrap().unwrap());
        }
        seen
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_on_file_store_lose_no_updates() {
        const N: u64 = 24;
        let dir = tempfile::tempdir().unwrap();
        let policy = RetryPolicy {
            max_retries: 500,
            base_delay_ms: 1,
            max_delay_ms: 4,
        };
        let engine = engine_over(Arc::new(FileCounterStore::open(dir.path()).unwrap()), policy);

        let seen = increment_concurrently(engine, N).await;
        assert_eq!(seen, (1..=N).collect::<HashSet<_>>());

        let reopened = engine_over(Arc::new(FileCounterStore::open(dir.path()).unwrap()), policy);
        assert_eq!(reopened.current().await.unwrap(), N);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_on_atomic_file_store_lose_no_updates() {
        const N: u64 = 24;
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            IncrementEngine::new(
                CounterBackend::atomic(FileAtomicStore::open(dir.path()).unwrap()),
                CounterKey::default(),
                RetryPolicy::default(),
            )
            .unwrap()
        };

        let seen = increment_concurrently(open(), N).await;
        assert_eq!(seen, (1..=N).collect::<HashSet<_>>());
        assert_eq!(open().current().await.unwrap(), N);
        assert_eq!(open().increment().await.unwrap(), N + 1);
    }

    #[tokio::test]
    async fn atomic_strategy_bypasses_retry_loop() {
        let engine = IncrementEngine::new(
            CounterBackend::atomic(InMemoryAtomicStore::new()),
            CounterKey::default(),
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(engine.strategy(), "atomic");
        assert_eq!(engine.current().await.unwrap(), 0);
        assert_eq!(engine.increment().await.unwrap(), 1);
        assert_eq!(engine.increment().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_returns_both_strategies_to_zero() {
        for kind in [BackendKind::Memory, BackendKind::Atomic] {
            let settings = StoreSettings {
                backend: kind,
                ..Default::default()
            };
            let engine =
                IncrementEngine::from_settings(&settings, CounterKey::default(), RetryPolicy::default())
                    .unwrap();
            engine.increment().await.unwrap();
            engine.reset().await.unwrap();
            assert_eq!(engine.current().await.unwrap(), 0);
            assert_eq!(engine.increment().await.unwrap(), 1);
        }
    }

    #[test]
    fn missing_connection_parameters_fail_before_store_use() {
        let settings = StoreSettings {
            backend: BackendKind::Http,
            ..Default::default()
        };
        let err = IncrementEngine::from_settings(&settings, CounterKey::default(), RetryPolicy::default())
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn zero_retry_budget_is_config_error() {
        let err = IncrementEngine::from_settings(
            &StoreSettings::default(),
            CounterKey::default(),
            RetryPolicy::immediate(0),
        )
        .unwrap_err();
        assert!(err.is_config());
    }
}
