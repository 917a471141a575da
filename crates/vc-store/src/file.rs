//! File-backed counter stores for local development.
//!
//! Each record lives in `<root>/<key>.json` as a pretty-printed document.
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a reader never sees a half-written record.
//!
//! Two stores share this layout:
//!
//! - [`FileCounterStore`] stamps a version token on every write and checks it
//!   on conditional replace.
//! - [`FileAtomicStore`] increments under the directory lock and keeps no
//!   token.
//!
//! Point each data directory at one kind only. Writes are checked under a
//! lock owned by the store instance; writers in other processes are not
//! coordinated. All disk work runs on the blocking thread pool.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;
use vc_types::{CounterKey, CounterRecord, VersionToken};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AtomicCounterStore, CounterStore};

/// A data directory plus the lock that serializes writers to it.
#[derive(Debug)]
struct DataDir {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DataDir {
    fn open(root: PathBuf) -> StoreResult<Arc<Self>> {
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "file counter store opened");
        Ok(Arc::new(Self {
            root,
            write_lock: Mutex::new(()),
        }))
    }

    fn path_for(&self, key: &CounterKey) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn load(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, record: &CounterRecord) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, record)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(&record.id))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// Run `f` against `dir` on the blocking pool.
async fn offload<T, F>(dir: &Arc<DataDir>, f: F) -> StoreResult<T>
where
    F: FnOnce(&DataDir) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let dir = Arc::clone(dir);
    tokio::task::spawn_blocking(move || f(&dir))
        .await
        .map_err(|e| StoreError::Unavailable(format!("file store task failed: {e}")))?
}

/// A [`CounterStore`] persisted as JSON files under a data directory.
#[derive(Clone, Debug)]
pub struct FileCounterStore {
    dir: Arc<DataDir>,
}

impl FileCounterStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            dir: DataDir::open(root.into())?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.dir.root
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
        let key = key.clone();
        offload(&self.dir, move |dir| dir.load(&key)).await
    }

    async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let record = record.clone();
        offload(&self.dir, move |dir| {
            let _guard = dir.lock()?;
            if dir.path_for(&record.id).exists() {
                return Err(StoreError::AlreadyExists { key: record.id });
            }
            let created = record.stamped();
            dir.persist(&created)?;
            Ok(created)
        })
        .await
    }

    async fn conditional_replace(
        &self,
        key: &CounterKey,
        new_count: u64,
        expected: &VersionToken,
    ) -> StoreResult<CounterRecord> {
        let key = key.clone();
        let expected = expected.clone();
        offload(&self.dir, move |dir| {
            let _guard = dir.lock()?;
            let current = dir
                .load(&key)?
                .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
            if !current.is_at(&expected) {
                return Err(StoreError::Conflict { key });
            }
            let written = CounterRecord::with_count(key, new_count).stamped();
            dir.persist(&written)?;
            Ok(written)
        })
        .await
    }

    async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let written = CounterRecord::with_count(record.id.clone(), record.count);
        offload(&self.dir, move |dir| {
            let _guard = dir.lock()?;
            let written = written.stamped();
            dir.persist(&written)?;
            Ok(written)
        })
        .await
    }
}

/// An [`AtomicCounterStore`] persisted as JSON files under a data directory.
///
/// Increment is read, add, and rename-into-place under the directory lock,
/// so concurrent callers on one instance each see a distinct value.
#[derive(Clone, Debug)]
pub struct FileAtomicStore {
    dir: Arc<DataDir>,
}

impl FileAtomicStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            dir: DataDir::open(root.into())?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.dir.root
    }
}

#[async_trait]
impl AtomicCounterStore for FileAtomicStore {
    async fn atomic_increment(&self, key: &CounterKey) -> StoreResult<u64> {
        let key = key.clone();
        offload(&self.dir, move |dir| {
            let _guard = dir.lock()?;
            let current = dir.load(&key)?.map_or(0, |rec| rec.count);
            let next = current
                .checked_add(1)
                .ok_or_else(|| StoreError::Unavailable(format!("counter {key} overflowed")))?;
            dir.persist(&CounterRecord::with_count(key, next).touched())?;
            Ok(next)
        })
        .await
    }

    async fn read_count(&self, key: &CounterKey) -> StoreResult<Option<u64>> {
        let key = key.clone();
        offload(&self.dir, move |dir| Ok(dir.load(&key)?.map(|rec| rec.count))).await
    }

    async fn reset(&self, key: &CounterKey) -> StoreResult<()> {
        let key = key.clone();
        offload(&self.dir, move |dir| {
            let _guard = dir.lock()?;
            dir.persist(&CounterRecord::zero(key).touched())
        })
        .await
    }
}
