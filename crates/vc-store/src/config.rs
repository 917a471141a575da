use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::CounterBackend;
use crate::error::{StoreError, StoreResult};
use crate::file::{FileAtomicStore, FileCounterStore};
use crate::http::HttpCounterStore;
use crate::memory::{InMemoryAtomicStore, InMemoryCounterStore};

pub const DEFAULT_DATABASE: &str = "viewCounterDb";
pub const DEFAULT_CONTAINER: &str = "counter";

/// Which store implementation to connect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process document store with ETag semantics.
    #[default]
    Memory,
    /// In-process store with native atomic increment.
    Atomic,
    /// JSON documents under `data_dir`.
    File,
    /// Counters under `data_dir`, incremented natively under a lock.
    #[serde(rename = "atomic-file")]
    AtomicFile,
    /// Remote document database at `endpoint`.
    Http,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Atomic => "atomic",
            Self::File => "file",
            Self::AtomicFile => "atomic-file",
            Self::Http => "http",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "atomic" => Ok(Self::Atomic),
            "file" => Ok(Self::File),
            "atomic-file" | "atomic_file" => Ok(Self::AtomicFile),
            "http" => Ok(Self::Http),
            other => Err(StoreError::Config(format!("unknown store backend: {other}"))),
        }
    }
}

/// Connection settings for the counter store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: BackendKind,
    /// Base URL of the document database (`http` backend).
    pub endpoint: Option<String>,
    /// Credential presented to the document database (`http` backend).
    pub key: Option<String>,
    pub database: String,
    pub container: String,
    /// Directory holding record files (`file` and `atomic-file` backends).
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoint: None,
            key: None,
            database: DEFAULT_DATABASE.into(),
            container: DEFAULT_CONTAINER.into(),
            data_dir: None,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl StoreSettings {
    /// Check that every parameter the selected backend needs is present.
    pub fn validate(&self) -> StoreResult<()> {
        match self.backend {
            BackendKind::Memory | BackendKind::Atomic => Ok(()),
            BackendKind::File | BackendKind::AtomicFile => self.data_dir().map(|_| ()),
            BackendKind::Http => match (present(&self.endpoint), present(&self.key)) {
                (Some(_), Some(_)) => Ok(()),
                _ => Err(StoreError::Config("missing store endpoint or key".into())),
            },
        }
    }

    fn data_dir(&self) -> StoreResult<&PathBuf> {
        self.data_dir
            .as_ref()
            .ok_or_else(|| StoreError::Config(format!("{} backend requires data_dir", self.backend)))
    }

    /// Validate, then build the selected store.
    ///
    /// Configuration problems surface here, before any store call is made.
    pub fn connect(&self) -> StoreResult<CounterBackend> {
        self.validate()?;
        let backend = match self.backend {
            BackendKind::Memory => CounterBackend::optimistic(InMemoryCounterStore::new()),
            BackendKind::Atomic => CounterBackend::atomic(InMemoryAtomicStore::new()),
            BackendKind::File => CounterBackend::optimistic(FileCounterStore::open(self.data_dir()?)?),
            BackendKind::AtomicFile => CounterBackend::atomic(FileAtomicStore::open(self.data_dir()?)?),
            BackendKind::Http => {
                let (endpoint, key) = match (present(&self.endpoint), present(&self.key)) {
                    (Some(endpoint), Some(key)) => (endpoint, key),
                    _ => return Err(StoreError::Config("missing store endpoint or key".into())),
                };
                CounterBackend::optimistic(HttpCounterStore::new(
                    endpoint,
                    key,
                    self.database.clone(),
                    self.container.clone(),
                )?)
            }
        };
        info!(backend = %self.backend, strategy = backend.strategy(), "counter store connected");
        Ok(backend)
    }

    /// Copy of these settings that is safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            key: self.key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}
