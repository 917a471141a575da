use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vc_engine::{EngineResult, IncrementEngine, RetryPolicy};
use vc_store::{BackendKind, StoreSettings};
use vc_types::{CounterKey, DEFAULT_PARTITION_KEY};

use crate::error::{ServerError, ServerResult};

/// Environment variables that override file configuration.
pub mod env {
    pub const BIND_ADDR: &str = "COUNTER_BIND_ADDR";
    pub const ALLOW_RESET: &str = "COUNTER_ALLOW_RESET";
    pub const STORE_BACKEND: &str = "COUNTER_STORE_BACKEND";
    pub const STORE_ENDPOINT: &str = "COUNTER_STORE_ENDPOINT";
    pub const STORE_KEY: &str = "COUNTER_STORE_KEY";
    pub const DATABASE_NAME: &str = "COUNTER_DATABASE_NAME";
    pub const CONTAINER_NAME: &str = "COUNTER_CONTAINER_NAME";
    pub const DATA_DIR: &str = "COUNTER_DATA_DIR";
    pub const PARTITION_KEY: &str = "COUNTER_PARTITION_KEY";
    pub const MAX_RETRIES: &str = "MAX_RETRIES";
    pub const BASE_DELAY_MS: &str = "BASE_DELAY_MS";
    pub const MAX_DELAY_MS: &str = "MAX_DELAY_MS";
}

/// Which counter to drive and how hard to retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterSettings {
    pub partition_key: String,
    pub retry: RetryPolicy,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            partition_key: DEFAULT_PARTITION_KEY.into(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Expose `POST /api/counter/reset`. Development only.
    pub allow_reset: bool,
    pub store: StoreSettings,
    pub counter: CounterSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7071)),
            allow_reset: false,
            store: StoreSettings::default(),
            counter: CounterSettings::default(),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> ServerResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("{name}={value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> ServerResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ServerError::Config(format!("{name}={value:?}: expected a boolean"))),
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        let printable = Self {
            store: self.store.redacted(),
            ..self.clone()
        };
        toml::to_string_pretty(&printable).map_err(|e| ServerError::Internal(e.to_string()))
    }

    /// Read `path` (or start from defaults) and apply process environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(env::BIND_ADDR) {
            self.bind_addr = parse_var(env::BIND_ADDR, &v)?;
        }
        if let Some(v) = lookup(env::ALLOW_RESET) {
            self.allow_reset = parse_bool(env::ALLOW_RESET, &v)?;
        }
        if let Some(v) = lookup(env::STORE_BACKEND) {
            self.store.backend = parse_var::<BackendKind>(env::STORE_BACKEND, &v)?;
        }
        if let Some(v) = lookup(env::STORE_ENDPOINT) {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = lookup(env::STORE_KEY) {
            self.store.key = Some(v);
        }
        if let Some(v) = lookup(env::DATABASE_NAME) {
            self.store.database = v;
        }
        if let Some(v) = lookup(env::CONTAINER_NAME) {
            self.store.container = v;
        }
        if let Some(v) = lookup(env::DATA_DIR) {
            self.store.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(env::PARTITION_KEY) {
            self.counter.partition_key = v;
        }
        if let Some(v) = lookup(env::MAX_RETRIES) {
            self.counter.retry.max_retries = parse_var(env::MAX_RETRIES, &v)?;
        }
        if let Some(v) = lookup(env::BASE_DELAY_MS) {
            self.counter.retry.base_delay_ms = parse_var(env::BASE_DELAY_MS, &v)?;
        }
        if let Some(v) = lookup(env::MAX_DELAY_MS) {
            self.counter.retry.max_delay_ms = parse_var(env::MAX_DELAY_MS, &v)?;
        }
        Ok(())
    }

    /// Build the engine this configuration describes. Missing connection
    /// parameters come back as [`vc_engine::EngineError::Config`].
    pub fn build_engine(&self) -> EngineResult<IncrementEngine> {
        let key = CounterKey::new(self.counter.partition_key.clone())?;
        IncrementEngine::from_settings(&self.store, key, self.counter.retry)
    }
}
