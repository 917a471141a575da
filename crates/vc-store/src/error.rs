use vc_types::CounterKey;

/// Errors from counter store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Required connection parameters are missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The stored version token no longer matches the expected one.
    #[error("version conflict on counter {key}")]
    Conflict { key: CounterKey },

    /// A create lost to an existing record with the same key.
    #[error("counter already exists: {key}")]
    AlreadyExists { key: CounterKey },

    /// The record does not exist.
    #[error("counter not found: {key}")]
    NotFound { key: CounterKey },

    /// The store rejected the configured credential.
    #[error("store rejected credential: {0}")]
    Unauthorized(String),

    /// Any other store-level failure (network, unexpected status, poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
