use thiserror::Error;
use vc_store::StoreError;

/// Errors surfaced by the increment engine.
///
/// Version conflicts are absorbed by the optimistic loop and never appear
/// here on their own; they only show up as [`EngineError::RetriesExhausted`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration is missing or invalid. Retrying cannot help.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every attempt lost a version conflict.
    #[error("failed after {attempts} retries")]
    RetriesExhausted { attempts: u32 },

    /// Any other store failure. Not retried by the engine.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Config(msg) => Self::Config(msg),
            other => Self::Store(other),
        }
    }
}

impl From<vc_types::TypeError> for EngineError {
    fn from(e: vc_types::TypeError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
