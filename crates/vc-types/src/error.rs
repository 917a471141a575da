use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("counter key must not be empty")]
    EmptyKey,

    #[error("counter key contains invalid character {0:?}")]
    InvalidKeyChar(char),

    #[error("serialization error: {0}")]
    Serialization(String),
}
