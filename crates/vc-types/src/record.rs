use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::CounterKey;

/// Opaque revision marker issued by a store on every create or write.
///
/// Equivalent to an HTTP ETag: callers never interpret it, they only hand it
/// back to prove which revision they read.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a token received from a store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a fresh token (UUID v7, so tokens also sort by issue time).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted counter document.
///
/// Field names on the wire follow the document-store convention: `id`,
/// `count`, and the system properties `_etag` and `_ts`. `_ts` is the last
/// write time in whole epoch seconds. Stores that increment natively leave
/// `_etag` unset. Other system properties (`_rid`, `_self`, ...) are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub id: CounterKey,
    #[serde(default)]
    pub count: u64,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(
        rename = "_ts",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CounterRecord {
    /// A fresh record at zero with no store metadata.
    pub fn zero(id: CounterKey) -> Self {
        Self::with_count(id, 0)
    }

    pub fn with_count(id: CounterKey, count: u64) -> Self {
        Self {
            id,
            count,
            version: None,
            updated_at: None,
        }
    }

    /// Assign a new version token and write timestamp. Stores call this on
    /// every successful create or write.
    pub fn stamped(mut self) -> Self {
        self.version = Some(VersionToken::generate());
        self.touched()
    }

    /// Refresh the write timestamp only, for stores without version tokens.
    pub fn touched(mut self) -> Self {
        self.updated_at = Some(Utc::now().trunc_subsecs(0));
        self
    }

    /// True if this record is at revision `token`.
    pub fn is_at(&self, token: &VersionToken) -> bool {
        self.version.as_ref() == Some(token)
    }
}
