use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Partition key of the single global counter.
pub const DEFAULT_PARTITION_KEY: &str = "global";

/// Characters that document stores reject in item ids. The key is also used
/// as a URL path segment and a file name, so these are refused up front.
const FORBIDDEN_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Identifies one counter record. Doubles as the record `id` and its
/// partition key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterKey(String);

impl CounterKey {
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TypeError::EmptyKey);
        }
        if let Some(c) = key.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(TypeError::InvalidKeyChar(c));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CounterKey {
    fn default() -> Self {
        Self(DEFAULT_PARTITION_KEY.to_string())
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CounterKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CounterKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CounterKey> for String {
    fn from(key: CounterKey) -> Self {
        key.0
    }
}
