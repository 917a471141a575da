//! Foundation types for viewcount.
//!
//! This crate provides the data model shared by every other viewcount crate:
//! the key naming the global counter, the persisted counter record, and the
//! opaque version token used for optimistic concurrency.
//!
//! # Key Types
//!
//! - [`CounterKey`] -- Partition key identifying a counter record
//! - [`CounterRecord`] -- The persisted `{id, count, _etag, _ts}` document
//! - [`VersionToken`] -- Opaque ETag-equivalent issued on every write

pub mod error;
pub mod key;
pub mod record;

pub use error::TypeError;
pub use key::{CounterKey, DEFAULT_PARTITION_KEY};
pub use record::{CounterRecord, VersionToken};
