//! Counter store adapters for viewcount.
//!
//! This crate hides each backing store behind one of two capability traits,
//! matching the two increment strategies the engine knows:
//!
//! - [`CounterStore`] -- optimistic concurrency: read, create, and an
//!   ETag-guarded conditional replace. `get_or_create` is provided on top and
//!   resolves concurrent-creation races by re-reading the winner's record.
//! - [`AtomicCounterStore`] -- native increment-and-return.
//!
//! [`CounterBackend`] tags a connected store with its strategy. It is built
//! from [`StoreSettings`], which reject missing connection parameters before
//! any store call is made.
//!
//! # Storage Backends
//!
//! - [`InMemoryCounterStore`] -- `HashMap`-based document store
//! - [`InMemoryAtomicStore`] -- `HashMap`-based atomic integer store
//! - [`FileCounterStore`] -- JSON documents on local disk
//! - [`FileAtomicStore`] -- durable atomic counters on local disk
//! - [`HttpCounterStore`] -- remote document database over HTTP

pub mod backend;
pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod memory;
pub mod traits;

pub use backend::CounterBackend;
pub use config::{BackendKind, StoreSettings};
pub use error::{StoreError, StoreResult};
pub use file::{FileAtomicStore, FileCounterStore};
pub use http::HttpCounterStore;
pub use memory::{InMemoryAtomicStore, InMemoryCounterStore};
pub use traits::{AtomicCounterStore, CounterStore};
