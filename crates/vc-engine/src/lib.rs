//! Increment protocol for viewcount.
//!
//! Two strategies, chosen by the kind of store the engine was built over:
//!
//! - **Atomic**: one native increment-and-return call. Failures go straight
//!   back to the caller.
//! - **Optimistic**: `get_or_create`, add one, `conditional_replace` with the
//!   version token that was read. A version conflict means another writer
//!   committed in between, so the loop starts over after an exponential
//!   backoff. After [`RetryPolicy::max_retries`] attempts the engine gives up
//!   with [`EngineError::RetriesExhausted`].

pub mod engine;
pub mod error;
pub mod policy;

pub use engine::IncrementEngine;
pub use error::{EngineError, EngineResult};
pub use policy::RetryPolicy;
