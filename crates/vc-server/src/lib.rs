//! HTTP surface for viewcount.
//!
//! Every trigger (GET or POST, on any of the counter routes) increments the
//! counter and answers `{"count": N}`. Failures are caught at the handler
//! boundary and answered as `{"error": "..."}` with status 500.

pub mod config;
pub mod error;
pub mod handler;
pub mod response;
pub mod router;
pub mod server;

pub use config::{CounterSettings, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{CounterHandler, TriggerMethod};
pub use response::{Envelope, FunctionPayload, HandlerResponse, ResponseStatus};
pub use server::CounterServer;
