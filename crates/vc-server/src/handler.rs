use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{debug, error};
use vc_engine::{EngineError, EngineResult, IncrementEngine};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::response::HandlerResponse;

/// Inbound trigger method. Both increment, so clients written against
/// either verb keep working.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerMethod {
    Get,
    Post,
}

impl fmt::Display for TriggerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

impl FromStr for TriggerMethod {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(ServerError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Translates triggers into engine calls and engine results into responses.
///
/// Cheap to clone; every clone shares the same engine. When the engine could
/// not be built from configuration the handler still answers, with a
/// configuration error on every request.
#[derive(Clone, Debug)]
pub struct CounterHandler {
    engine: Result<Arc<IncrementEngine>, Arc<str>>,
    allow_reset: bool,
}

impl CounterHandler {
    pub fn new(engine: IncrementEngine) -> Self {
        Self {
            engine: Ok(Arc::new(engine)),
            allow_reset: false,
        }
    }

    pub fn misconfigured(reason: impl Into<String>) -> Self {
        Self {
            engine: Err(Arc::from(reason.into())),
            allow_reset: false,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let handler = match config.build_engine() {
            Ok(engine) => Self::new(engine),
            Err(e) => {
                error!(error = %e, "counter engine unavailable; serving configuration errors");
                Self::misconfigured(e.to_string())
            }
        };
        handler.with_reset(config.allow_reset)
    }

    pub fn with_reset(mut self, allow: bool) -> Self {
        self.allow_reset = allow;
        self
    }

    pub fn allow_reset(&self) -> bool {
        self.allow_reset
    }

    fn engine(&self) -> EngineResult<&IncrementEngine> {
        self.engine
            .as_deref()
            .map_err(|reason| EngineError::Config(reason.to_string()))
    }

    fn respond(operation: &str, result: EngineResult<u64>) -> HandlerResponse {
        match result {
            Ok(count) => HandlerResponse::count(count),
            Err(e) => {
                if e.is_config() {
                    error!(operation, error = %e, "config error");
                } else {
                    error!(operation, error = %e, "counter operation failed");
                }
                HandlerResponse::from_error(&e)
            }
        }
    }

    /// Handle one trigger: increment and return the new count.
    pub async fn handle(&self, method: TriggerMethod) -> HandlerResponse {
        debug!(%method, "view counter triggered");
        let result = match self.engine() {
            Ok(engine) => engine.increment().await,
            Err(e) => Err(e),
        };
        Self::respond("increment", result)
    }

    /// Current count, no increment.
    pub async fn current(&self) -> HandlerResponse {
        let result = match self.engine() {
            Ok(engine) => engine.current().await,
            Err(e) => Err(e),
        };
        Self::respond("read", result)
    }

    /// Reset to zero. Callers must check [`Self::allow_reset`] first.
    pub async fn reset(&self) -> HandlerResponse {
        let result = match self.engine() {
            Ok(engine) => engine.reset().await.map(|()| 0),
            Err(e) => Err(e),
        };
        Self::respond("reset", result)
    }
}

/// `GET /view-counter`
pub async fn increment_get(State(handler): State<CounterHandler>) -> HandlerResponse {
    handler.handle(TriggerMethod::Get).await
}

/// `POST /view-counter`
pub async fn increment_post(State(handler): State<CounterHandler>) -> HandlerResponse {
    handler.handle(TriggerMethod::Post).await
}

/// `GET /api/counter`
pub async fn current_handler(State(handler): State<CounterHandler>) -> HandlerResponse {
    handler.current().await
}

/// `POST /api/counter/reset`, hidden unless enabled.
pub async fn reset_handler(State(handler): State<CounterHandler>) -> Response {
    if !handler.allow_reset() {
        return StatusCode::NOT_FOUND.into_response();
    }
    handler.reset().await.into_response()
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "viewcount",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
