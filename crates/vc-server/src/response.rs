//! Response shapes shared by every trigger.
//!
//! The body is always a bare JSON object: `{"count": N}` on success or
//! `{"error": "..."}` on failure. [`FunctionPayload`] wraps the same body in
//! the `{statusCode, headers, body}` shape serverless HTTP proxies expect.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use vc_engine::EngineError;

pub const CONFIG_ERROR_MESSAGE: &str = "Server configuration error";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";

/// CORS headers attached to function payloads. The router applies the same
/// policy through `tower-http`.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Count { count: u64 },
    Error { error: String },
}

/// Outcome class of a handled request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    ServerConfigError,
    InternalError,
}

impl ResponseStatus {
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::OK,
            Self::ServerConfigError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ServerConfigError => "ServerConfigError",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: ResponseStatus,
    pub body: Envelope,
}

impl HandlerResponse {
    pub fn count(count: u64) -> Self {
        Self {
            status: ResponseStatus::Ok,
            body: Envelope::Count { count },
        }
    }

    pub fn config_error() -> Self {
        Self {
            status: ResponseStatus::ServerConfigError,
            body: Envelope::Error {
                error: CONFIG_ERROR_MESSAGE.into(),
            },
        }
    }

    pub fn internal_error() -> Self {
        Self {
            status: ResponseStatus::InternalError,
            body: Envelope::Error {
                error: UNEXPECTED_ERROR_MESSAGE.into(),
            },
        }
    }

    /// Map an engine failure to its public response. Details stay in the
    /// logs; the body only names the class of failure.
    pub fn from_error(err: &EngineError) -> Self {
        if err.is_config() {
            Self::config_error()
        } else {
            Self::internal_error()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn to_function_payload(&self) -> FunctionPayload {
        let mut headers: BTreeMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        headers.insert("Content-Type".into(), "application/json".into());

        FunctionPayload {
            status_code: self.status.http_status().as_u16(),
            headers,
            // Serializing an enum of a u64 or a String cannot fail.
            body: serde_json::to_string(&self.body).unwrap_or_default(),
        }
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        (self.status.http_status(), Json(self.body)).into_response()
    }
}

/// Serverless proxy response: status, headers, and the JSON body as a string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionPayload {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}
