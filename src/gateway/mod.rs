//! Remote data gateway for the role-segmented PHP backend.
//!
//! Every backend call is a POST carrying an `operation` name and a `json`
//! payload. Responses are either a bare JSON array or an object with a
//! `success` flag; [`normalize_body`] folds both into a [`GatewayResponse`] so
//! callers treat every operation the same way.

mod client;
mod http;
mod memory;

pub use client::{AddScoreRequest, BackendClient, GatewayError};
pub use http::HttpGateway;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::scoring::domain::is_truthy;

/// Backend route file an operation is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendRoute {
    Sbo,
    Admin,
    Faculty,
    Student,
}

impl BackendRoute {
    pub const fn script(self) -> &'static str {
        match self {
            Self::Sbo => "sbo.php",
            Self::Admin => "admin.php",
            Self::Faculty => "faculty.php",
            Self::Student => "student.php",
        }
    }
}

impl fmt::Display for BackendRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script())
    }
}

/// Uniform result of a backend call.
///
/// Transport failures and backend-reported failures are both represented with
/// `success == false` and a `message`; nothing is raised to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayResponse {
    pub success: bool,
    pub message: Option<String>,
    pub items: Option<Vec<Value>>,
    pub fields: Map<String, Value>,
}

impl GatewayResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn items(items: Vec<Value>) -> Self {
        Self {
            success: true,
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn acknowledged(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Message for display, falling back to a generic description.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Fold a decoded response body into the uniform response shape.
pub fn normalize_body(body: Value) -> GatewayResponse {
    match body {
        Value::Array(items) => GatewayResponse::items(items),
        Value::Object(mut fields) => {
            let success = match fields.remove("success") {
                Some(flag) => is_truthy(&flag),
                None => !fields.contains_key("error"),
            };
            let message = fields
                .remove("message")
                .or_else(|| fields.remove("error"))
                .and_then(|value| match value {
                    Value::String(text) => Some(text),
                    Value::Null => None,
                    other => Some(other.to_string()),
                });
            let items = match fields.remove("data") {
                Some(Value::Array(items)) => Some(items),
                Some(other) => {
                    fields.insert("data".to_string(), other);
                    None
                }
                None => None,
            };

            GatewayResponse {
                success,
                message,
                items,
                fields,
            }
        }
        other => GatewayResponse::failure(format!("unexpected response shape: {other}")),
    }
}

/// Transport seam so the coordinator can run against HTTP or in-process backends.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn invoke(&self, route: BackendRoute, operation: &str, payload: Value)
        -> GatewayResponse;
}
