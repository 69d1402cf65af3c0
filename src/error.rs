use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::scoring::{Notice, ScoringError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Gateway(GatewayError),
    Scoring(ScoringError),
}

impl AppError {
    /// Notices to show for this failure.
    pub fn notices(&self) -> Vec<Notice> {
        match self {
            AppError::Scoring(err) => err.notices(),
            AppError::Gateway(err) => vec![Notice::error(err.user_message())],
            other => vec![Notice::error(other.to_string())],
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Scoring(ScoringError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Scoring(ScoringError::NothingToCommit { .. }) => StatusCode::CONFLICT,
            AppError::Scoring(ScoringError::ConfirmationRequired)
            | AppError::Scoring(ScoringError::Busy) => StatusCode::CONFLICT,
            AppError::Scoring(ScoringError::Gateway(_)) | AppError::Gateway(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(ConfigError::MissingOfficer) => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Gateway(err) => write!(f, "backend error: {}", err),
            AppError::Scoring(err) => write!(f, "scoring error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Gateway(err) => Some(err),
            AppError::Scoring(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "notices": self.notices(),
        }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<ScoringError> for AppError {
    fn from(value: ScoringError) -> Self {
        Self::Scoring(value)
    }
}
