//! Error types for Sketchmind
//!
//! All errors implement `IntoResponse` for Axum handlers. The failure
//! payload carries a machine-readable `kind` tag and the name of the
//! pipeline stage that failed, so callers never have to parse messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Provider request failed during {stage}: HTTP {status}: {message}")]
    Provider {
        stage: &'static str,
        status: u16,
        message: String,
    },

    #[error("Provider request timed out during {stage} after {timeout_seconds} seconds")]
    Timeout {
        stage: &'static str,
        timeout_seconds: u64,
    },

    #[error("Provider returned no extractable text during {stage}")]
    EmptyResponse { stage: &'static str },

    #[error("Failed to parse provider output during {stage}: {reason}")]
    Parse { stage: &'static str, reason: String },

    #[error("No diagram source could be located in provider output during {stage}")]
    MissingDiagramSource { stage: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable classification tag for the failure payload
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Provider { .. } => "provider",
            Self::Timeout { .. } => "timeout",
            Self::EmptyResponse { .. } => "empty_response",
            Self::Parse { .. } => "parse",
            Self::MissingDiagramSource { .. } => "missing_diagram_source",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Validation maps to 400; every other class surfaces as 500 with
        // the failing stage named in the message. Callers must treat an
        // empty diagram_source as failure regardless of status.
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
