//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[allow(dead_code)]
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[allow(dead_code)]
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for the status surface
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            MonitorError::SourceUnavailable(msg) => {
                error!("Source unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SOURCE_UNAVAILABLE",
                    msg.clone(),
                )
            }
            MonitorError::Dispatch(msg) => {
                error!("Dispatch failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "DISPATCH_FAILED", msg.clone())
            }
            MonitorError::MalformedRecord(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MALFORMED_RECORD",
                msg.clone(),
            ),
            MonitorError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            MonitorError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    msg.clone(),
                )
            }
            MonitorError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    msg.clone(),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias used throughout the engine
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Helper function to create a source error
pub fn source_error(msg: impl Into<String>) -> MonitorError {
    MonitorError::SourceUnavailable(msg.into())
}

/// Helper function to create a configuration error
pub fn config_error(msg: impl Into<String>) -> MonitorError {
    MonitorError::Config(msg.into())
}
