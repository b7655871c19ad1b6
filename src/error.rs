//! Error types for the proxy.

use crate::translate::anthropic_types::ErrorResponse;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request body: {message}")]
    InvalidRequest { message: String },

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("Backend unreachable: {0}")]
    BackendUnreachable(#[source] reqwest::Error),

    #[error("Failed to decode backend response: {message}")]
    BackendDecode { message: String },

    /// The backend answered, but with a non-success status.
    #[error("Backend returned status {status}: {}", .body.error.message)]
    Upstream { status: u16, body: ErrorResponse },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn backend_decode(msg: impl Into<String>) -> Self {
        Self::BackendDecode {
            message: msg.into(),
        }
    }

    /// HTTP status reported to the caller for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        match self {
            Self::InvalidRequest { .. } | Self::MethodNotAllowed { .. } => {
                ErrorResponse::invalid_request(self.to_string())
            }
            Self::Upstream { body, .. } => body.clone(),
            _ => ErrorResponse::api_error(self.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
