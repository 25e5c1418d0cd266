//! Error handling and custom error types
//!
//! Every failure the relay can report to a caller is a variant here. All of
//! them converge to the same `{ "error", "details"? }` response body.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required fields: {0}")]
    InvalidRequest(String),

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Request body rejected: {message}")]
    BodyRejected { status: StatusCode, message: String },

    #[error("Server misconfigured: {0}")]
    ServerMisconfigured(String),

    #[error("Upstream unavailable after {attempts} attempts: {last_error}")]
    UpstreamUnavailable { attempts: u32, last_error: String },

    #[error("API Error: {status} - {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("{message}")]
    GenerationBlockedOrFailed {
        message: String,
        details: serde_json::Value,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::BodyRejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Raw upstream payload attached to the response, when there is one.
    ///
    /// Rejection bodies are passed through as JSON when they parse, and as a
    /// plain string otherwise.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::GenerationBlockedOrFailed { details, .. } => Some(details.clone()),
            Error::UpstreamRejected { body, .. } => Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone())),
            ),
            _ => None,
        }
    }
}

/// Keeps the status axum chose (413 for an over-limit body) while routing the
/// failure through the JSON error shape.
impl From<BytesRejection> for Error {
    fn from(rejection: BytesRejection) -> Self {
        Error::BodyRejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
