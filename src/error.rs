use axum::{
    Json,
    extract::multipart::MultipartError,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::normalizer::NormalizeError;

/// Everything that can end a proxy request early.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// No `image` field, or the field carried no file.
    #[error("No image uploaded")]
    NoImage,

    /// The multipart body itself could not be read (broken framing, too large).
    #[error("Invalid upload")]
    Malformed(#[from] MultipartError),

    #[error("Too many uploads, please wait before trying again.")]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Normalize(#[from] NormalizeError),

    /// Transport, timeout or non-JSON reply from `/predict`.
    #[error("Failed to proxy image")]
    Predict(#[source] reqwest::Error),

    /// Transport, timeout or non-JSON reply from `/species`.
    #[error("Failed to proxy species")]
    Species(#[source] reqwest::Error),
}

/// JSON error body: `{ "error": ..., "details": ... }`
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoImage => StatusCode::BAD_REQUEST,
            ProxyError::Malformed(e) => e.status(),
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Normalize(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ProxyError::Normalize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Predict(_) | ProxyError::Species(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            ProxyError::NoImage | ProxyError::RateLimited { .. } => (self.to_string(), None),
            ProxyError::Malformed(e) => (self.to_string(), Some(e.body_text())),
            ProxyError::Normalize(e) if e.is_client_error() => {
                ("Invalid image".to_string(), Some(e.to_string()))
            }
            ProxyError::Normalize(e) => ("Failed to process image".to_string(), Some(e.to_string())),
            ProxyError::Predict(e) | ProxyError::Species(e) => {
                (self.to_string(), Some(error_chain(e)))
            }
        };
        ErrorBody { error, details }
    }
}

// reqwest's top-level message rarely names the cause, so append the sources
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, details = ?self.body().details, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let ProxyError::RateLimited { retry_after } = &self {
            // round up so clients never retry a moment too early
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
