//! Classified errors for Google API calls
//!
//! Every gateway method maps raw HTTP failures into [`ApiError`] so callers can
//! branch on kind (drift removal on `NotFound`, retries on rate limits and 5xx)
//! without inspecting status codes themselves.

use serde::Deserialize;
use thiserror::Error;

/// Status codes the retry engine treats as transient
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum ApiError {
    /// The upstream resource does not exist (HTTP 404)
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// HTTP 429 Too Many Requests
    #[error("rate limited: {message}")]
    RateLimit { message: String },

    /// Any other non-success HTTP status
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport failure with no HTTP status (DNS, connect, TLS, body read)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body did not match the expected shape
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Token acquisition failed before the request was sent
    #[error("authentication failed: {0}")]
    Auth(#[source] anyhow::Error),

    /// The cooperative cancellation signal fired; carries the last API error seen
    #[error("operation cancelled{}", .last.as_ref().map(|e| format!(" (last error: {})", e)).unwrap_or_default())]
    Cancelled {
        #[source]
        last: Option<Box<ApiError>>,
    },
}

impl ApiError {
    /// Build the classified error for a non-success status
    pub fn from_status(status: u16, resource: &str, id: &str, body: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            404 => ApiError::NotFound {
                resource: resource.to_string(),
                id: id.to_string(),
            },
            429 => ApiError::RateLimit { message },
            _ => ApiError::Api {
                status,
                message,
                cause: None,
            },
        }
    }

    /// HTTP status for kinds that carry one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimit { .. } => Some(429),
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Retryable iff the status is 429, 500, 502, 503 or 504.
    /// Errors without an HTTP status are never retried.
    pub fn is_retryable(&self) -> bool {
        self.status()
            .map(|status| RETRYABLE_STATUSES.contains(&status))
            .unwrap_or(false)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled { .. })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pull the human message out of Google's `{"error": {...}}` envelope,
/// falling back to the raw body.
pub fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) if !envelope.error.message.is_empty() => {
                format!("{} ({})", envelope.error.message, status)
            }
            _ if !envelope.error.message.is_empty() => envelope.error.message,
            _ => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}
