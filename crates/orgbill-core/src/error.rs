//! Error types module
//!
//! All errors raised by the client and the query-cache layer are unified
//! under [`AppError`]. Server-reported error payloads are carried verbatim
//! in the `Request` variant so callers see exactly what the API returned.

use serde_json::Value as JsonValue;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A required identifier was absent or empty. Raised before any
    /// network request is issued.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// The server answered with a non-success status. `body` is the
    /// server's error payload, parsed as JSON when possible and otherwise
    /// wrapped as a JSON string, never rewritten.
    #[error("Request failed with status {status}")]
    Request { status: u16, body: JsonValue },

    /// The request could not be sent or the connection failed mid-flight.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The response body did not match the expected JSON shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The caller's cancellation signal fired while the request was in
    /// flight.
    #[error("Request cancelled")]
    Cancelled,

    /// A fetched record violated a domain invariant. Only raised by
    /// explicit validation, never during deserialization.
    #[error("Invalid subscription record: {0}")]
    Validation(String),
}

impl AppError {
    pub fn transport(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Transport {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Whether a retry could plausibly succeed. Used by the query cache
    /// when a retry count is configured; input and decode errors are
    /// final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transport { .. } => true,
            AppError::Request { status, .. } => *status == 429 || *status >= 500,
            AppError::MissingParameter(_)
            | AppError::Decode(_)
            | AppError::Cancelled
            | AppError::Validation(_) => false,
        }
    }

    /// The server payload for `Request` errors, if any.
    pub fn server_body(&self) -> Option<&JsonValue> {
        match self {
            AppError::Request { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}
