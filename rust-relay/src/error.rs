//! Relay error taxonomy.
//!
//! Every kind except [`RelayError::Signature`] is reported to the caller as
//! HTTP 200 with `{"error": "<message>"}`. A bad callback signature is the only
//! condition answered with a non-2xx status.

use axum::http::StatusCode;

/// Errors raised while handling a webhook or provider callback.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed inbound event.
    #[error("{0}")]
    Parse(String),

    /// Remote settings or Hub API call failed.
    #[error("{0}")]
    Fetch(String),

    /// Required field missing from the event.
    #[error("{0}")]
    Validation(String),

    /// Callback signature mismatch.
    #[error("Bad request")]
    Signature,

    /// Call placement rejected by the Call Provider.
    #[error("Call Provider error: {0}")]
    Provider(String),
}

impl RelayError {
    /// HTTP status used when this error terminates a request.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Signature => StatusCode::BAD_REQUEST,
            _ => StatusCode::OK,
        }
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Parse(_) => "parse",
            RelayError::Fetch(_) => "fetch",
            RelayError::Validation(_) => "validation",
            RelayError::Signature => "signature",
            RelayError::Provider(_) => "provider",
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
