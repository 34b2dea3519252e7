//! Error types.
//!
//! Fetch-path failures surface as [`ApiError`] to whoever asked for the data.
//! Event-path failures surface as [`EventError`] and never leave the
//! coordinator.

use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status or a nonzero `code` in the response envelope.
    #[error("bad response (status {status}, code {code}): {message}")]
    BadResponse {
        status: u16,
        code: i64,
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not a readable envelope.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Reading a local file for upload failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote returned data that could not be turned into an entity.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ApiError {
    /// Whether the remote refused access to the resource (403).
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            ApiError::BadResponse { status: 403, .. } | ApiError::BadResponse { code: 403, .. }
        )
    }
}

/// Failure to build or merge an entity from a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is missing field `{0}`")]
    MissingField(&'static str),

    #[error("payload id `{found}` does not match entity `{expected}`")]
    IdMismatch { expected: String, found: String },
}

/// Failure while applying one decoded event to the cache.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("could not resolve {kind} `{id}`")]
    Unresolved { kind: &'static str, id: String },
}
