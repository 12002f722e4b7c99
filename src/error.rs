//! Error types for the payload server and the repository cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Payload Error Enum ==
/// Errors surfaced by the payload HTTP endpoint.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// No definition set is registered for the client key
    #[error("Unknown client key: {0}")]
    UnknownClientKey(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for PayloadError {
    fn into_response(self) -> Response {
        let status = match &self {
            PayloadError::UnknownClientKey(_) => StatusCode::NOT_FOUND,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Fetch Error Enum ==
/// A feature fetch that could not produce a payload.
///
/// Every variant is treated the same way by the repository: the fetch
/// resolves to "no data" and the previous entry, if any, stays in place.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Body was not a valid feature payload
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

// == Storage Error Enum ==
/// Failures of the durable key-value slot backing the repository cache.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// == Repository Error Enum ==
/// Errors raised by the repository cache itself.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Host or client key cannot form a unique repository key
    #[error("Invalid repository key: {0}")]
    InvalidKey(String),

    /// A single persisted cache record could not be decoded
    #[error("Malformed persisted entry: {0}")]
    MalformedPersistedEntry(String),
}

// == Catalog Error Enum ==
/// Failures loading the definition catalog at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the payload endpoint.
pub type Result<T> = std::result::Result<T, PayloadError>;
