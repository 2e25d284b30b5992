//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::Error as ParserError;
use crate::server::response::StatusCode;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing the request head or a multipart body.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error on the connection or the filesystem.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The request head did not fit in the configured header limit.
    #[error("Request head exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// The body is larger than the caller allowed.
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// The chunked transfer coding of the body is malformed.
    #[error("Malformed chunked body: {0}")]
    MalformedChunk(&'static str),

    /// The connection closed before the declared body was complete.
    #[error("Connection closed after {received} body bytes")]
    UnexpectedEof { received: u64 },

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// Certificate or key could not be loaded.
    #[error("TLS setup failed: {0}")]
    TlsError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// The response status a request that failed with this error gets.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ParseError(_) | Error::MalformedChunk(_) => StatusCode::BadRequest,
            Error::HeaderTooLarge { .. } => StatusCode::RequestHeaderFieldsTooLarge,
            Error::PayloadTooLarge { .. } => StatusCode::PayloadTooLarge,
            Error::IoError(_)
            | Error::UnexpectedEof { .. }
            | Error::InternalError(_)
            | Error::TlsError(_)
            | Error::JsonError(_) => StatusCode::InternalServerError,
        }
    }
}
