//! Error types for request-head and multipart parsing.

use thiserror::Error;

/// Errors that can occur while parsing a request head or a multipart body.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method in the request is not supported.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request target is missing or does not start with `/`.
    #[error("Invalid HTTP path")]
    InvalidPath,

    /// The request line is malformed (wrong format or missing components).
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version in the request is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header line has no `:` separator or an empty name.
    #[error("Invalid header format: {0}")]
    InvalidHeaderFormat(String),

    /// `Content-Length` is not a non-negative integer, or repeated with different values.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,

    /// `Content-Type` is multipart but carries no usable boundary.
    #[error("Missing or invalid multipart boundary")]
    MissingBoundary,

    /// The multipart body does not follow the `multipart/form-data` layout.
    #[error("Malformed multipart body: {0}")]
    InvalidMultipart(&'static str),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
