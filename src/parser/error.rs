//! Parser errors.

use thiserror::Error;

/// Why a request could not be parsed. Each of these becomes a 400 reply.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Empty request")]
    EmptyRequest,

    /// The header block is not valid UTF-8. The body may be anything.
    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,

    /// The request line is not `METHOD TARGET VERSION`.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The target is neither an absolute path nor `*`.
    #[error("Invalid request target: {0}")]
    InvalidPath(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A header line without a `:`.
    #[error("Invalid header line: {0}")]
    InvalidHeaderFormat(String),

    /// `Content-Length` is not a non-negative integer.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The connection ended before the declared body arrived.
    #[error("Body ended after {received} of {declared} declared bytes")]
    IncompleteBody { declared: usize, received: usize },

    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// The body was read as JSON but the request declared another content type.
    #[error("Expected a JSON body, got content type {0:?}")]
    UnsupportedContentType(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
