//! Error types for the HTTP server and the dispatch handshake.

use thiserror::Error;

use crate::parser::Error as ParserError;
use crate::router::RouterError;

/// Errors that can occur while serving requests.
///
/// Unmatched routes and disallowed methods are not errors; they are answered by
/// the fallback handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The request does not fit in the connection's read buffer. Answered with 413.
    #[error("Request larger than the {limit}-byte read buffer")]
    PayloadTooLarge { limit: usize },

    /// The route table could not be built. The server must not start.
    #[error("Route configuration error: {0}")]
    RouteError(#[from] RouterError),

    /// The dispatcher stopped waiting for this response before it was written,
    /// or the transport went away before acknowledging the write.
    #[error("Response was dropped before the write was acknowledged")]
    ResponseDropped,

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
