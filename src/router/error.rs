//! Error types for building the dispatch table.

use thiserror::Error;

/// Configuration errors found while compiling the route tree.
///
/// These are fatal: a server must not start serving with a table that failed to build.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Two declarations attach a handler to the same URL or to equivalent patterns.
    #[error("duplicate handler for route {url}")]
    DuplicateHandler { url: String },
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
