//! Request parsing.
//!
//! Turns the bytes read from a connection into an [`HttpRequest`]. Only what
//! routing needs is parsed: the request line, headers, query parameters,
//! cookies and the body after the header block.

mod error;
mod request;
mod request_line;

pub use error::Error;
pub use request::{decode_path, parse_request, HttpRequest};
pub(crate) use request::find_head_end;
pub use request_line::{HttpVersion, Method, RequestLine};
