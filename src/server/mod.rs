//! Request dispatch and the HTTP server it runs in.
//!
//! The [`Dispatcher`] takes a parsed request through the compiled route
//! table, the middleware chain and a handler, and hands back a
//! [`PendingReply`]. [`HttpServer`] owns the TCP side: it writes the reply and
//! acknowledges the write so the handler can finish.

mod response;
mod config;
mod context;
mod dispatcher;
mod error;
mod http_server;
mod middleware;
mod writer;
mod tests;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use context::RouteRequest;
pub use dispatcher::{Dispatcher, PendingReply};
pub use error::Error;
pub use http_server::HttpServer;
pub use middleware::Next;
pub use writer::{Cookie, InFlightResponse, ResponseWriter, SameSite};
