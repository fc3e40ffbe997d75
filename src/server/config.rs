//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Transport settings for [`HttpServer`](crate::server::HttpServer).
///
/// Routing options (fallbacks, middleware, handshake timeout) are set on the
/// [`Router`](crate::router::Router) instead.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Connections beyond this many get a 503 and are closed.
    pub max_connections: usize,
    /// Read buffer per connection, which is also the largest accepted request.
    pub read_buffer_size: usize,
    /// How long shutdown waits for in-flight connections before aborting them.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
