//! The TCP side: accept connections, read one request each, write the reply
//! and acknowledge it to the dispatcher.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::parser::{find_head_end, parse_request};
use crate::router::Router;
use crate::server::config::ServerConfig;
use crate::server::dispatcher::Dispatcher;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// An HTTP server for one compiled route table.
pub struct HttpServer {
    pub config: ServerConfig,
    /// Shared by every connection; read-only.
    pub dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Build the router and create a server for it.
    ///
    /// Fails when the route table has conflicting handlers; the server is never
    /// created in that case.
    pub fn new(config: ServerConfig, router: Router) -> Result<Self, Error> {
        let dispatcher = router.build()?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    pub fn with_dispatcher(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        self.serve(listener, ctrl_c()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves, then wait
    /// up to [`ServerConfig::shutdown_timeout`] for open connections.
    pub async fn serve(&self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        self.log_routes();
        info!("Server listening on http://{addr}", addr = listener.local_addr()?);

        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => self.spawn_connection(socket, peer, &permits, &mut connections).await,
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        error!("Listener failed, shutting down: {e}");
                        break;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        drain(&mut connections, self.config.shutdown_timeout).await;
        Ok(())
    }

    fn log_routes(&self) {
        let table = self.dispatcher.table();
        info!("Registered routes ({count}):", count = table.len());
        for route in table.routes() {
            let methods: Vec<&str> = route.methods.iter().map(|m| m.as_str()).collect();
            let handler = if route.handler.is_some() { "" } else { " (no handler)" };
            info!("  [{key}] {methods} {url}{handler}", key = route.key, methods = methods.join(", "), url = route.url);
        }
    }

    /// Run the connection in its own task, or turn it away with 503 when the
    /// server is at capacity.
    async fn spawn_connection(
        &self,
        mut socket: TcpStream,
        peer: SocketAddr,
        permits: &Arc<Semaphore>,
        connections: &mut JoinSet<()>,
    ) {
        let Ok(permit) = permits.clone().try_acquire_owned() else {
            warn!("Connection limit reached, rejecting connection from {peer}");
            let _ = socket.write_all(&over_capacity().to_bytes()).await;
            return;
        };

        let dispatcher = self.dispatcher.clone();
        let read_buffer_size = self.config.read_buffer_size;
        connections.spawn(async move {
            let _permit = permit;
            if let Err(e) = Self::handle_connection(&mut socket, dispatcher, read_buffer_size, Some(peer)).await {
                error!("Error handling connection from {peer}: {e}");
            }
        });
    }

    /// Serve a single request on a connection.
    ///
    /// A request that does not fit in the read buffer gets a 413, one that does
    /// not parse gets a 400; either way the error is returned and nothing is
    /// dispatched.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        dispatcher: Arc<Dispatcher>,
        read_buffer_size: usize,
        remote_addr: Option<SocketAddr>,
    ) -> Result<(), Error> {
        let raw = match read_request(socket, read_buffer_size).await {
            Ok(raw) => raw,
            Err(e @ Error::PayloadTooLarge { .. }) => {
                let response = HttpResponse::new(StatusCode::PayloadTooLarge)
                    .with_content_type("text/plain")
                    .with_body_string(e.to_string());
                socket.write_all(&response.to_bytes()).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if raw.is_empty() {
            return Ok(()); // Connection closed
        }

        let request = match parse_request(&raw) {
            Ok(request) => request,
            Err(e) => {
                let response = HttpResponse::new(StatusCode::BadRequest)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Error parsing request: {e}"));
                socket.write_all(&response.to_bytes()).await?;
                return Err(Error::ParseError(e));
            }
        };

        let reply = dispatcher.dispatch(request, remote_addr).await;
        debug!("Replying {status}", status = reply.response.status.code());

        socket.write_all(&reply.response.to_bytes()).await?;
        socket.flush().await?;

        // Only now may the handler's write return
        reply.acknowledge();
        Ok(())
    }
}

fn over_capacity() -> HttpResponse {
    HttpResponse::new(StatusCode::ServiceUnavailable)
        .with_content_type("text/plain")
        .with_body_string("Server is at capacity, please try again later")
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => {
            // Without a signal handler the server runs until the process is killed.
            error!("Error setting up Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for open connections, aborting whatever is left after `timeout`.
async fn drain(connections: &mut JoinSet<()>, timeout: Duration) {
    info!("Waiting for {len} active connections to complete...", len = connections.len());
    let drained = tokio::time::timeout(timeout, async {
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed during shutdown: {e}");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!("Shutdown timeout elapsed, aborting {len} remaining connections", len = connections.len());
        connections.abort_all();
    }
    info!("Server shutdown complete");
}

/// Read until the header block and the declared body are in, or the peer
/// stops sending.
///
/// A request that cannot fit in `read_buffer_size` bytes fails with
/// [`Error::PayloadTooLarge`] as soon as that is known. A peer that stops
/// early leaves a short body, which the parser rejects.
async fn read_request(socket: &mut (impl AsyncRead + Unpin), read_buffer_size: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0; read_buffer_size];
    let mut filled = 0;

    loop {
        match expected_length(&buf[..filled]) {
            Some(expected) if expected > read_buffer_size => {
                return Err(Error::PayloadTooLarge { limit: read_buffer_size });
            }
            Some(expected) if filled >= expected => break,
            None if filled == buf.len() => {
                return Err(Error::PayloadTooLarge { limit: read_buffer_size });
            }
            _ => {}
        }

        let n = socket.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf)
}

/// Size of the whole request once its header block is in: the head, its blank
/// line and the declared `Content-Length`.
fn expected_length(buf: &[u8]) -> Option<usize> {
    let (head_end, terminator) = find_head_end(buf)?;

    let head = String::from_utf8_lossy(&buf[..head_end]);
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    Some((head_end + terminator).saturating_add(content_length))
}
