//! Per-request dispatch: match, middleware, handler, handshake.
//!
//! ```text
//! MATCH ──> MIDDLEWARE ──> DISPATCH ──> COMPLETE
//!               │                          ^
//!               └──── short-circuit ───────┘
//! ```
//!
//! Every middleware and the final handler run in their own task. The
//! dispatcher waits on one-shot signals in a fixed order: one flow signal per
//! middleware, then the "response ready" signal. After the transport has
//! written the reply, [`PendingReply::acknowledge`] releases the writer.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::oneshot;

use crate::parser::HttpRequest;
use crate::router::{handler_fn, DispatchTable, HandlerFn, HandlerFuture, MiddlewareFn};
use crate::server::context::RouteRequest;
use crate::server::middleware::{Flow, Next};
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::writer::{InFlightResponse, Ready, ResponseWriter};

/// A reply ready to be written to the connection.
///
/// Call [`acknowledge`](Self::acknowledge) after writing it so the handler
/// blocked in [`ResponseWriter::write`] can return. Dropping the reply
/// instead makes that write fail with [`Error::ResponseDropped`](crate::server::Error::ResponseDropped).
#[derive(Debug)]
pub struct PendingReply {
    pub response: HttpResponse,
    written: Option<oneshot::Sender<()>>,
}

impl PendingReply {
    fn immediate(response: HttpResponse) -> Self {
        Self { response, written: None }
    }

    /// Tell the writer the response reached the transport.
    pub fn acknowledge(self) {
        if let Some(written) = self.written {
            // The handler may have finished or been aborted already.
            let _ = written.send(());
        }
    }
}

/// What the middleware stage decided.
enum Stage {
    /// All middlewares proceeded; the handler gets this writer.
    Dispatch(ResponseWriter),
    /// A middleware answered the request itself.
    ShortCircuit,
}

/// Routes requests through the middleware chain to a handler.
///
/// Built once by [`Router::build`](crate::router::Router::build) and shared
/// read-only between connections.
pub struct Dispatcher {
    table: Arc<DispatchTable>,
    middlewares: Vec<MiddlewareFn>,
    not_found: HandlerFn,
    method_not_allowed: HandlerFn,
    handshake_timeout: Option<Duration>,
}

impl Dispatcher {
    /// A dispatcher without middleware and with the default fallbacks.
    pub fn new(table: DispatchTable) -> Self {
        Self::from_parts(table, Vec::new(), None, None, None)
    }

    pub(crate) fn from_parts(
        table: DispatchTable,
        middlewares: Vec<MiddlewareFn>,
        not_found: Option<HandlerFn>,
        method_not_allowed: Option<HandlerFn>,
        handshake_timeout: Option<Duration>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            middlewares,
            not_found: not_found.unwrap_or_else(default_not_found),
            method_not_allowed: method_not_allowed.unwrap_or_else(default_method_not_allowed),
            handshake_timeout,
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Run one request through match, middleware and handler.
    ///
    /// Never fails: unmatched paths, disallowed methods, dropped writers and
    /// (when configured) handshake timeouts all produce a reply.
    pub async fn dispatch(&self, http: HttpRequest, remote_addr: Option<SocketAddr>) -> PendingReply {
        // MATCH
        let matched = self.table.lookup(&http.path);
        let found = matched.is_found();
        let allowed = matched.route.map_or(true, |route| route.allows(http.method));
        let handler = matched.route.and_then(|route| route.handler.clone());
        let request = Arc::new(RouteRequest::new(http, &matched, remote_addr));
        debug!(
            "{} {} -> found: {found}, allowed: {allowed}, route: {:?}",
            request.method(),
            request.path,
            request.route
        );

        let (writer, mut ready_rx) = ResponseWriter::channel();
        let mut early: Option<Result<Ready, oneshot::error::RecvError>> = None;

        // MIDDLEWARE
        let stage = match self
            .within(self.run_middlewares(&request, writer, &mut ready_rx, &mut early))
            .await
        {
            Some(stage) => stage,
            None => return self.timed_out(&request),
        };

        // DISPATCH
        if let Stage::Dispatch(writer) = stage {
            let target = if !allowed {
                self.method_not_allowed.clone()
            } else {
                handler.unwrap_or_else(|| self.not_found.clone())
            };
            spawn_unit(target(request.clone(), writer), "handler", &request.path);
        }

        // COMPLETE
        let ready = match early.take() {
            Some(ready) => ready,
            None => match self.within(&mut ready_rx).await {
                Some(ready) => ready,
                None => return self.timed_out(&request),
            },
        };

        match ready {
            Ok(Ready { response, written }) => PendingReply {
                response: finalize(response, allowed),
                written: Some(written),
            },
            Err(_) => {
                error!(
                    "{} {}: response writer dropped without writing a response",
                    request.method(),
                    request.path
                );
                PendingReply::immediate(
                    HttpResponse::new(StatusCode::InternalServerError)
                        .with_content_type("text/plain")
                        .with_body_string("Internal server error"),
                )
            }
        }
    }

    /// Launch middlewares in order, waiting for each one's flow signal before
    /// starting the next.
    async fn run_middlewares(
        &self,
        request: &Arc<RouteRequest>,
        writer: ResponseWriter,
        ready_rx: &mut oneshot::Receiver<Ready>,
        early: &mut Option<Result<Ready, oneshot::error::RecvError>>,
    ) -> Stage {
        let mut writer = writer;
        for middleware in &self.middlewares {
            let (next, flow_rx) = Next::channel();
            spawn_unit(middleware(request.clone(), writer, next), "middleware", &request.path);

            // A middleware may write its response before (or instead of)
            // signalling, so the ready signal is watched too.
            tokio::select! {
                biased;
                flow = flow_rx => match flow {
                    Ok(Flow::Continue(returned)) => writer = returned,
                    Ok(Flow::Handled) | Err(_) => return Stage::ShortCircuit,
                },
                ready = &mut *ready_rx => {
                    *early = Some(ready);
                    return Stage::ShortCircuit;
                }
            }
        }
        Stage::Dispatch(writer)
    }

    /// Await `signal`, bounded by the handshake timeout when one is configured.
    async fn within<F: Future>(&self, signal: F) -> Option<F::Output> {
        match self.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, signal).await.ok(),
            None => Some(signal.await),
        }
    }

    fn timed_out(&self, request: &RouteRequest) -> PendingReply {
        warn!(
            "{} {}: no handshake signal within {:?}",
            request.method(),
            request.path,
            self.handshake_timeout
        );
        PendingReply::immediate(
            HttpResponse::new(StatusCode::GatewayTimeout)
                .with_content_type("text/plain")
                .with_body_string("Gateway timeout"),
        )
    }
}

/// Resolve the final status and copy the accumulated state onto the wire response.
fn finalize(state: InFlightResponse, allowed: bool) -> HttpResponse {
    let status = state.status.unwrap_or(if allowed {
        StatusCode::Ok
    } else {
        StatusCode::Forbidden
    });

    let mut response = HttpResponse::new(status);
    for (name, value) in state.headers {
        response = response.with_header(name, value);
    }
    for cookie in &state.cookies {
        response = response.append_header("Set-Cookie", cookie.to_header_value());
    }
    response.with_body_bytes(state.body)
}

fn spawn_unit(unit: HandlerFuture, kind: &'static str, path: &str) {
    let path = path.to_string();
    tokio::spawn(async move {
        if let Err(e) = unit.await {
            error!("{kind} for {path} failed: {e}");
        }
    });
}

fn default_not_found() -> HandlerFn {
    handler_fn(|_req, mut res| async move {
        res.status(StatusCode::NotFound);
        res.finish().await
    })
}

fn default_method_not_allowed() -> HandlerFn {
    handler_fn(|_req, mut res| async move {
        res.status(StatusCode::Forbidden);
        res.finish().await
    })
}
