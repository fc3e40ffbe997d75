//! Router assembly: declarations, middleware and fallbacks in, a dispatcher out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::router::definition::RouteDefinition;
use crate::router::error::Result;
use crate::router::handler::{handler_fn, middleware_fn, HandlerFn, MiddlewareFn};
use crate::router::table::DispatchTable;
use crate::server::{Dispatcher, Error, Next, ResponseWriter, RouteRequest};

/// Collects everything the dispatcher needs before the one-time build.
///
/// ```ignore
/// let dispatcher = Router::new()
///     .route(RouteDefinition::new("/").handler(home))
///     .route(RouteDefinition::new("/users")
///         .child(RouteDefinition::new("{id}").handler(show_user)))
///     .middleware(require_session)
///     .not_found(custom_404)
///     .build()?;
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteDefinition>,
    middlewares: Vec<MiddlewareFn>,
    not_found: Option<HandlerFn>,
    method_not_allowed: Option<HandlerFn>,
    handshake_timeout: Option<Duration>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level route declaration (with its subtree).
    #[must_use]
    pub fn route(mut self, definition: RouteDefinition) -> Self {
        self.routes.push(definition);
        self
    }

    #[must_use]
    pub fn routes(mut self, definitions: impl IntoIterator<Item = RouteDefinition>) -> Self {
        self.routes.extend(definitions);
        self
    }

    /// Append a middleware. Middlewares start in the order they are added.
    #[must_use]
    pub fn middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(Arc<RouteRequest>, ResponseWriter, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), Error>> + Send + 'static,
    {
        self.middlewares.push(middleware_fn(middleware));
        self
    }

    /// Replace the default 404 reply for unmatched paths and handler-less routes.
    #[must_use]
    pub fn not_found<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<RouteRequest>, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), Error>> + Send + 'static,
    {
        self.not_found = Some(handler_fn(handler));
        self
    }

    /// Replace the default 403 reply for methods a route does not allow.
    #[must_use]
    pub fn method_not_allowed<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<RouteRequest>, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), Error>> + Send + 'static,
    {
        self.method_not_allowed = Some(handler_fn(handler));
        self
    }

    /// Bound every handshake wait. A middleware or handler that does not signal
    /// in time gets its request answered with 504 Gateway Timeout.
    ///
    /// Without a timeout, a middleware or handler that never signals holds its
    /// request open indefinitely.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Compile the route tree and produce the dispatcher.
    ///
    /// Fails with [`RouterError::DuplicateHandler`](crate::router::RouterError::DuplicateHandler)
    /// when two declarations carry a handler for the same route.
    pub fn build(self) -> Result<Dispatcher> {
        let table = DispatchTable::build(self.routes)?;
        info!(
            "Compiled {count} routes, {middlewares} middlewares",
            count = table.len(),
            middlewares = self.middlewares.len()
        );
        Ok(Dispatcher::from_parts(
            table,
            self.middlewares,
            self.not_found,
            self.method_not_allowed,
            self.handshake_timeout,
        ))
    }
}
