//! Handler and middleware callables.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::server::{Error, Next, ResponseWriter, RouteRequest};

/// Type alias for the boxed future every handler and middleware returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

/// A route handler, or a not-found / method-not-allowed hook.
///
/// The handler owns the [`ResponseWriter`] and must eventually write it (or drop it,
/// which the dispatcher answers with a 500).
pub type HandlerFn = Arc<dyn Fn(Arc<RouteRequest>, ResponseWriter) -> HandlerFuture + Send + Sync>;

/// A middleware. It either hands the writer back through [`Next::proceed`] or
/// answers the request itself.
pub type MiddlewareFn = Arc<dyn Fn(Arc<RouteRequest>, ResponseWriter, Next) -> HandlerFuture + Send + Sync>;

/// Box an async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(Arc<RouteRequest>, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |req: Arc<RouteRequest>, res: ResponseWriter| -> HandlerFuture {
        Box::pin(handler(req, res))
    })
}

/// Box an async closure into a [`MiddlewareFn`].
pub fn middleware_fn<F, Fut>(middleware: F) -> MiddlewareFn
where
    F: Fn(Arc<RouteRequest>, ResponseWriter, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |req: Arc<RouteRequest>, res: ResponseWriter, next: Next| -> HandlerFuture {
        Box::pin(middleware(req, res, next))
    })
}
