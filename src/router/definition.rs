//! Route declarations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::parser::Method;
use crate::router::handler::{handler_fn, HandlerFn};
use crate::server::{Error, ResponseWriter, RouteRequest};

/// Identity of a route inside one build of the dispatch table.
///
/// Callers may name a route; unnamed routes receive a generated index in
/// resolution order. Keys are only used to tell routes apart and to let
/// middleware see which route matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteKey {
    Named(String),
    Generated(usize),
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKey::Named(name) => f.write_str(name),
            RouteKey::Generated(index) => write!(f, "#{index}"),
        }
    }
}

/// A node in the declared route tree.
///
/// The URL is either a single segment (`"{id}"`) or a path (`"/api/v1"`); a
/// child's URL is appended to its parent's. A node without a handler only
/// declares the URL shape and attributes; a handler can be attached by a later
/// declaration of the same URL.
///
/// ```ignore
/// let users = RouteDefinition::new("/users")
///     .methods([Method::GET, Method::POST])
///     .handler(list_users)
///     .child(RouteDefinition::new("{id}").handler(show_user));
/// ```
#[derive(Clone, Default)]
pub struct RouteDefinition {
    pub(crate) key: Option<String>,
    pub(crate) url: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) handler: Option<HandlerFn>,
    pub(crate) children: Vec<RouteDefinition>,
    pub(crate) data: Option<Value>,
}

impl RouteDefinition {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Give the route an explicit identity.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Allowed methods. Defaults to `GET` when never set.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    #[must_use]
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<RouteRequest>, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.handler = Some(handler_fn(handler));
        self
    }

    /// Attach an already boxed handler.
    #[must_use]
    pub fn boxed_handler(mut self, handler: HandlerFn) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Opaque data handed to middleware and handlers with every request on this route.
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn child(mut self, child: RouteDefinition) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = RouteDefinition>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("key", &self.key)
            .field("url", &self.url)
            .field("methods", &self.methods)
            .field("handler", &self.handler.is_some())
            .field("children", &self.children)
            .field("data", &self.data)
            .finish()
    }
}
