//! Route compilation.
//!
//! ```text
//! RouteDefinition tree
//!     -> resolver.rs (flatten, absolute URLs, identities)
//!     -> pattern.rs  (normalize, compile dynamic URLs)
//!     -> table.rs    (exact map + ordered patterns, merge / conflict rules)
//!     -> Dispatcher  (read-only from here on)
//! ```

mod builder;
mod definition;
mod error;
mod handler;
mod pattern;
mod resolver;
mod table;

pub use builder::Router;
pub use definition::{RouteDefinition, RouteKey};
pub use error::{Result, RouterError};
pub use handler::{handler_fn, middleware_fn, HandlerFn, HandlerFuture, MiddlewareFn};
pub use pattern::{compile, extract_params, normalize, CompiledPattern, Segment};
pub use resolver::{resolve, FlatRoute};
pub use table::{merge_routes, DispatchTable, MergeOutcome, ResolvedRoute, RouteKind, RouteMatch};
