//! A declarative HTTP router with concurrent middleware.
//!
//! Routes are declared as a tree and compiled once, at startup, into a
//! dispatch table: literal URLs go into an exact-match map, URLs with dynamic
//! segments become anchored regular expressions tried in declaration order.
//! Each request then runs through the middleware chain and a handler, each in
//! its own task, and the response is handed to the transport through an
//! explicit handshake.
//!
//! # Features
//!
//! - Nested route declarations with inherited URL prefixes
//! - `{name}` required and `{{name}}` optional path parameters
//! - Routes declared in one place and handled in another, merged at build time
//! - Duplicate handlers rejected before the server starts
//! - Concurrent middleware that can short-circuit the handler
//! - Configurable 404 / 403 fallbacks
//! - A small HTTP/1.1 server to run it all on
//!
//! # Examples
//!
//! ## Declaring routes
//!
//! ```
//! use microroute::{Method, RouteDefinition, Router, StatusCode};
//!
//! let router = Router::new()
//!     .route(RouteDefinition::new("/").handler(|_req, res| async move {
//!         res.write("<h1>Home</h1>").await
//!     }))
//!     .route(RouteDefinition::new("/users")
//!         .methods([Method::GET, Method::POST])
//!         .handler(|_req, res| async move { res.write_json(&["ada", "grace"]).await })
//!         .child(RouteDefinition::new("{id}").handler(|req, mut res| async move {
//!             let id = req.param("id").unwrap_or_default().to_string();
//!             res.status(StatusCode::Ok);
//!             res.write(format!("user {id}")).await
//!         })));
//!
//! let dispatcher = router.build().unwrap();
//! assert_eq!(dispatcher.table().len(), 3);
//! ```
//!
//! ## Conflicts are fatal
//!
//! ```
//! use microroute::{RouteDefinition, Router, RouterError};
//!
//! let result = Router::new()
//!     .route(RouteDefinition::new("/a").handler(|_req, res| async move { res.finish().await }))
//!     .route(RouteDefinition::new("a/").handler(|_req, res| async move { res.finish().await }))
//!     .build();
//!
//! assert!(matches!(result, Err(RouterError::DuplicateHandler { .. })));
//! ```
//!
//! ## Middleware
//!
//! ```
//! use microroute::{Router, StatusCode};
//!
//! let router = Router::new().middleware(|req, mut res, next| async move {
//!     if req.cookie("session").is_some() {
//!         next.proceed(res);
//!         return Ok(());
//!     }
//!     next.handled();
//!     res.status(StatusCode::Unauthorized);
//!     res.write("login required").await
//! });
//! # let _ = router;
//! ```
//!
//! See `demos/routed_server.rs` for a complete server.

// Export the parser module
pub mod parser;

// Export the router module
pub mod router;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{decode_path, Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use router::{DispatchTable, RouteDefinition, RouteKey, Router, RouterError};
pub use server::{
    Cookie, Dispatcher, Error as ServerError, HttpResponse, HttpServer, Next, PendingReply,
    ResponseWriter, RouteRequest, SameSite, ServerConfig, StatusCode,
};
