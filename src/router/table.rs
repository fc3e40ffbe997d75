//! The dispatch table: exact-match map plus ordered pattern list.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::parser::{decode_path, Method};
use crate::router::definition::{RouteDefinition, RouteKey};
use crate::router::error::{Result, RouterError};
use crate::router::handler::HandlerFn;
use crate::router::pattern::{compile, extract_params, normalize};
use crate::router::resolver::{resolve, FlatRoute};

/// A route as stored in the dispatch table.
#[derive(Clone)]
pub struct ResolvedRoute {
    pub key: RouteKey,
    /// Normalized URL; starts and ends with `/`.
    pub url: String,
    pub methods: Vec<Method>,
    pub(crate) explicit_methods: bool,
    pub handler: Option<HandlerFn>,
    pub data: Option<Value>,
    /// Parameter name to segment position. Empty for exact routes.
    pub params: HashMap<String, usize>,
    /// Set for pattern routes only.
    pub pattern: Option<Regex>,
}

/// Whether a route only declares attributes or also carries a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Declared,
    Handled,
}

/// What [`merge_routes`] did with the incoming route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The existing entry took over the incoming handler, identity, methods and data.
    Adopted,
    /// The incoming route was dropped; it could at most fill attributes the
    /// existing entry left unset.
    Absorbed,
}

impl ResolvedRoute {
    fn from_flat(flat: FlatRoute) -> Self {
        let url = normalize(&flat.url);
        let (params, pattern) = match compile(&url) {
            Some(compiled) => (compiled.params, Some(compiled.regex)),
            None => (HashMap::new(), None),
        };

        Self {
            key: flat.key,
            url,
            methods: flat.methods,
            explicit_methods: flat.explicit_methods,
            handler: flat.handler,
            data: flat.data,
            params,
            pattern,
        }
    }

    pub fn kind(&self) -> RouteKind {
        if self.handler.is_some() {
            RouteKind::Handled
        } else {
            RouteKind::Declared
        }
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Fill methods and data the route left unset from `other`.
    fn fill_unset(&mut self, other: ResolvedRoute) {
        if !self.explicit_methods && other.explicit_methods {
            self.methods = other.methods;
            self.explicit_methods = true;
        }
        if self.data.is_none() {
            self.data = other.data;
        }
    }
}

impl fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("key", &self.key)
            .field("url", &self.url)
            .field("methods", &self.methods)
            .field("kind", &self.kind())
            .field("params", &self.params)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .finish()
    }
}

/// Merge `incoming` into `existing`, which share the same URL or pattern.
///
/// Two handlers for one route is a configuration error. Otherwise the handled
/// side wins identity and handler, and every other attribute comes from
/// whichever side set it, preferring the handled side.
pub fn merge_routes(existing: &mut ResolvedRoute, incoming: ResolvedRoute) -> Result<MergeOutcome> {
    match (existing.kind(), incoming.kind()) {
        (RouteKind::Handled, RouteKind::Handled) => Err(RouterError::DuplicateHandler {
            url: existing.url.clone(),
        }),
        (RouteKind::Declared, RouteKind::Handled) => {
            let declared = std::mem::replace(existing, incoming);
            // The table key stays what it was.
            existing.url = declared.url.clone();
            existing.fill_unset(declared);
            Ok(MergeOutcome::Adopted)
        }
        (_, RouteKind::Declared) => {
            existing.fill_unset(incoming);
            Ok(MergeOutcome::Absorbed)
        }
    }
}

/// The result of matching a path against the table.
///
/// A miss still yields a value of the same shape with no route.
#[derive(Debug, Default)]
pub struct RouteMatch<'a> {
    pub route: Option<&'a ResolvedRoute>,
    pub params: HashMap<String, String>,
}

impl RouteMatch<'_> {
    pub fn is_found(&self) -> bool {
        self.route.is_some()
    }
}

/// Read-only routing state built once at startup.
#[derive(Debug, Default)]
pub struct DispatchTable {
    exact: HashMap<String, ResolvedRoute>,
    patterns: Vec<ResolvedRoute>,
}

impl DispatchTable {
    /// Resolve the declared tree and build the table.
    ///
    /// Fails with [`RouterError::DuplicateHandler`] when two declarations put a
    /// handler on the same URL or on patterns with the same expression.
    pub fn build(definitions: Vec<RouteDefinition>) -> Result<Self> {
        let mut table = Self::default();
        for flat in resolve(definitions) {
            table.insert(ResolvedRoute::from_flat(flat))?;
        }
        Ok(table)
    }

    fn insert(&mut self, route: ResolvedRoute) -> Result<()> {
        if let Some(source) = route.pattern.as_ref().map(|re| re.as_str().to_string()) {
            let existing = self
                .patterns
                .iter_mut()
                .find(|p| p.pattern.as_ref().is_some_and(|re| re.as_str() == source));
            match existing {
                Some(existing) => {
                    let outcome = merge_routes(existing, route)?;
                    debug!("merged pattern route {source}: {outcome:?}");
                }
                None => self.patterns.push(route),
            }
            return Ok(());
        }

        match self.exact.get_mut(&route.url) {
            Some(existing) => {
                let url = route.url.clone();
                let outcome = merge_routes(existing, route)?;
                debug!("merged route {url}: {outcome:?}");
            }
            None => {
                self.exact.insert(route.url.clone(), route);
            }
        }
        Ok(())
    }

    /// Match a request path. The query string, if any, is ignored; the rest
    /// is percent-decoded before it is normalized.
    pub fn lookup(&self, path: &str) -> RouteMatch<'_> {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let normalized = normalize(&decode_path(path));

        if let Some(route) = self.exact.get(&normalized) {
            return RouteMatch {
                route: Some(route),
                params: HashMap::new(),
            };
        }

        let matched = self
            .patterns
            .iter()
            .find(|route| route.pattern.as_ref().is_some_and(|re| re.is_match(&normalized)));

        match matched {
            Some(route) => RouteMatch {
                route: Some(route),
                params: extract_params(&normalized, &route.params),
            },
            None => RouteMatch::default(),
        }
    }

    /// Exact routes (in no particular order) followed by pattern routes in match order.
    pub fn routes(&self) -> impl Iterator<Item = &ResolvedRoute> {
        self.exact.values().chain(self.patterns.iter())
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
