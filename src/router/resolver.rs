//! Flattening of the declared route tree.

use serde_json::Value;

use crate::parser::Method;
use crate::router::definition::{RouteDefinition, RouteKey};
use crate::router::handler::HandlerFn;

/// A route lifted out of the tree, with its absolute URL.
#[derive(Clone)]
pub struct FlatRoute {
    pub key: RouteKey,
    pub parent: Option<RouteKey>,
    /// Parent URL + own fragment, with a trailing `/`. Not yet normalized.
    pub url: String,
    pub methods: Vec<Method>,
    /// Whether `methods` came from the declaration rather than the `GET` default.
    pub explicit_methods: bool,
    pub handler: Option<HandlerFn>,
    pub data: Option<Value>,
}

/// Walk the tree depth-first and flatten it, consuming the declarations.
///
/// Children are emitted right after their parent and before the parent's next
/// sibling. The returned order is the order the table builder sees routes in.
pub fn resolve(definitions: Vec<RouteDefinition>) -> Vec<FlatRoute> {
    let mut resolver = Resolver::default();
    for definition in definitions {
        resolver.visit(definition, "", None);
    }
    resolver.routes
}

#[derive(Default)]
struct Resolver {
    routes: Vec<FlatRoute>,
    next_index: usize,
}

impl Resolver {
    fn assign_key(&mut self, key: Option<String>) -> RouteKey {
        match key {
            Some(name) => RouteKey::Named(name),
            None => {
                let key = RouteKey::Generated(self.next_index);
                self.next_index += 1;
                key
            }
        }
    }

    fn visit(&mut self, definition: RouteDefinition, parent_url: &str, parent: Option<RouteKey>) {
        let RouteDefinition {
            key,
            url,
            methods,
            handler,
            children,
            data,
        } = definition;

        let key = self.assign_key(key);

        let mut absolute = format!("{parent_url}{url}");
        if !absolute.ends_with('/') {
            absolute.push('/');
        }

        let explicit_methods = !methods.is_empty();
        let methods = if explicit_methods { methods } else { vec![Method::GET] };

        self.routes.push(FlatRoute {
            key: key.clone(),
            parent,
            url: absolute.clone(),
            methods,
            explicit_methods,
            handler,
            data,
        });

        for child in children {
            self.visit(child, &absolute, Some(key.clone()));
        }
    }
}
