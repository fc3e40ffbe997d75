//! The request as seen by middleware and handlers.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::parser::{decode_path, Error as ParserError, HttpRequest, Method};
use crate::router::{normalize, RouteKey, RouteMatch};

/// A parsed request plus everything routing learned about it.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// The request as parsed from the connection.
    pub http: HttpRequest,
    /// Percent-decoded, normalized path without the query string.
    pub path: String,
    /// Values of the dynamic segments of the matched route.
    pub params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Identity of the matched route; `None` when nothing matched.
    pub route: Option<RouteKey>,
    /// Additional data declared on the matched route.
    pub data: Option<Value>,
    /// Peer address of the connection, when known.
    pub remote_addr: Option<SocketAddr>,
}

impl RouteRequest {
    pub(crate) fn new(http: HttpRequest, matched: &RouteMatch<'_>, remote_addr: Option<SocketAddr>) -> Self {
        let path = normalize(&decode_path(http.path_without_query()));
        let cookies = http.cookies();
        Self {
            path,
            params: matched.params.clone(),
            cookies,
            route: matched.route.map(|route| route.key.clone()),
            data: matched.route.and_then(|route| route.data.clone()),
            remote_addr,
            http,
        }
    }

    pub fn method(&self) -> Method {
        self.http.method
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.http.get_header(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.http.get_query_param(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.http.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParserError> {
        self.http.json()
    }

    /// The client address: first `X-Forwarded-For` entry, then `X-Real-IP`,
    /// then the peer address of the connection.
    pub fn client_ip(&self) -> Option<String> {
        if let Some(forwarded) = self.header("X-Forwarded-For") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
                return Some(first.to_string());
            }
        }
        if let Some(real_ip) = self.header("X-Real-IP").filter(|ip| !ip.is_empty()) {
            return Some(real_ip.to_string());
        }
        self.remote_addr.map(|addr| addr.ip().to_string())
    }
}
