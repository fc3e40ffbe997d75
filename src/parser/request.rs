//! The parsed request and the parser that produces it.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::request_line::{HttpVersion, Method, RequestLine};

/// A request as read off the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// The request target, query string included.
    pub path: String,
    pub version: HttpVersion,
    /// Header names as sent; look them up with [`get_header`](Self::get_header).
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Percent-decoded query parameters. A repeated key keeps its last value.
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    /// A request with an empty body. Query parameters are taken from `path`.
    pub fn new(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let query_params = path
            .split_once('?')
            .map(|(_, query)| parse_query(query))
            .unwrap_or_default();

        Self {
            method,
            path,
            version,
            headers,
            body: Vec::new(),
            query_params,
        }
    }

    pub fn with_body(
        method: Method,
        path: String,
        version: HttpVersion,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            body,
            ..Self::new(method, path, version, headers)
        }
    }

    /// The target without its query string.
    pub fn path_without_query(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Header value by case-insensitive name.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }

    /// Cookies from the `Cookie` header, keyed by name.
    ///
    /// Pairs without `=` or without a name are skipped; a repeated name keeps
    /// its last value. Surrounding double quotes are removed from values.
    pub fn cookies(&self) -> HashMap<String, String> {
        let Some(header) = self.get_header("Cookie") else {
            return HashMap::new();
        };

        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect()
    }

    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// Decode the body as JSON. The request must declare a JSON content type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            let declared = self.get_header("Content-Type").cloned().unwrap_or_default();
            return Err(Error::UnsupportedContentType(declared));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Parse a request from the bytes read off a connection.
///
/// Only the header block must be UTF-8. Everything after the blank line is the
/// body, cut to `Content-Length` when that header is smaller than what arrived.
/// A body shorter than its declared length is rejected.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyRequest);
    }

    let (head, body) = split_head(input);
    let head = std::str::from_utf8(head).map_err(|_| Error::InvalidEncoding)?;

    // Blank lines ahead of the request line are tolerated.
    let mut lines = head.lines().skip_while(|line| line.trim().is_empty());
    let request_line: RequestLine = lines.next().ok_or(Error::EmptyRequest)?.parse()?;

    let headers = parse_headers(lines)?;
    if request_line.version.requires_host() && !headers.keys().any(|name| name.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    let body = match content_length(&headers)? {
        Some(declared) if declared > body.len() => {
            return Err(Error::IncompleteBody {
                declared,
                received: body.len(),
            })
        }
        Some(declared) => &body[..declared],
        None => body,
    };

    Ok(HttpRequest::with_body(
        request_line.method,
        request_line.target,
        request_line.version,
        headers,
        body.to_vec(),
    ))
}

/// Position of the blank line ending the header block and the length of that
/// terminator. CRLF or bare LF, whichever comes first.
pub(crate) fn find_head_end(input: &[u8]) -> Option<(usize, usize)> {
    let crlf = input.windows(4).position(|w| w == b"\r\n\r\n").map(|at| (at, 4));
    let lf = input.windows(2).position(|w| w == b"\n\n").map(|at| (at, 2));
    match (crlf, lf) {
        (Some(c), Some(l)) => Some(if l.0 < c.0 { l } else { c }),
        (c, l) => c.or(l),
    }
}

fn split_head(input: &[u8]) -> (&[u8], &[u8]) {
    match find_head_end(input) {
        Some((at, len)) => (&input[..at], &input[at + len..]),
        None => (input, &[]),
    }
}

fn content_length(headers: &HashMap<String, String>) -> Result<Option<usize>, Error> {
    let Some((_, value)) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
    else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| Error::InvalidContentLength(value.clone()))
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<HashMap<String, String>, Error> {
    let mut headers = HashMap::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(headers)
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Decode `%XX` escapes in a request path. Unlike query values, `+` is kept.
///
/// ```
/// use microroute::parser::decode_path;
///
/// assert_eq!(decode_path("/users/j%C3%BCrgen"), "/users/jürgen");
/// assert_eq!(decode_path("/a+b"), "/a+b");
/// ```
pub fn decode_path(raw: &str) -> String {
    percent_decode(raw, false)
}

fn decode_component(raw: &str) -> String {
    percent_decode(raw, true)
}

/// Decode `%XX` escapes, and `+` when `plus_as_space`. Malformed escapes are
/// kept as written.
fn percent_decode(raw: &str, plus_as_space: bool) -> String {
    if !raw.contains('%') && !(plus_as_space && raw.contains('+')) {
        return raw.to_string();
    }

    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => decoded.push(b' '),
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                        continue;
                    }
                    None => decoded.push(b'%'),
                }
            }
            other => decoded.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
