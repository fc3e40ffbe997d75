//! The response handle given to middleware and handlers.
//!
//! A request has exactly one [`ResponseWriter`]. It moves between the
//! dispatcher, the middlewares and the handler, so only its current holder can
//! change the response. Writing the body consumes the writer, sends the
//! response to the dispatcher ("response ready") and then waits until the
//! transport has written it ("write acknowledged").

use std::fmt;

use log::debug;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::server::error::Error;
use crate::server::response::StatusCode;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

/// A cookie to set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Seconds; `None` makes a session cookie.
    pub max_age: Option<i64>,
    /// Defaults to `/` when rendered.
    pub path: Option<String>,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            domain: None,
            same_site: None,
            http_only: false,
            secure: false,
        }
    }

    #[must_use]
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut value = format!(
            "{}={}; Path={}",
            self.name,
            self.value,
            self.path.as_deref().unwrap_or("/")
        );
        if let Some(max_age) = self.max_age {
            value.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.domain {
            value.push_str(&format!("; Domain={domain}"));
        }
        if let Some(same_site) = self.same_site {
            value.push_str(&format!("; SameSite={same_site}"));
        }
        if self.http_only {
            value.push_str("; HttpOnly");
        }
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}

/// Response state accumulated while a request is in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlightResponse {
    /// Unset until someone sets it; resolved by the dispatcher.
    pub status: Option<StatusCode>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<Cookie>,
    pub body: Vec<u8>,
}

impl InFlightResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: String, value: String) {
        let position = self.headers.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name));
        match position {
            Some(index) => self.headers[index].1 = value,
            None => self.headers.push((name, value)),
        }
    }
}

/// A finished response on its way to the transport, with the channel that
/// tells the writer the bytes went out.
pub(crate) struct Ready {
    pub(crate) response: InFlightResponse,
    pub(crate) written: oneshot::Sender<()>,
}

/// Handle to the response of one request.
///
/// Dropping a writer without writing it leaves the request unanswered; the
/// dispatcher then replies with 500 Internal Server Error.
pub struct ResponseWriter {
    state: InFlightResponse,
    ready: oneshot::Sender<Ready>,
}

impl ResponseWriter {
    /// A fresh writer and the receiving end of its "response ready" signal.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Ready>) {
        let (ready, ready_rx) = oneshot::channel();
        let writer = Self {
            state: InFlightResponse::default(),
            ready,
        };
        (writer, ready_rx)
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.state.status = Some(status);
        self
    }

    /// Add or replace a header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.state.set_header(name.into(), value.into());
        self
    }

    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.state.cookies.push(cookie);
        self
    }

    /// The response as accumulated so far.
    pub fn state(&self) -> &InFlightResponse {
        &self.state
    }

    /// Write the body and hand the response to the transport.
    ///
    /// Resolves once the response has been written to the connection. Sets
    /// `Content-Type: text/html; charset=utf-8` unless a content type was set.
    pub async fn write(self, body: impl Into<Vec<u8>>) -> Result<(), Error> {
        let Self { mut state, ready } = self;

        if state.header("Content-Type").is_none() {
            state.set_header("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
        }
        state.body = body.into();

        let (written, written_rx) = oneshot::channel();
        ready
            .send(Ready {
                response: state,
                written,
            })
            .map_err(|_| Error::ResponseDropped)?;

        written_rx.await.map_err(|_| Error::ResponseDropped)?;
        debug!("response write acknowledged");
        Ok(())
    }

    /// Write an empty body.
    pub async fn finish(self) -> Result<(), Error> {
        self.write(Vec::new()).await
    }

    /// Serialize `value` as the JSON body.
    pub async fn write_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value)?;
        self.header("Content-Type", JSON_CONTENT_TYPE);
        self.write(body).await
    }

    /// Redirect to `location`. The status defaults to 303 See Other.
    pub async fn redirect(mut self, location: impl Into<String>) -> Result<(), Error> {
        if self.state.status.is_none() {
            self.status(StatusCode::SeeOther);
        }
        self.header("Location", location);
        self.finish().await
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
