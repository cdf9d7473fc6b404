//! The request context handed through every handler chain.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HOST};
use http::{Method, Request, Response, StatusCode};

use crate::dispatch::state::RoutingState;

/// Everything a handler sees: the parsed request, the response under
/// construction, and the routing state accumulated on the way down the tree.
///
/// The context moves through the chains by value — consumed, mutated and
/// handed back — so per-request state never needs a lock.
pub struct RouteCtx {
    pub request: Request<Bytes>,
    pub response: Response<Bytes>,
    pub(crate) state: RoutingState,
}

impl RouteCtx {
    /// Build a context for an incoming request. `secure_connection` reports
    /// whether the transport the request arrived on was TLS; the core never
    /// inspects sockets itself.
    pub fn new(request: Request<Bytes>, secure_connection: bool) -> Self {
        let path = request.uri().path().to_string();
        let authority = request
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        let host = normalize_authority(&authority);

        RouteCtx {
            request,
            response: Response::new(Bytes::new()),
            state: RoutingState::new(path, host, secure_connection),
        }
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The request path exactly as received.
    pub fn path(&self) -> &str {
        self.state.raw_path()
    }

    /// The normalized request host: authority or `Host:` header, lowercased,
    /// port stripped.
    pub fn host(&self) -> &str {
        self.state.host()
    }

    pub fn is_secure_connection(&self) -> bool {
        self.state.secure_connection()
    }

    /// The value captured for `name` anywhere along the matched chain.
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.state.capture(name)
    }

    /// All captured `(name, value)` pairs in match order.
    pub fn captures(&self) -> &[(String, String)] {
        &self.state.captures
    }

    /// The unmatched path tail when a subtree handler is serving the
    /// request, starting with its `/`. `None` during exact matches.
    pub fn remaining_path(&self) -> Option<&str> {
        self.state.remaining_path()
    }

    /// Whether some handler already wrote a response.
    pub fn handled(&self) -> bool {
        self.state.handled
    }

    /// Claim the request; without this the dispatcher emits its default 404
    /// after the chain returns.
    pub fn mark_handled(&mut self) {
        self.state.handled = true;
    }

    pub fn set_status(&mut self, status: StatusCode) {
        *self.response.status_mut() = status;
    }

    /// Insert a response header; silently ignores values that are not legal
    /// header text.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = value.parse() {
            self.response.headers_mut().insert(name, value);
        }
    }

    /// Write a full response and mark the request handled.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        *self.response.status_mut() = status;
        *self.response.body_mut() = body.into();
        self.state.handled = true;
    }

    /// The shared user data of the responder serving this request, if any.
    pub fn shared_data(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.state.shared.as_ref()
    }

    /// Typed access to the shared user data.
    pub fn shared<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.state
            .shared
            .as_ref()
            .and_then(|data| Arc::clone(data).downcast::<T>().ok())
    }
}

// Strip the port and lowercase; request authorities may carry a port the
// host templates never do. Bracketed IPv6 literals keep their brackets.
pub(crate) fn normalize_authority(authority: &str) -> String {
    let host = match authority.rfind(':') {
        Some(idx) if !authority[idx..].contains(']') => &authority[..idx],
        _ => authority,
    };
    host.to_ascii_lowercase()
}
