//! Per-request routing state.
//!
//! One value of [`RoutingState`] travels inside the request context through
//! every chain of the tree. It owns the segment cursor, the capture
//! accumulator and the policy flags the dispatch machine consults; it is
//! strictly request-local, so dispatch needs no locks.

use std::any::Any;
use std::sync::Arc;

use http::StatusCode;

use crate::handler::{ArcHandler, default_not_found_handler};
use crate::template::Captures;

/// Routing bookkeeping for one request.
pub(crate) struct RoutingState {
    // The path exactly as received (still percent-encoded).
    raw_path: String,
    // The cleaned path when the raw one had dot-segments or repeated
    // slashes; `None` means the raw path is already clean. Traversal always
    // walks the clean form so an unclean request still reaches its node and
    // can be redirected from there.
    clean: Option<String>,
    host: String,
    secure_connection: bool,
    // Byte offset of the '/' preceding the next unmatched segment of the
    // traversed path.
    cursor: usize,
    // Where the unmatched tail started when a subtree handler took over.
    fallback_start: Option<usize>,
    pub(crate) captures: Captures,
    pub(crate) subtree_exists: bool,
    pub(crate) handled: bool,
    // Tree-wide default for permanent redirects; the router stamps its own
    // value here before dispatch starts.
    pub(crate) permanent_code: StatusCode,
    // The router's replaceable not-found responder.
    pub(crate) not_found: ArcHandler,
    // Shared user data of the responder currently handling the request.
    pub(crate) shared: Option<Arc<dyn Any + Send + Sync>>,
}

impl RoutingState {
    pub(crate) fn new(raw_path: String, host: String, secure_connection: bool) -> Self {
        let raw_path = if raw_path.is_empty() {
            "/".to_string()
        } else {
            raw_path
        };
        let clean = needs_cleaning(&raw_path).then(|| clean_path(&raw_path));
        let clean = clean.filter(|c| *c != raw_path);
        RoutingState {
            raw_path,
            clean,
            host,
            secure_connection,
            cursor: 0,
            fallback_start: None,
            captures: Captures::new(),
            subtree_exists: false,
            handled: false,
            permanent_code: StatusCode::PERMANENT_REDIRECT,
            not_found: default_not_found_handler(),
            shared: None,
        }
    }

    /// The path as received.
    pub(crate) fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// The path the tree walk runs on: the clean form.
    pub(crate) fn route_path(&self) -> &str {
        self.clean.as_deref().unwrap_or(&self.raw_path)
    }

    pub(crate) fn is_unclean(&self) -> bool {
        self.clean.is_some()
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn secure_connection(&self) -> bool {
        self.secure_connection
    }

    pub(crate) fn has_trailing_slash(&self) -> bool {
        let p = self.route_path();
        p.len() > 1 && p.ends_with('/')
    }

    pub(crate) fn is_root_request(&self) -> bool {
        self.route_path() == "/"
    }

    // Length of the traversed path with the trailing slash cut off.
    fn segments_end(&self) -> usize {
        let p = self.route_path();
        if self.has_trailing_slash() {
            p.len() - 1
        } else {
            p.len()
        }
    }

    /// True when every path segment has been consumed.
    pub(crate) fn is_terminal(&self) -> bool {
        self.cursor + 1 >= self.segments_end()
    }

    /// The next unmatched segment (still percent-encoded) and the cursor
    /// position just past it.
    pub(crate) fn peek_segment(&self) -> Option<(&str, usize)> {
        if self.is_terminal() {
            return None;
        }
        let end = self.segments_end();
        let p = self.route_path();
        let start = self.cursor + 1;
        let stop = p[start..end].find('/').map_or(end, |pos| start + pos);
        Some((&p[start..stop], stop))
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn advance_to(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Everything from the cursor on, trailing slash included. Empty once
    /// the whole path is consumed.
    pub(crate) fn tail_from_cursor(&self) -> &str {
        &self.route_path()[self.cursor.min(self.route_path().len())..]
    }

    /// Latch the start of the unmatched tail for a subtree handler.
    pub(crate) fn set_fallback(&mut self, start: usize) {
        self.fallback_start = Some(start);
    }

    /// The unmatched tail of the path, from its leading '/', once a subtree
    /// handler has taken over.
    pub(crate) fn remaining_path(&self) -> Option<&str> {
        self.fallback_start.map(|start| &self.route_path()[start..])
    }

    pub(crate) fn capture(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

// A quick scan deciding whether the path needs the cleaning pass at all;
// almost every request is already clean and skips the allocation.
fn needs_cleaning(path: &str) -> bool {
    path.contains("//")
        || path.contains("/./")
        || path.contains("/../")
        || path.ends_with("/.")
        || path.ends_with("/..")
}

// Resolve dot-segments and collapse repeated slashes; the trailing slash of
// the original path survives when anything is left of it.
fn clean_path(path: &str) -> String {
    let trailing = path.len() > 1 && path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len());
    for s in &segments {
        out.push('/');
        out.push_str(s);
    }
    if out.is_empty() {
        out.push('/');
    } else if trailing {
        out.push('/');
    }
    out
}
