//! Per-responder method handler table.
//!
//! Maps uppercase HTTP method tokens to handlers, keeps a separate slot for
//! the not-allowed-method handler (`"!"`), and synthesizes OPTIONS and 405
//! responses with an `Allow:` header when the user supplies none.

use std::sync::Arc;

use http::{Method, StatusCode, header};

use super::{ArcHandler, Middleware, wrap_in_order};
use crate::ctx::RouteCtx;
use crate::error::{Result, RouterError};

// Below this many entries a linear scan beats the sorted lookup.
const BINARY_SEARCH_MIN: usize = 15;

/// The method → handler structure of one responder.
///
/// Entries keep their insertion order — that order drives the `Allow:`
/// header — while lookups switch to binary search over a sorted side index
/// once the table grows past [`BINARY_SEARCH_MIN`] entries.
#[derive(Default)]
pub struct MethodTable {
    entries: Vec<(Method, ArcHandler)>,
    sorted: Vec<usize>,
    not_allowed: Option<ArcHandler>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace handlers for a space/comma-separated method list.
    ///
    /// The sentinel `"!"` sets the not-allowed-method handler. `"*"` is only
    /// meaningful to [`MethodTable::wrap_handler_of`] and is rejected here.
    pub fn set_handler(&mut self, methods: &str, handler: ArcHandler) -> Result<()> {
        let tokens: Vec<&str> = methods
            .split([' ', ','])
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(RouterError::NilArgument("method list"));
        }

        for token in tokens {
            if token == "!" {
                self.not_allowed = Some(handler.clone());
                continue;
            }
            let method = parse_method(token)?;
            match self.entries.iter_mut().find(|(m, _)| *m == method) {
                Some((_, slot)) => *slot = handler.clone(),
                None => self.entries.push((method, handler.clone())),
            }
        }

        self.rebuild_index();
        Ok(())
    }

    /// The handler registered for `method`, if any. `"!"` lookups go through
    /// [`MethodTable::not_allowed_handler`] instead.
    pub fn handler_of(&self, method: &Method) -> Option<&ArcHandler> {
        if self.entries.len() < BINARY_SEARCH_MIN {
            self.entries
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, h)| h)
        } else {
            self.sorted
                .binary_search_by(|&i| self.entries[i].0.as_str().cmp(method.as_str()))
                .ok()
                .map(|pos| &self.entries[self.sorted[pos]].1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `Allow:` value: registered methods in insertion order, with
    /// OPTIONS appended when it is only implicit.
    pub fn allow_header(&self) -> String {
        let mut out = String::new();
        for (m, _) in &self.entries {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(m.as_str());
        }
        if !self.entries.iter().any(|(m, _)| *m == Method::OPTIONS) {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str("OPTIONS");
        }
        out
    }

    /// The effective not-allowed-method handler: the user-supplied one, or a
    /// generated 405 with `Allow:`.
    pub fn not_allowed_handler(&self) -> ArcHandler {
        self.not_allowed
            .clone()
            .unwrap_or_else(|| generated_not_allowed(self.allow_header()))
    }

    /// Resolve the handler that serves `method` on this table: the stored
    /// handler, the synthesized OPTIONS responder, or the not-allowed one.
    pub fn dispatch_handler(&self, method: &Method) -> ArcHandler {
        if let Some(h) = self.handler_of(method) {
            return h.clone();
        }
        if *method == Method::OPTIONS && !self.entries.is_empty() {
            return generated_options(self.allow_header());
        }
        self.not_allowed_handler()
    }

    /// Wrap handlers with middleware applied in the given order.
    ///
    /// `methods` is a space/comma-separated list, `"!"` for the not-allowed
    /// handler (materializing the generated one first if needed), or `"*"`
    /// for every registered method handler. Naming a method with no handler
    /// fails.
    pub fn wrap_handler_of(&mut self, methods: &str, middlewares: &[Arc<dyn Middleware>]) -> Result<()> {
        match methods {
            "*" => {
                if self.entries.is_empty() {
                    return Err(RouterError::NoHandlerFor("*".to_string()));
                }
                for (_, slot) in self.entries.iter_mut() {
                    *slot = wrap_in_order(slot.clone(), middlewares);
                }
                Ok(())
            }
            "!" => {
                let inner = self
                    .not_allowed
                    .clone()
                    .unwrap_or_else(|| generated_not_allowed(self.allow_header()));
                self.not_allowed = Some(wrap_in_order(inner, middlewares));
                Ok(())
            }
            _ => {
                let tokens: Vec<&str> = methods
                    .split([' ', ','])
                    .filter(|t| !t.is_empty())
                    .collect();
                if tokens.is_empty() {
                    return Err(RouterError::NilArgument("method list"));
                }
                for token in tokens {
                    let method = parse_method(token)?;
                    let slot = self
                        .entries
                        .iter_mut()
                        .find(|(m, _)| *m == method)
                        .map(|(_, h)| h)
                        .ok_or_else(|| RouterError::NoHandlerFor(token.to_string()))?;
                    *slot = wrap_in_order(slot.clone(), middlewares);
                }
                Ok(())
            }
        }
    }

    fn rebuild_index(&mut self) {
        if self.entries.len() < BINARY_SEARCH_MIN {
            self.sorted.clear();
            return;
        }
        self.sorted = (0..self.entries.len()).collect();
        self.sorted
            .sort_by(|&a, &b| self.entries[a].0.as_str().cmp(self.entries[b].0.as_str()));
    }
}

fn parse_method(token: &str) -> Result<Method> {
    if token == "*" || token == "!" {
        return Err(RouterError::UnknownMethod(token.to_string()));
    }
    let upper = token.to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes()).map_err(|_| RouterError::UnknownMethod(token.to_string()))
}

fn generated_options(allow: String) -> ArcHandler {
    Arc::new(move |mut ctx: RouteCtx| {
        let allow = allow.clone();
        async move {
            ctx.set_status(StatusCode::NO_CONTENT);
            ctx.set_header(header::ALLOW, &allow);
            ctx.mark_handled();
            ctx
        }
    })
}

fn generated_not_allowed(allow: String) -> ArcHandler {
    Arc::new(move |mut ctx: RouteCtx| {
        let allow = allow.clone();
        async move {
            ctx.set_status(StatusCode::METHOD_NOT_ALLOWED);
            ctx.set_header(header::ALLOW, &allow);
            ctx.mark_handled();
            ctx
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Request;

    fn ctx(method: &str) -> RouteCtx {
        let req = Request::builder()
            .method(method)
            .uri("http://example.com/x")
            .body(Bytes::new())
            .unwrap();
        RouteCtx::new(req, false)
    }

    fn echo(tag: &'static str) -> ArcHandler {
        Arc::new(move |mut ctx: RouteCtx| async move {
            ctx.respond(StatusCode::OK, tag);
            ctx
        })
    }

    #[test]
    fn set_and_look_up() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("get")).unwrap();
        table.set_handler("put post", echo("write")).unwrap();
        assert!(table.handler_of(&Method::GET).is_some());
        assert!(table.handler_of(&Method::PUT).is_some());
        assert!(table.handler_of(&Method::POST).is_some());
        assert!(table.handler_of(&Method::DELETE).is_none());
    }

    #[test]
    fn empty_method_list_is_rejected() {
        let mut table = MethodTable::new();
        assert!(matches!(
            table.set_handler("  ,", echo("x")),
            Err(RouterError::NilArgument(_))
        ));
    }

    #[test]
    fn asterisk_is_not_settable() {
        let mut table = MethodTable::new();
        assert!(matches!(
            table.set_handler("*", echo("x")),
            Err(RouterError::UnknownMethod(_))
        ));
    }

    #[test]
    fn allow_header_keeps_insertion_order_and_appends_options() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("get")).unwrap();
        table.set_handler("SHARE", echo("share")).unwrap();
        assert_eq!(table.allow_header(), "GET, SHARE, OPTIONS");

        table.set_handler("OPTIONS", echo("opt")).unwrap();
        assert_eq!(table.allow_header(), "GET, SHARE, OPTIONS");
    }

    #[tokio::test]
    async fn synthesized_options_responds_204() {
        let mut table = MethodTable::new();
        table.set_handler("GET, SHARE", echo("get")).unwrap();
        let out = table.dispatch_handler(&Method::OPTIONS).handle(ctx("OPTIONS")).await;
        assert_eq!(out.response.status(), StatusCode::NO_CONTENT);
        assert_eq!(out.response.headers()[header::ALLOW], "GET, SHARE, OPTIONS");
    }

    #[tokio::test]
    async fn missing_method_falls_to_405() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("get")).unwrap();
        let out = table.dispatch_handler(&Method::PUT).handle(ctx("PUT")).await;
        assert_eq!(out.response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(out.response.headers()[header::ALLOW], "GET, OPTIONS");
    }

    #[tokio::test]
    async fn user_not_allowed_handler_wins() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("get")).unwrap();
        table
            .set_handler(
                "!",
                Arc::new(|mut ctx: RouteCtx| async move {
                    ctx.respond(StatusCode::METHOD_NOT_ALLOWED, "custom");
                    ctx
                }),
            )
            .unwrap();
        let out = table.dispatch_handler(&Method::PUT).handle(ctx("PUT")).await;
        assert_eq!(out.response.body().as_ref(), b"custom");
    }

    #[tokio::test]
    async fn wrap_applies_in_given_order() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("core")).unwrap();

        let tag = |t: &'static str| -> Arc<dyn Middleware> {
            Arc::new(move |next: ArcHandler| -> ArcHandler {
                Arc::new(move |ctx: RouteCtx| {
                    let next = next.clone();
                    async move {
                        let mut out = next.handle(ctx).await;
                        let mut body = String::from_utf8_lossy(out.response.body()).to_string();
                        body.push_str(t);
                        *out.response.body_mut() = Bytes::from(body);
                        out
                    }
                })
            })
        };

        table.wrap_handler_of("GET", &[tag("-a"), tag("-b")]).unwrap();
        let out = table.dispatch_handler(&Method::GET).handle(ctx("GET")).await;
        // -b is outermost and appends last on the way back out.
        assert_eq!(out.response.body().as_ref(), b"core-a-b");
    }

    #[test]
    fn wrap_of_missing_method_fails() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("get")).unwrap();
        assert!(matches!(
            table.wrap_handler_of("PUT", &[]),
            Err(RouterError::NoHandlerFor(_))
        ));
    }

    #[tokio::test]
    async fn wrap_star_touches_every_registered_handler() {
        let mut table = MethodTable::new();
        table.set_handler("GET", echo("g")).unwrap();
        table.set_handler("PUT", echo("p")).unwrap();

        let upgrade: Arc<dyn Middleware> = Arc::new(|next: ArcHandler| -> ArcHandler {
            Arc::new(move |ctx: RouteCtx| {
                let next = next.clone();
                async move {
                    let mut out = next.handle(ctx).await;
                    out.set_header(header::SERVER, "kozue");
                    out
                }
            })
        });
        table.wrap_handler_of("*", std::slice::from_ref(&upgrade)).unwrap();

        for m in [Method::GET, Method::PUT] {
            let out = table.dispatch_handler(&m).handle(ctx(m.as_str())).await;
            assert_eq!(out.response.headers()[header::SERVER], "kozue");
        }
    }

    #[test]
    fn large_tables_switch_to_sorted_lookup() {
        let mut table = MethodTable::new();
        for i in 0..20 {
            let token = format!("M{:02}", i);
            table.set_handler(&token, echo("x")).unwrap();
        }
        assert!(!table.sorted.is_empty());
        let m = Method::from_bytes(b"M07").unwrap();
        assert!(table.handler_of(&m).is_some());
        let missing = Method::from_bytes(b"M99").unwrap();
        assert!(table.handler_of(&missing).is_none());
    }
}
