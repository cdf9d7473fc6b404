//! Handler and middleware plumbing.
//!
//! A handler consumes the request context and returns a future yielding the
//! (possibly responded-to) context. Middleware is a function from handler to
//! handler; wrapping composes in the given order, so in
//! `wrap_in_order(inner, [mw1, mw2, mw3])` the outermost layer is `mw3`.

pub mod table;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use http::header;
use once_cell::sync::Lazy;

use crate::ctx::RouteCtx;

/// A boxed future returning the request context.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A request handler: the unit every chain in the tree is built from.
pub trait Handler: Send + Sync + 'static {
    /// Consume the context and return a future yielding it back.
    fn handle(&self, ctx: RouteCtx) -> BoxFuture<RouteCtx>;
}

/// Blanket impl: any async fn or closure `Fn(RouteCtx) -> impl Future` is a
/// handler.
impl<F, Fut> Handler for F
where
    F: Fn(RouteCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RouteCtx> + Send + 'static,
{
    fn handle(&self, ctx: RouteCtx) -> BoxFuture<RouteCtx> {
        Box::pin((self)(ctx))
    }
}

/// Shared, cheaply cloneable handler reference.
pub type ArcHandler = Arc<dyn Handler>;

/// Middleware takes a handler and returns a handler of the same shape.
///
/// A middleware that synthesizes a response itself must mark the context
/// handled, otherwise the dispatcher emits the default 404 afterwards.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: ArcHandler) -> ArcHandler;
}

impl<F> Middleware for F
where
    F: Fn(ArcHandler) -> ArcHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: ArcHandler) -> ArcHandler {
        (self)(next)
    }
}

/// Apply middlewares in the given order: each wraps the previous result, so
/// the last middleware in the slice ends up outermost.
pub fn wrap_in_order(inner: ArcHandler, middlewares: &[Arc<dyn Middleware>]) -> ArcHandler {
    middlewares
        .iter()
        .fold(inner, |wrapped, mw| mw.wrap(wrapped))
}

/// The redirect hook of a responder: writes the redirect response for a
/// computed target URL. Replaceable per node and wrappable like any handler.
pub trait RedirectHandler: Send + Sync + 'static {
    fn handle(&self, ctx: RouteCtx, location: String, code: StatusCode) -> BoxFuture<RouteCtx>;
}

impl<F, Fut> RedirectHandler for F
where
    F: Fn(RouteCtx, String, StatusCode) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RouteCtx> + Send + 'static,
{
    fn handle(&self, ctx: RouteCtx, location: String, code: StatusCode) -> BoxFuture<RouteCtx> {
        Box::pin((self)(ctx, location, code))
    }
}

pub type ArcRedirectHandler = Arc<dyn RedirectHandler>;

/// Middleware over the redirect hook.
pub trait RedirectMiddleware: Send + Sync + 'static {
    fn wrap(&self, next: ArcRedirectHandler) -> ArcRedirectHandler;
}

impl<F> RedirectMiddleware for F
where
    F: Fn(ArcRedirectHandler) -> ArcRedirectHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: ArcRedirectHandler) -> ArcRedirectHandler {
        (self)(next)
    }
}

static DEFAULT_REDIRECT: Lazy<ArcRedirectHandler> = Lazy::new(|| {
    Arc::new(
        |mut ctx: RouteCtx, location: String, code: StatusCode| async move {
            ctx.set_status(code);
            ctx.set_header(header::LOCATION, &location);
            ctx.mark_handled();
            ctx
        },
    )
});

/// The stock redirect handler: `Location:` plus the given status code.
pub fn default_redirect_handler() -> ArcRedirectHandler {
    DEFAULT_REDIRECT.clone()
}

static DEFAULT_NOT_FOUND: Lazy<ArcHandler> = Lazy::new(|| {
    Arc::new(|mut ctx: RouteCtx| async move {
        ctx.set_status(StatusCode::NOT_FOUND);
        ctx.mark_handled();
        ctx
    })
});

/// The stock not-found responder shared by every router until replaced.
pub fn default_not_found_handler() -> ArcHandler {
    DEFAULT_NOT_FOUND.clone()
}
