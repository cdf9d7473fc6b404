//! Responder nodes: the hosts and resources of the tree.
//!
//! A responder owns its segment template, its three child buckets, its
//! policy flags, its method handler table and the three wrappable request
//! chains. Parents own children; the back-reference is a `Weak` used only
//! for ancestor walks during construction and URL building, never during
//! dispatch.

pub mod config;
mod register;

use std::any::Any;
use std::sync::{Arc, Weak};

use fnv::FnvHashMap;
use http::StatusCode;

use crate::alias::PRwLock;
use crate::ctx::RouteCtx;
use crate::dispatch;
use crate::error::{Result, RouterError};
use crate::handler::table::MethodTable;
use crate::handler::{
    ArcHandler, ArcRedirectHandler, BoxFuture, Handler, Middleware, RedirectHandler,
    RedirectMiddleware, default_redirect_handler, wrap_in_order,
};
use crate::template::Template;

pub use self::config::Config;
pub(crate) use self::register::{merge_detached, parse_url_template};

/// Whether a responder matches the request authority or one path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderKind {
    Host,
    Resource,
}

/// The non-owning upward link of a responder.
pub(crate) enum Parent {
    /// Not registered anywhere yet.
    Detached,
    /// Linked directly under a router.
    Router,
    /// Linked under another responder.
    Responder(Weak<Responder>),
}

/// One node of the tree: a host or a resource.
pub struct Responder {
    kind: ResponderKind,
    template: Arc<Template>,
    // The router's root resource ("/"); never parented by a host.
    is_root: bool,
    parent: PRwLock<Parent>,

    // Child buckets, tried in this order at match time.
    static_children: PRwLock<FnvHashMap<String, Arc<Responder>>>,
    pattern_children: PRwLock<Vec<Arc<Responder>>>,
    wildcard_child: PRwLock<Option<Arc<Responder>>>,

    config: PRwLock<Config>,
    // Dormant responders become active through their first handler, an
    // explicit configuration call, or registration under an active parent.
    active: PRwLock<bool>,
    // Whether the config flags were deliberately set (URL-derived or
    // explicit) as opposed to defaulted on an implicit intermediate.
    configured: PRwLock<bool>,

    table: PRwLock<Option<MethodTable>>,

    // The three wrappable chains; `None` means the built-in behavior.
    receiver: PRwLock<Option<ArcHandler>>,
    passer: PRwLock<Option<ArcHandler>>,
    handler: PRwLock<Option<ArcHandler>>,

    redirect_code: PRwLock<Option<StatusCode>>,
    redirect_handler: PRwLock<ArcRedirectHandler>,

    shared: PRwLock<Option<Arc<dyn Any + Send + Sync>>>,

    // The host and path prefix this responder was constructed for; checked
    // against the real ancestor chain when the responder is registered.
    intended_host: PRwLock<Option<Arc<Template>>>,
    intended_prefix: PRwLock<Vec<Arc<Template>>>,
}

impl Responder {
    pub(crate) fn from_parts(kind: ResponderKind, template: Arc<Template>, is_root: bool) -> Arc<Responder> {
        Arc::new(Responder {
            kind,
            template,
            is_root,
            parent: PRwLock::new(Parent::Detached),
            static_children: PRwLock::new(FnvHashMap::default()),
            pattern_children: PRwLock::new(Vec::new()),
            wildcard_child: PRwLock::new(None),
            config: PRwLock::new(Config::default()),
            active: PRwLock::new(false),
            configured: PRwLock::new(false),
            table: PRwLock::new(None),
            receiver: PRwLock::new(None),
            passer: PRwLock::new(None),
            handler: PRwLock::new(None),
            redirect_code: PRwLock::new(None),
            redirect_handler: PRwLock::new(default_redirect_handler()),
            shared: PRwLock::new(None),
            intended_host: PRwLock::new(None),
            intended_prefix: PRwLock::new(Vec::new()),
        })
    }

    /// Construct a detached resource from a URL template such as
    /// `"/a/{id:\d+}/c/"` or `"https://example.com/a/"`.
    ///
    /// Only the last path segment becomes this responder; the host and the
    /// earlier segments are remembered and validated (or synthesized as
    /// dormant intermediates) when the responder is registered into a tree.
    pub fn new_resource(url_template: &str) -> Result<Arc<Responder>> {
        if url_template.is_empty() {
            return Err(RouterError::NilArgument("URL template"));
        }
        let parts = parse_url_template(url_template)?;
        if !parts.is_root && !parts.rooted {
            return Err(RouterError::NonRootedPath(url_template.to_string()));
        }

        if parts.is_root {
            let node = Responder::from_parts(
                ResponderKind::Resource,
                Arc::new(Template::parse("/").map_err(RouterError::Template)?),
                true,
            );
            if parts.host.is_some() {
                return Err(RouterError::RootUnderHost);
            }
            node.apply_url_flags(parts.secure, false)?;
            return Ok(node);
        }

        let Some((leaf, prefix)) = parts.segments.split_last() else {
            return Err(RouterError::NilArgument("path"));
        };
        let node = Responder::from_parts(ResponderKind::Resource, leaf.clone(), false);
        *node.intended_host.write() = parts.host.clone();
        *node.intended_prefix.write() = prefix.to_vec();
        node.apply_url_flags(parts.secure, parts.trailing_slash)?;
        Ok(node)
    }

    /// Construct a detached host from a URL template such as
    /// `"http://example.com"` or `"https://{sub:\w+}.example.com/"`.
    pub fn new_host(url_template: &str) -> Result<Arc<Responder>> {
        if url_template.is_empty() {
            return Err(RouterError::NilArgument("URL template"));
        }
        let parts = parse_url_template(url_template)?;
        let Some(host_template) = parts.host else {
            return Err(RouterError::NilArgument("host template"));
        };
        // A bare trailing '/' after the authority is fine; real path
        // segments are not.
        if !parts.segments.is_empty() {
            return Err(RouterError::HostWithPath(url_template.to_string()));
        }
        let node = Responder::from_parts(ResponderKind::Host, host_template, false);
        node.apply_url_flags(parts.secure, parts.trailing_slash)?;
        Ok(node)
    }

    fn apply_url_flags(&self, secure: bool, trailing_slash: bool) -> Result<()> {
        let mut cfg = self.config.write();
        cfg.secure |= secure;
        cfg.trailing_slash |= trailing_slash;
        drop(cfg);
        *self.configured.write() = true;
        Ok(())
    }

    pub fn kind(&self) -> ResponderKind {
        self.kind
    }

    pub fn is_host(&self) -> bool {
        self.kind == ResponderKind::Host
    }

    pub(crate) fn is_root(&self) -> bool {
        self.is_root
    }

    pub(crate) fn intended_host(&self) -> Option<Arc<Template>> {
        self.intended_host.read().clone()
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// A copy of the current configuration flags.
    pub fn configuration(&self) -> Config {
        *self.config.read()
    }

    /// OR-in configuration flags; flags never clear once set. Requesting
    /// `redirect_insecure` here upgrades the responder to `secure` as well.
    /// Counts as an explicit configuration call, so the responder activates.
    pub fn set_configuration(&self, mut config: Config) {
        if config.redirect_insecure {
            config.secure = true;
        }
        self.config.write().merge(&config);
        *self.configured.write() = true;
        *self.active.write() = true;
    }

    pub(crate) fn is_configured(&self) -> bool {
        *self.configured.read()
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub(crate) fn activate(&self) {
        *self.active.write() = true;
    }

    pub fn is_subtree_handler(&self) -> bool {
        self.config.read().subtree_handler
    }

    /// Register a handler for a space/comma-separated method list (or the
    /// `"!"` not-allowed slot). The first handler activates the responder.
    pub fn set_handler(self: &Arc<Self>, methods: &str, handler: impl Handler) -> Result<()> {
        let mut guard = self.table.write();
        let table = guard.get_or_insert_with(MethodTable::new);
        table.set_handler(methods, Arc::new(handler))?;
        drop(guard);
        self.activate();
        Ok(())
    }

    /// Wrap the handlers of the named methods (`"!"`, `"*"` supported) with
    /// middleware applied in the given order.
    pub fn wrap_handler_of(
        self: &Arc<Self>,
        methods: &str,
        middlewares: &[Arc<dyn Middleware>],
    ) -> Result<()> {
        let mut guard = self.table.write();
        let Some(table) = guard.as_mut() else {
            return Err(RouterError::NoHandlerFor(methods.to_string()));
        };
        table.wrap_handler_of(methods, middlewares)
    }

    /// Whether any method handler table exists; without one the responder is
    /// dormant and terminal requests to it fall through as 404.
    pub(crate) fn has_handlers(&self) -> bool {
        self.table.read().is_some()
    }

    pub(crate) fn method_dispatch(&self, method: &http::Method) -> Option<ArcHandler> {
        self.table.read().as_ref().map(|t| t.dispatch_handler(method))
    }

    /// Attach opaque shared data handed to handlers through the context.
    pub fn set_shared_data(&self, data: impl Any + Send + Sync) {
        *self.shared.write() = Some(Arc::new(data));
    }

    pub fn shared_data(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.shared.read().clone()
    }

    /// Override the permanent-redirect code of this responder; only 301 and
    /// 308 qualify as permanent.
    pub fn set_permanent_redirect_code(&self, code: StatusCode) -> Result<()> {
        match code {
            StatusCode::MOVED_PERMANENTLY | StatusCode::PERMANENT_REDIRECT => {
                *self.redirect_code.write() = Some(code);
                Ok(())
            }
            other => Err(RouterError::UnsupportedRedirectCode(other.as_u16())),
        }
    }

    pub(crate) fn permanent_redirect_code(&self, tree_default: StatusCode) -> StatusCode {
        (*self.redirect_code.read()).unwrap_or(tree_default)
    }

    /// Replace the redirect hook of this responder.
    pub fn set_redirect_handler(&self, handler: impl RedirectHandler) {
        *self.redirect_handler.write() = Arc::new(handler);
    }

    /// Wrap the redirect hook; middleware applies in the given order.
    pub fn wrap_redirect_handler(&self, middlewares: &[Arc<dyn RedirectMiddleware>]) {
        let mut guard = self.redirect_handler.write();
        let wrapped = middlewares
            .iter()
            .fold(guard.clone(), |inner, mw| mw.wrap(inner));
        *guard = wrapped;
    }

    pub(crate) fn redirect_handler(&self) -> ArcRedirectHandler {
        self.redirect_handler.read().clone()
    }

    /// Replace the request receiver with a redirector: neither the passer
    /// nor the handler runs, and the unmatched tail of the request path is
    /// appended to `url` with exactly one `/` at the boundary.
    pub fn redirect_any_request_to(self: &Arc<Self>, url: &str, code: StatusCode) -> Result<()> {
        if url.is_empty() {
            return Err(RouterError::NilArgument("redirect URL"));
        }
        if !(300..=399).contains(&code.as_u16()) {
            return Err(RouterError::NonRedirectCode(code.as_u16()));
        }
        let base = url.trim_end_matches('/').to_string();
        let redirector: ArcHandler = Arc::new(move |mut ctx: RouteCtx| {
            let base = base.clone();
            async move {
                let target = format!("{}{}", base, ctx.state.tail_from_cursor());
                ctx.set_status(code);
                ctx.set_header(http::header::LOCATION, &target);
                ctx.mark_handled();
                ctx
            }
        });
        *self.receiver.write() = Some(redirector);
        self.activate();
        Ok(())
    }

    /// Wrap the request receiver, the outermost chain of this responder.
    pub fn wrap_request_receiver(self: &Arc<Self>, middlewares: &[Arc<dyn Middleware>]) {
        let inner = self
            .receiver
            .read()
            .clone()
            .unwrap_or_else(|| default_receiver(self));
        *self.receiver.write() = Some(wrap_in_order(inner, middlewares));
    }

    /// Wrap the request passer, the chain that walks into children.
    pub fn wrap_request_passer(self: &Arc<Self>, middlewares: &[Arc<dyn Middleware>]) {
        let inner = self
            .passer
            .read()
            .clone()
            .unwrap_or_else(|| default_passer(self));
        *self.passer.write() = Some(wrap_in_order(inner, middlewares));
    }

    /// Wrap the request handler, the chain in front of the method table.
    pub fn wrap_request_handler(self: &Arc<Self>, middlewares: &[Arc<dyn Middleware>]) {
        let inner = self
            .handler
            .read()
            .clone()
            .unwrap_or_else(|| default_method_handler(self));
        *self.handler.write() = Some(wrap_in_order(inner, middlewares));
    }

    pub(crate) fn request_passer(&self) -> Option<ArcHandler> {
        self.passer.read().clone()
    }

    pub(crate) fn request_handler_override(&self) -> Option<ArcHandler> {
        self.handler.read().clone()
    }

    /// Enter this responder: its (possibly wrapped) receiver, or the
    /// built-in handle-or-pass machine.
    pub(crate) fn invoke_receiver(self: &Arc<Self>, ctx: RouteCtx) -> BoxFuture<RouteCtx> {
        let receiver = self.receiver.read().clone();
        match receiver {
            Some(h) => h.handle(ctx),
            None => dispatch::handle_or_pass(self.clone(), ctx),
        }
    }

    pub(crate) fn find_static_child(&self, literal: &str) -> Option<Arc<Responder>> {
        self.static_children.read().get(literal).cloned()
    }

    pub(crate) fn pattern_children_snapshot(&self) -> Vec<Arc<Responder>> {
        self.pattern_children.read().clone()
    }

    pub(crate) fn wildcard_child(&self) -> Option<Arc<Responder>> {
        self.wildcard_child.read().clone()
    }

    pub(crate) fn set_parent(&self, parent: Parent) {
        *self.parent.write() = parent;
    }

    pub(crate) fn parent_responder(&self) -> Option<Arc<Responder>> {
        match &*self.parent.read() {
            Parent::Responder(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// The nearest host above (or including) this responder.
    pub(crate) fn nearest_host(self: &Arc<Self>) -> Option<Arc<Responder>> {
        let mut current = self.clone();
        loop {
            if current.is_host() {
                return Some(current);
            }
            match current.parent_responder() {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Render the full URL of this responder, substituting `values` into
    /// every template on the chain. Produces `scheme://host/path...` when a
    /// host is on the chain, a rooted path otherwise.
    pub fn url(self: &Arc<Self>, values: &[(&str, &str)]) -> Result<String> {
        self.build_url(|t| t.apply(values, false).map_err(RouterError::Template))
    }

    /// Render the canonical URL template of this responder's chain.
    pub fn url_template(self: &Arc<Self>) -> String {
        self.build_url(|t| Ok(t.render()))
            .unwrap_or_default()
    }

    fn build_url(
        self: &Arc<Self>,
        mut render: impl FnMut(&Template) -> Result<String>,
    ) -> Result<String> {
        let mut segments: Vec<String> = Vec::new();
        let mut host: Option<String> = None;
        let mut current = self.clone();
        loop {
            if current.is_host() {
                host = Some(render(current.template())?);
                break;
            }
            if !current.is_root() {
                segments.push(render(current.template())?);
            }
            match current.parent_responder() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();

        let cfg = self.configuration();
        let mut path = String::new();
        for s in &segments {
            path.push('/');
            path.push_str(s);
        }
        if path.is_empty() {
            path.push('/');
        } else if cfg.trailing_slash {
            path.push('/');
        }

        Ok(match host {
            Some(h) => {
                let scheme = if cfg.secure { "https" } else { "http" };
                format!("{}://{}{}", scheme, h, path)
            }
            None => path,
        })
    }
}

// The built-in receiver: the handle-or-pass state machine on this node.
fn default_receiver(node: &Arc<Responder>) -> ArcHandler {
    let weak = Arc::downgrade(node);
    Arc::new(move |ctx: RouteCtx| -> BoxFuture<RouteCtx> {
        match weak.upgrade() {
            Some(node) => dispatch::handle_or_pass(node, ctx),
            None => Box::pin(std::future::ready(ctx)),
        }
    })
}

// The built-in passer: match the next segment against the child buckets.
fn default_passer(node: &Arc<Responder>) -> ArcHandler {
    let weak = Arc::downgrade(node);
    Arc::new(move |ctx: RouteCtx| -> BoxFuture<RouteCtx> {
        match weak.upgrade() {
            Some(node) => dispatch::pass_request(node, ctx),
            None => Box::pin(std::future::ready(ctx)),
        }
    })
}

// The built-in handler: dispatch on the method table.
fn default_method_handler(node: &Arc<Responder>) -> ArcHandler {
    let weak = Arc::downgrade(node);
    Arc::new(move |ctx: RouteCtx| -> BoxFuture<RouteCtx> {
        match weak.upgrade() {
            Some(node) => Box::pin(dispatch::invoke_method(node, ctx)),
            None => Box::pin(std::future::ready(ctx)),
        }
    })
}
