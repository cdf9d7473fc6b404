//! The router: the tree's top level.
//!
//! Selects the responding host by the request authority — static hosts
//! first, then pattern hosts in registration order — and falls back to the
//! root resource. Carries the tree-wide default permanent-redirect code and
//! the replaceable not-found responder.

use std::sync::Arc;

use bytes::Bytes;
use fnv::FnvHashMap;
use http::{Request, Response, StatusCode};
use tracing::trace;

use crate::alias::PRwLock;
use crate::ctx::RouteCtx;
use crate::error::{Result, RouterError};
use crate::handler::{ArcHandler, Handler, Middleware, default_not_found_handler, wrap_in_order};
use crate::resource::{Config, Parent, Responder, ResponderKind, merge_detached, parse_url_template};
use crate::template::{Similarity, Template, TemplateKind};

/// A tree-structured request multiplexer.
pub struct Router {
    static_hosts: PRwLock<FnvHashMap<String, Arc<Responder>>>,
    pattern_hosts: PRwLock<Vec<Arc<Responder>>>,
    root: PRwLock<Option<Arc<Responder>>>,
    not_found: PRwLock<ArcHandler>,
    permanent_code: PRwLock<StatusCode>,
}

impl Router {
    pub fn new() -> Router {
        Router {
            static_hosts: PRwLock::new(FnvHashMap::default()),
            pattern_hosts: PRwLock::new(Vec::new()),
            root: PRwLock::new(None),
            not_found: PRwLock::new(default_not_found_handler()),
            permanent_code: PRwLock::new(StatusCode::PERMANENT_REDIRECT),
        }
    }

    /// Find or create the host responder for a URL template such as
    /// `"http://example.com"`. The template may not carry path segments and
    /// may not be a pure wildcard.
    pub fn host(&self, url_template: &str) -> Result<Arc<Responder>> {
        if url_template.is_empty() {
            return Err(RouterError::NilArgument("URL template"));
        }
        let parts = parse_url_template(url_template)?;
        let Some(template) = parts.host else {
            return Err(RouterError::NilArgument("host template"));
        };
        if !parts.segments.is_empty() {
            return Err(RouterError::HostWithPath(url_template.to_string()));
        }
        self.host_node(template, Some(parts.secure))
    }

    /// Find or create the resource addressed by `url`, which may be a bare
    /// rooted path, a scheme-qualified path (`"https:///a/"`), or a full
    /// URL naming a host.
    pub fn resource(&self, url: &str) -> Result<Arc<Responder>> {
        self.resource_with(url, None)
    }

    /// Like [`Router::resource`], applying `config` to the leaf.
    pub fn resource_using_config(&self, url: &str, config: Config) -> Result<Arc<Responder>> {
        self.resource_with(url, Some(config))
    }

    fn resource_with(&self, url: &str, config: Option<Config>) -> Result<Arc<Responder>> {
        if url.is_empty() {
            return Err(RouterError::NilArgument("URL template"));
        }

        let (scheme, has_scheme, rest) = if let Some(r) = url.strip_prefix("https://") {
            ("https://", true, r)
        } else if let Some(r) = url.strip_prefix("http://") {
            ("http://", true, r)
        } else {
            ("", false, url)
        };
        let (host_text, path_text) = if has_scheme {
            match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            }
        } else {
            ("", rest)
        };

        let start = if host_text.is_empty() {
            None
        } else {
            let template = Template::parse(host_text)?;
            Some(self.host_node(Arc::new(template), None)?)
        };

        if path_text == "/" {
            return match start {
                Some(_) => Err(RouterError::RootUnderHost),
                None => {
                    let root = self.root_or_create()?;
                    if let Some(cfg) = config {
                        root.set_configuration(cfg);
                    }
                    Ok(root)
                }
            };
        }
        if path_text.is_empty() {
            return Err(RouterError::NilArgument("path"));
        }

        // Hand the scheme through so the leaf still picks up `secure`.
        let forwarded = if has_scheme {
            format!("{}{}", scheme, path_text)
        } else {
            path_text.to_string()
        };
        let start = match start {
            Some(host) => host,
            None => self.root_or_create()?,
        };
        match config {
            Some(cfg) => start.resource_using_config(&forwarded, cfg),
            None => start.resource(&forwarded),
        }
    }

    /// Graft a detached responder into the tree: hosts at the router, a root
    /// resource into the root slot (merging with an existing one), and
    /// anything else below its intended host or the root resource.
    pub fn register_resource(&self, new: Arc<Responder>) -> Result<()> {
        if new.is_host() {
            return self.register_host(new);
        }
        if new.is_root() {
            let merged = match self.root.read().clone() {
                Some(existing) => merge_detached(existing, new)?,
                None => new,
            };
            merged.set_parent(Parent::Router);
            *self.root.write() = Some(merged);
            return Ok(());
        }

        let target = match new.intended_host() {
            Some(host_template) => self.host_node(host_template, None)?,
            None => self.root_or_create()?,
        };
        target.register_resource(new)
    }

    fn register_host(&self, host: Arc<Responder>) -> Result<()> {
        let survivor = match self.find_host_like(host.template())? {
            Some(existing) => merge_detached(existing, host)?,
            None => host,
        };
        survivor.set_parent(Parent::Router);
        self.store_host(survivor);
        Ok(())
    }

    /// Look up an already-registered resource by URL; `$name` segments are
    /// resolved by template name. Never creates nodes.
    pub fn registered_resource(&self, url: &str) -> Result<Arc<Responder>> {
        if url.is_empty() {
            return Err(RouterError::NilArgument("URL template"));
        }
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        let has_scheme = rest.len() != url.len();
        let (host_text, path_text) = if has_scheme {
            match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            }
        } else {
            ("", rest)
        };

        if host_text.is_empty() {
            let Some(root) = self.root.read().clone() else {
                return Err(RouterError::NoSuchResource(url.to_string()));
            };
            if path_text == "/" {
                return Ok(root);
            }
            return root.registered_resource(path_text);
        }

        let template = Template::parse(host_text)?;
        let Some(host) = self.find_host_like(&template)? else {
            return Err(RouterError::NoSuchResource(url.to_string()));
        };
        if path_text.is_empty() || path_text == "/" {
            return Ok(host);
        }
        host.registered_resource(path_text)
    }

    /// The tree-wide default code for permanent redirects; 301 or 308.
    pub fn set_permanent_redirect_code(&self, code: StatusCode) -> Result<()> {
        match code {
            StatusCode::MOVED_PERMANENTLY | StatusCode::PERMANENT_REDIRECT => {
                *self.permanent_code.write() = code;
                Ok(())
            }
            other => Err(RouterError::UnsupportedRedirectCode(other.as_u16())),
        }
    }

    pub fn permanent_redirect_code(&self) -> StatusCode {
        *self.permanent_code.read()
    }

    /// Replace the not-found responder used whenever nothing handles a
    /// request.
    pub fn set_not_found_handler(&self, handler: impl Handler) {
        *self.not_found.write() = Arc::new(handler);
    }

    /// Wrap the not-found responder; middleware applies in the given order.
    pub fn wrap_not_found_handler(&self, middlewares: &[Arc<dyn Middleware>]) {
        let mut guard = self.not_found.write();
        *guard = wrap_in_order(guard.clone(), middlewares);
    }

    /// Dispatch one request through the tree and return the response.
    ///
    /// `secure_connection` tells the router whether the request arrived over
    /// TLS; the core itself never touches sockets. Safe to call from any
    /// number of tasks concurrently once construction is over.
    pub async fn route(&self, request: Request<Bytes>, secure_connection: bool) -> Response<Bytes> {
        let mut ctx = RouteCtx::new(request, secure_connection);
        ctx.state.permanent_code = *self.permanent_code.read();
        ctx.state.not_found = self.not_found.read().clone();

        let host_name = ctx.host().to_string();
        let mut target = None;
        if !host_name.is_empty() {
            target = self.static_hosts.read().get(&host_name).cloned();
            if target.is_none() {
                for host in self.pattern_hosts.read().iter() {
                    if host
                        .template()
                        .match_segment(&host_name, &mut ctx.state.captures)
                    {
                        target = Some(host.clone());
                        break;
                    }
                }
            }
        }
        let target = target.or_else(|| self.root.read().clone());

        let mut ctx = match target {
            Some(node) => {
                trace!(host = %host_name, path = %ctx.path(), "dispatching");
                node.invoke_receiver(ctx).await
            }
            None => ctx,
        };

        if !ctx.handled() {
            let not_found = ctx.state.not_found.clone();
            ctx = not_found.handle(ctx).await;
        }
        ctx.response
    }

    fn root_or_create(&self) -> Result<Arc<Responder>> {
        if let Some(root) = self.root.read().clone() {
            return Ok(root);
        }
        let template = Template::parse("/").map_err(RouterError::Template)?;
        let node = Responder::from_parts(ResponderKind::Resource, Arc::new(template), true);
        node.set_parent(Parent::Router);
        *self.root.write() = Some(node.clone());
        Ok(node)
    }

    // Find or create a host node for an already-parsed template.
    // `enforce_secure` is set when the caller is registering the host itself
    // (its scheme is binding); `None` when merely passing through.
    fn host_node(
        &self,
        template: Arc<Template>,
        enforce_secure: Option<bool>,
    ) -> Result<Arc<Responder>> {
        if template.is_wildcard() {
            return Err(RouterError::WildcardHost(template.render()));
        }

        if let Some(existing) = self.find_host_like(&template)? {
            if let Some(secure) = enforce_secure {
                if existing.is_configured() && existing.configuration().secure != secure {
                    return Err(RouterError::ConfigConflict {
                        template: template.render(),
                        field: "secure",
                    });
                }
                if secure {
                    existing.merge_config(&Config {
                        secure: true,
                        ..Config::default()
                    });
                }
                existing.set_configured();
            }
            return Ok(existing);
        }

        let node = Responder::from_parts(ResponderKind::Host, template, false);
        if let Some(secure) = enforce_secure {
            node.merge_config(&Config {
                secure,
                ..Config::default()
            });
            node.set_configured();
        }
        node.set_parent(Parent::Router);
        self.store_host(node.clone());
        Ok(node)
    }

    fn find_host_like(&self, template: &Template) -> Result<Option<Arc<Responder>>> {
        if template.kind() == TemplateKind::Static {
            let key = template.literal().unwrap_or_default().to_ascii_lowercase();
            match self.static_hosts.read().get(&key) {
                Some(existing) => match existing.template().similarity(template) {
                    Similarity::TheSame => Ok(Some(existing.clone())),
                    Similarity::DifferentValueNames => {
                        Err(RouterError::ValueNameConflict(template.render()))
                    }
                    _ => Err(RouterError::TemplateNameConflict(template.render())),
                },
                None => Ok(None),
            }
        } else {
            for existing in self.pattern_hosts.read().iter() {
                match existing.template().similarity(template) {
                    Similarity::TheSame => return Ok(Some(existing.clone())),
                    Similarity::DifferentValueNames => {
                        return Err(RouterError::ValueNameConflict(template.render()));
                    }
                    Similarity::DifferentNames => {
                        return Err(RouterError::TemplateNameConflict(template.render()));
                    }
                    Similarity::Different => {}
                }
            }
            Ok(None)
        }
    }

    fn store_host(&self, host: Arc<Responder>) {
        if host.template().kind() == TemplateKind::Static {
            let key = host
                .template()
                .literal()
                .unwrap_or_default()
                .to_ascii_lowercase();
            self.static_hosts.write().insert(key, host);
        } else {
            let mut guard = self.pattern_hosts.write();
            match guard
                .iter_mut()
                .find(|h| h.template().similarity(host.template()) == Similarity::TheSame)
            {
                Some(slot) => *slot = host,
                None => guard.push(host),
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Router::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::RouteCtx;
    use http::header;

    fn request(method: &str, uri: &str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn echo(tag: &'static str) -> impl Handler {
        move |mut ctx: RouteCtx| async move {
            ctx.respond(StatusCode::OK, tag);
            ctx
        }
    }

    #[tokio::test]
    async fn static_host_selection() {
        let router = Router::new();
        router
            .host("http://example.com")
            .unwrap()
            .resource("/hello")
            .unwrap()
            .set_handler("GET", echo("example"))
            .unwrap();

        let res = router
            .route(request("GET", "http://example.com/hello"), false)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"example");

        let res = router
            .route(request("GET", "http://unknown.example/hello"), false)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn host_ports_are_stripped() {
        let router = Router::new();
        router
            .host("http://example.com")
            .unwrap()
            .resource("/hello")
            .unwrap()
            .set_handler("GET", echo("ok"))
            .unwrap();

        let req = Request::builder()
            .method("GET")
            .uri("/hello")
            .header(header::HOST, "example.com:8080")
            .body(Bytes::new())
            .unwrap();
        let res = router.route(req, false).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn pattern_hosts_match_in_order_and_capture() {
        let router = Router::new();
        router
            .host("http://{sub:[a-z]+}.example.com")
            .unwrap()
            .resource("/hello")
            .unwrap()
            .set_handler("GET", |mut ctx: RouteCtx| async move {
                let sub = ctx.capture("sub").unwrap_or("?").to_string();
                ctx.respond(StatusCode::OK, format!("sub {}", sub));
                ctx
            })
            .unwrap();

        let res = router
            .route(request("GET", "http://blog.example.com/hello"), false)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"sub blog");
    }

    #[tokio::test]
    async fn static_hosts_win_over_pattern_hosts() {
        let router = Router::new();
        router
            .host("http://{sub:[a-z]+}.example.com")
            .unwrap()
            .resource("/x")
            .unwrap()
            .set_handler("GET", echo("pattern"))
            .unwrap();
        router
            .host("http://api.example.com")
            .unwrap()
            .resource("/x")
            .unwrap()
            .set_handler("GET", echo("static"))
            .unwrap();

        let res = router
            .route(request("GET", "http://api.example.com/x"), false)
            .await;
        assert_eq!(res.body().as_ref(), b"static");
    }

    #[tokio::test]
    async fn root_resource_serves_unmatched_hosts() {
        let router = Router::new();
        router
            .resource("/hello")
            .unwrap()
            .set_handler("GET", echo("root"))
            .unwrap();

        let res = router
            .route(request("GET", "http://anything.example/hello"), false)
            .await;
        assert_eq!(res.body().as_ref(), b"root");
    }

    #[tokio::test]
    async fn root_itself_is_addressable() {
        let router = Router::new();
        router
            .resource("/")
            .unwrap()
            .set_handler("GET", echo("home"))
            .unwrap();

        let res = router.route(request("GET", "/"), false).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"home");
    }

    #[test]
    fn wildcard_hosts_are_rejected() {
        let router = Router::new();
        assert!(matches!(
            router.host("http://{anything}"),
            Err(RouterError::WildcardHost(_))
        ));
    }

    #[test]
    fn host_urls_with_paths_are_rejected() {
        let router = Router::new();
        assert!(matches!(
            router.host("http://example.com/path"),
            Err(RouterError::HostWithPath(_))
        ));
    }

    #[test]
    fn host_scheme_disagreement_conflicts() {
        let router = Router::new();
        router.host("http://example.com").unwrap();
        assert!(matches!(
            router.host("https://example.com"),
            Err(RouterError::ConfigConflict { field: "secure", .. })
        ));
    }

    #[test]
    fn full_urls_register_under_their_host() {
        let router = Router::new();
        let leaf = router.resource("http://example.com/blogs/{title}").unwrap();
        let host = router.host("http://example.com").unwrap();
        assert!(Arc::ptr_eq(
            &leaf,
            &host.registered_resource("/blogs/{title}").unwrap()
        ));
        assert!(Arc::ptr_eq(
            &leaf,
            &router
                .registered_resource("http://example.com/blogs/$title")
                .unwrap()
        ));
    }

    #[test]
    fn grafting_a_detached_root_merges() {
        let router = Router::new();
        router.resource("/a").unwrap();

        let root = Responder::new_resource("/").unwrap();
        root.set_handler("GET", echo("root")).unwrap();
        router.register_resource(root).unwrap();

        let merged = router.resource("/").unwrap();
        assert!(merged.has_handlers());
        assert!(router.registered_resource("/a").is_ok());
    }

    #[test]
    fn hosted_detached_resources_find_their_host() {
        let router = Router::new();
        let detached = Responder::new_resource("http://example.com/a/b").unwrap();
        router.register_resource(detached).unwrap();
        assert!(router.registered_resource("http://example.com/a/b").is_ok());
    }

    #[test]
    fn permanent_redirect_code_is_validated() {
        let router = Router::new();
        assert!(router.set_permanent_redirect_code(StatusCode::MOVED_PERMANENTLY).is_ok());
        assert_eq!(router.permanent_redirect_code(), StatusCode::MOVED_PERMANENTLY);
        assert!(matches!(
            router.set_permanent_redirect_code(StatusCode::FOUND),
            Err(RouterError::UnsupportedRedirectCode(302))
        ));
    }

    #[tokio::test]
    async fn not_found_handler_is_replaceable() {
        let router = Router::new();
        router.set_not_found_handler(|mut ctx: RouteCtx| async move {
            ctx.respond(StatusCode::NOT_FOUND, "custom miss");
            ctx
        });
        let res = router.route(request("GET", "/nowhere"), false).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"custom miss");
    }
}
