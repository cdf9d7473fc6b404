//! Tree construction: URL-template parsing, child insertion, collision
//! handling and subtree grafting.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use super::{Config, Parent, Responder, ResponderKind};
use crate::debug_log;
use crate::error::{Result, RouterError};
use crate::template::{Similarity, Template, TemplateKind};

/// A URL template broken into its parts.
pub(crate) struct UrlParts {
    /// `https://` was written.
    pub secure: bool,
    /// Any scheme was written (so `secure == false` means explicit http).
    pub has_scheme: bool,
    pub host: Option<Arc<Template>>,
    pub segments: Vec<Arc<Template>>,
    pub trailing_slash: bool,
    /// The path was exactly `/`.
    pub is_root: bool,
    /// The path started with `/`.
    pub rooted: bool,
}

/// Split a URL template into scheme, host template and path-segment
/// templates. Empty interior segments are structural errors; the leading and
/// trailing slash only carry rooting and trailing-slash information.
pub(crate) fn parse_url_template(text: &str) -> Result<UrlParts> {
    let (secure, has_scheme, rest) = if let Some(r) = text.strip_prefix("https://") {
        (true, true, r)
    } else if let Some(r) = text.strip_prefix("http://") {
        (false, true, r)
    } else {
        (false, false, text)
    };

    let (host_text, path_text) = if has_scheme {
        match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        }
    } else {
        ("", rest)
    };

    let host = if host_text.is_empty() {
        None
    } else {
        let template = Template::parse(host_text)?;
        if template.is_wildcard() {
            return Err(RouterError::WildcardHost(host_text.to_string()));
        }
        Some(Arc::new(template))
    };

    if path_text.is_empty() {
        return Ok(UrlParts {
            secure,
            has_scheme,
            host,
            segments: Vec::new(),
            trailing_slash: false,
            is_root: false,
            rooted: false,
        });
    }

    let rooted = path_text.starts_with('/');
    let body = if rooted { &path_text[1..] } else { path_text };
    if body.is_empty() {
        return Ok(UrlParts {
            secure,
            has_scheme,
            host,
            segments: Vec::new(),
            trailing_slash: false,
            is_root: true,
            rooted,
        });
    }

    let trailing_slash = body.ends_with('/');
    let body = body.strip_suffix('/').unwrap_or(body);

    let mut segments = Vec::new();
    for segment in body.split('/') {
        if segment.is_empty() {
            return Err(RouterError::EmptySegment(text.to_string()));
        }
        segments.push(Arc::new(Template::parse(segment)?));
    }

    Ok(UrlParts {
        secure,
        has_scheme,
        host,
        segments,
        trailing_slash,
        is_root: false,
        rooted,
    })
}

// What the last path segment of a registration carries.
struct LeafSpec {
    secure: bool,
    has_scheme: bool,
    trailing_slash: bool,
    config: Option<Config>,
}

impl Responder {
    /// Find or create the resource addressed by `path` below this responder.
    ///
    /// From a host or the root resource the path must be rooted
    /// (`"/a/{b:\d+}/"`); from any other resource it must be relative.
    /// Intermediate resources spring into existence dormant; only the last
    /// segment picks up the URL-derived `secure`/`trailing_slash` flags.
    pub fn resource(self: &Arc<Self>, path: &str) -> Result<Arc<Responder>> {
        self.resource_with(path, None)
    }

    /// Like [`Responder::resource`], applying `config` to the leaf. The leaf
    /// activates, as with any explicit configuration.
    pub fn resource_using_config(
        self: &Arc<Self>,
        path: &str,
        config: Config,
    ) -> Result<Arc<Responder>> {
        self.resource_with(path, Some(config))
    }

    fn resource_with(self: &Arc<Self>, path: &str, config: Option<Config>) -> Result<Arc<Responder>> {
        if path.is_empty() {
            return Err(RouterError::NilArgument("path"));
        }
        let parts = parse_url_template(path)?;

        if let Some(host_template) = &parts.host {
            let Some(host) = self.nearest_host() else {
                return Err(RouterError::PathConflict {
                    expected: "no host".to_string(),
                    found: host_template.render(),
                });
            };
            if host.template().similarity(host_template) != Similarity::TheSame {
                return Err(RouterError::PathConflict {
                    expected: host.template().render(),
                    found: host_template.render(),
                });
            }
        }
        if parts.is_root {
            return Err(RouterError::RootUnderHost);
        }

        let wants_rooted = self.is_host() || self.is_root();
        if wants_rooted && !parts.rooted {
            return Err(RouterError::NonRootedPath(path.to_string()));
        }
        if !wants_rooted && parts.rooted {
            return Err(RouterError::RootedSubPath(path.to_string()));
        }
        if parts.segments.is_empty() {
            return Err(RouterError::NilArgument("path"));
        }

        let leaf = LeafSpec {
            secure: parts.secure,
            has_scheme: parts.has_scheme,
            trailing_slash: parts.trailing_slash,
            config,
        };
        resolve_under(self, &parts.segments, leaf)
    }

    /// Graft a detached responder (with everything registered below it) into
    /// the tree under this one.
    ///
    /// The host and path-prefix templates the responder was constructed with
    /// are validated against the actual ancestor chain; the unmatched suffix
    /// of the prefix becomes a run of dormant intermediate resources.
    pub fn register_resource(self: &Arc<Self>, new: Arc<Responder>) -> Result<()> {
        if new.is_root() {
            return Err(RouterError::RootUnderHost);
        }
        if new.is_host() {
            return Err(RouterError::MisplacedHost(new.template().render()));
        }
        if !matches!(*new.parent.read(), Parent::Detached) {
            return Err(RouterError::AlreadyRegistered(new.template().render()));
        }

        if let Some(host_template) = new.intended_host.read().clone() {
            match self.nearest_host() {
                Some(host)
                    if host.template().similarity(&host_template) == Similarity::TheSame => {}
                Some(host) => {
                    return Err(RouterError::PathConflict {
                        expected: host.template().render(),
                        found: host_template.render(),
                    });
                }
                None => {
                    return Err(RouterError::PathConflict {
                        expected: "no host".to_string(),
                        found: host_template.render(),
                    });
                }
            }
        }

        let chain = self.path_chain();
        let prefix = new.intended_prefix.read().clone();
        if prefix.len() < chain.len() {
            return Err(RouterError::PathConflict {
                expected: self.url_template(),
                found: new.template().render(),
            });
        }
        for (have, want) in chain.iter().zip(prefix.iter()) {
            if have.similarity(want) != Similarity::TheSame {
                return Err(RouterError::PathConflict {
                    expected: have.render(),
                    found: want.render(),
                });
            }
        }

        let mut target = self.clone();
        for template in &prefix[chain.len()..] {
            target = get_or_create_child(&target, template)?;
        }
        insert_child(&target, new)?;
        Ok(())
    }

    /// Look up an already-registered resource. A path segment of the form
    /// `$name` addresses the child whose template carries that name; full
    /// segment templates are compared by similarity. Never creates nodes.
    pub fn registered_resource(self: &Arc<Self>, path: &str) -> Result<Arc<Responder>> {
        if path.is_empty() {
            return Err(RouterError::NilArgument("path"));
        }
        let rooted = path.starts_with('/');
        let wants_rooted = self.is_host() || self.is_root();
        if wants_rooted && !rooted {
            return Err(RouterError::NonRootedPath(path.to_string()));
        }
        if !wants_rooted && rooted {
            return Err(RouterError::RootedSubPath(path.to_string()));
        }

        let body = if rooted { &path[1..] } else { path };
        let body = body.strip_suffix('/').unwrap_or(body);
        if body.is_empty() {
            return Err(RouterError::NilArgument("path"));
        }

        let mut current = self.clone();
        for segment in body.split('/') {
            if segment.is_empty() {
                return Err(RouterError::EmptySegment(path.to_string()));
            }
            let next = if let Some(name) = segment.strip_prefix('$') {
                if !segment.contains(':') && !segment.contains('{') {
                    find_child_by_name(&current, name)
                } else {
                    let template = Template::parse(segment)?;
                    find_child_like(&current, &template)?
                }
            } else {
                let template = Template::parse(segment)?;
                find_child_like(&current, &template)?
            };
            current = next.ok_or_else(|| RouterError::NoSuchResource(path.to_string()))?;
        }
        Ok(current)
    }

    // The path templates from just below the nearest host (or the root
    // resource, or the tree top) down to this responder.
    pub(crate) fn path_chain(self: &Arc<Self>) -> Vec<Arc<Template>> {
        let mut chain = Vec::new();
        let mut current = self.clone();
        loop {
            if current.is_host() || current.is_root() {
                break;
            }
            chain.push(current.template.clone());
            match current.parent_responder() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    pub(crate) fn merge_config(&self, other: &Config) {
        self.config.write().merge(other);
    }

    pub(crate) fn set_configured(&self) {
        *self.configured.write() = true;
    }
}

fn resolve_under(
    start: &Arc<Responder>,
    segments: &[Arc<Template>],
    leaf: LeafSpec,
) -> Result<Arc<Responder>> {
    let Some((leaf_template, prefix)) = segments.split_last() else {
        return Err(RouterError::NilArgument("path"));
    };
    let mut current = start.clone();
    for template in prefix {
        current = get_or_create_child(&current, template)?;
    }
    get_or_create_leaf(&current, leaf_template, leaf)
}

fn get_or_create_child(parent: &Arc<Responder>, template: &Arc<Template>) -> Result<Arc<Responder>> {
    if let Some(existing) = find_child_like(parent, template)? {
        return Ok(existing);
    }
    let node = Responder::from_parts(ResponderKind::Resource, template.clone(), false);
    insert_child(parent, node)
}

fn get_or_create_leaf(
    parent: &Arc<Responder>,
    template: &Arc<Template>,
    leaf: LeafSpec,
) -> Result<Arc<Responder>> {
    let mut flags = leaf.config.unwrap_or_default();
    flags.secure |= leaf.secure;
    flags.trailing_slash |= leaf.trailing_slash;
    if flags.redirect_insecure && !flags.secure {
        return Err(RouterError::RedirectInsecureRequiresSecure);
    }

    let node = match find_child_like(parent, template)? {
        Some(existing) => {
            let current = existing.configuration();
            if existing.is_configured() {
                if current.trailing_slash != leaf.trailing_slash {
                    return Err(RouterError::ConfigConflict {
                        template: template.render(),
                        field: "trailing_slash",
                    });
                }
                if leaf.has_scheme && current.secure != leaf.secure {
                    return Err(RouterError::ConfigConflict {
                        template: template.render(),
                        field: "secure",
                    });
                }
            }
            existing.merge_config(&flags);
            existing
        }
        None => {
            let node = Responder::from_parts(ResponderKind::Resource, template.clone(), false);
            node.merge_config(&flags);
            insert_child(parent, node)?
        }
    };

    node.set_configured();
    if leaf.config.is_some() {
        node.activate();
    }
    Ok(node)
}

// Find the child whose template occupies the same structural slot.
// `TheSame` is a hit; the two partial-similarity outcomes are construction
// conflicts; `Different` keeps scanning.
fn find_child_like(
    parent: &Arc<Responder>,
    template: &Template,
) -> Result<Option<Arc<Responder>>> {
    match template.kind() {
        TemplateKind::Static => {
            let literal = template.literal().unwrap_or_default();
            match parent.static_children.read().get(literal) {
                Some(child) => similarity_hit(child, template).transpose(),
                None => Ok(None),
            }
        }
        TemplateKind::Pattern => {
            for child in parent.pattern_children.read().iter() {
                match child.template().similarity(template) {
                    Similarity::TheSame => return Ok(Some(child.clone())),
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
        TemplateKind::Wildcard => match &*parent.wildcard_child.read() {
            Some(child) => similarity_hit(child, template).transpose(),
            None => Ok(None),
        },
    }
}

fn similarity_hit(child: &Arc<Responder>, template: &Template) -> Option<Result<Arc<Responder>>> {
    match child.template().similarity(template) {
        Similarity::TheSame => Some(Ok(child.clone())),
        Similarity::DifferentValueNames => {
            Some(Err(RouterError::ValueNameConflict(template.render())))
        }
        Similarity::DifferentNames => {
            Some(Err(RouterError::TemplateNameConflict(template.render())))
        }
        Similarity::Different => None,
    }
}

/// Link `child` under `parent`, merging when an equal template is already
/// there. Returns the surviving node.
pub(crate) fn insert_child(parent: &Arc<Responder>, child: Arc<Responder>) -> Result<Arc<Responder>> {
    if child.is_root() {
        return Err(RouterError::RootUnderHost);
    }
    if child.is_host() {
        return Err(RouterError::MisplacedHost(child.template().render()));
    }

    check_chain_uniqueness(parent, &child)?;

    let survivor = match child.template().kind() {
        TemplateKind::Static => {
            let literal = child.template().literal().unwrap_or_default().to_string();
            let existing = parent.static_children.read().get(&literal).cloned();
            match existing {
                Some(present) => match present.template().similarity(child.template()) {
                    Similarity::TheSame => merge_nodes(parent, present, child)?,
                    Similarity::DifferentValueNames => {
                        return Err(RouterError::ValueNameConflict(child.template().render()));
                    }
                    _ => {
                        return Err(RouterError::TemplateNameConflict(child.template().render()));
                    }
                },
                None => {
                    trace!(template = %child.template(), "linking static child");
                    parent
                        .static_children
                        .write()
                        .insert(literal, child.clone());
                    child
                }
            }
        }
        TemplateKind::Pattern => {
            let mut found: Option<Arc<Responder>> = None;
            for present in parent.pattern_children.read().iter() {
                match present.template().similarity(child.template()) {
                    Similarity::TheSame => {
                        found = Some(present.clone());
                        break;
                    }
                    Similarity::DifferentValueNames => {
                        return Err(RouterError::ValueNameConflict(child.template().render()));
                    }
                    Similarity::DifferentNames => {
                        return Err(RouterError::TemplateNameConflict(child.template().render()));
                    }
                    Similarity::Different => {}
                }
            }
            match found {
                Some(present) => merge_nodes(parent, present, child)?,
                None => {
                    trace!(template = %child.template(), "linking pattern child");
                    parent.pattern_children.write().push(child.clone());
                    child
                }
            }
        }
        TemplateKind::Wildcard => {
            let existing = parent.wildcard_child.read().clone();
            match existing {
                Some(present) => match present.template().similarity(child.template()) {
                    Similarity::TheSame => merge_nodes(parent, present, child)?,
                    _ => {
                        return Err(RouterError::ValueNameConflict(child.template().render()));
                    }
                },
                None => {
                    trace!(template = %child.template(), "linking wildcard child");
                    *parent.wildcard_child.write() = Some(child.clone());
                    child
                }
            }
        }
    };

    survivor.set_parent(Parent::Responder(Arc::downgrade(parent)));
    if parent.is_active() {
        survivor.activate();
    }
    Ok(survivor)
}

fn merge_nodes(
    parent: &Arc<Responder>,
    existing: Arc<Responder>,
    incoming: Arc<Responder>,
) -> Result<Arc<Responder>> {
    let survivor = merge_detached(existing, incoming)?;
    replace_child(parent, &survivor);
    Ok(survivor)
}

// Two responders claim the same template. At most one may carry handlers;
// the handler-less side donates its children and disappears.
pub(crate) fn merge_detached(
    existing: Arc<Responder>,
    incoming: Arc<Responder>,
) -> Result<Arc<Responder>> {
    let existing_has = existing.has_handlers();
    let incoming_has = incoming.has_handlers();
    if existing_has && incoming_has {
        return Err(RouterError::DuplicateTemplate(existing.template().render()));
    }

    let existing_cfg = existing.configuration();
    let incoming_cfg = incoming.configuration();
    if existing.is_active() && incoming.is_active() {
        if existing_cfg != incoming_cfg {
            return Err(RouterError::ConfigConflict {
                template: existing.template().render(),
                field: "flags",
            });
        }
    } else if existing.is_configured() && incoming.is_configured() {
        if existing_cfg.secure != incoming_cfg.secure {
            return Err(RouterError::ConfigConflict {
                template: existing.template().render(),
                field: "secure",
            });
        }
        if existing_cfg.trailing_slash != incoming_cfg.trailing_slash {
            return Err(RouterError::ConfigConflict {
                template: existing.template().render(),
                field: "trailing_slash",
            });
        }
    }

    debug_log!("Merging responders for template {}", existing.template());

    let (survivor, donor) = if incoming_has {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    transplant_children(&donor, &survivor)?;
    survivor.merge_config(&donor.configuration());
    if donor.is_configured() {
        survivor.set_configured();
    }
    if donor.is_active() {
        survivor.activate();
    }

    Ok(survivor)
}

// Move every child of `from` into `into`, merging recursively on collision.
fn transplant_children(from: &Arc<Responder>, into: &Arc<Responder>) -> Result<()> {
    let statics: Vec<Arc<Responder>> = from.static_children.write().drain().map(|(_, c)| c).collect();
    for child in statics {
        child.set_parent(Parent::Detached);
        insert_child(into, child)?;
    }
    let patterns: Vec<Arc<Responder>> = std::mem::take(&mut *from.pattern_children.write());
    for child in patterns {
        child.set_parent(Parent::Detached);
        insert_child(into, child)?;
    }
    if let Some(child) = from.wildcard_child.write().take() {
        child.set_parent(Parent::Detached);
        insert_child(into, child)?;
    }
    Ok(())
}

// Put `survivor` into the bucket slot its template belongs to, replacing
// whatever responder held that slot.
fn replace_child(parent: &Arc<Responder>, survivor: &Arc<Responder>) {
    match survivor.template().kind() {
        TemplateKind::Static => {
            let literal = survivor.template().literal().unwrap_or_default().to_string();
            parent
                .static_children
                .write()
                .insert(literal, survivor.clone());
        }
        TemplateKind::Pattern => {
            let mut guard = parent.pattern_children.write();
            match guard
                .iter_mut()
                .find(|c| c.template().similarity(survivor.template()) == Similarity::TheSame)
            {
                Some(slot) => *slot = survivor.clone(),
                None => guard.push(survivor.clone()),
            }
        }
        TemplateKind::Wildcard => {
            *parent.wildcard_child.write() = Some(survivor.clone());
        }
    }
}

// No template name and no capture value name of `child`'s subtree may repeat
// anything on the chain from `parent` up through the nearest host.
fn check_chain_uniqueness(parent: &Arc<Responder>, child: &Arc<Responder>) -> Result<()> {
    let mut chain_names: HashSet<String> = HashSet::new();
    let mut chain_values: HashSet<String> = HashSet::new();

    let mut current = Some(parent.clone());
    while let Some(node) = current {
        if let Some(name) = node.template().name() {
            chain_names.insert(name.to_string());
        }
        for value in node.template().value_names() {
            chain_values.insert(value.to_string());
        }
        if node.is_host() {
            break;
        }
        current = node.parent_responder();
    }

    check_subtree_against(child, &chain_names, &chain_values)
}

fn check_subtree_against(
    node: &Arc<Responder>,
    chain_names: &HashSet<String>,
    chain_values: &HashSet<String>,
) -> Result<()> {
    if let Some(name) = node.template().name() {
        if chain_names.contains(name) {
            return Err(RouterError::NameCollision(name.to_string()));
        }
    }
    for value in node.template().value_names() {
        if chain_values.contains(value) {
            return Err(RouterError::ValueNameCollision(value.to_string()));
        }
    }

    for child in node.static_children.read().values() {
        check_subtree_against(child, chain_names, chain_values)?;
    }
    for child in node.pattern_children.read().iter() {
        check_subtree_against(child, chain_names, chain_values)?;
    }
    if let Some(child) = &*node.wildcard_child.read() {
        check_subtree_against(child, chain_names, chain_values)?;
    }
    Ok(())
}

// Retrieval by template name across all three buckets.
fn find_child_by_name(parent: &Arc<Responder>, name: &str) -> Option<Arc<Responder>> {
    for child in parent.static_children.read().values() {
        if child.template().name() == Some(name) {
            return Some(child.clone());
        }
    }
    for child in parent.pattern_children.read().iter() {
        if child.template().name() == Some(name) {
            return Some(child.clone());
        }
    }
    if let Some(child) = &*parent.wildcard_child.read() {
        if child.template().name() == Some(name) {
            return Some(child.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::RouteCtx;

    fn noop() -> impl crate::handler::Handler {
        |ctx: RouteCtx| async move { ctx }
    }

    fn host() -> Arc<Responder> {
        Responder::new_host("http://example.com").unwrap()
    }

    #[test]
    fn resource_builds_and_finds_a_chain() {
        let host = host();
        let leaf = host.resource("/a/{b:\\d+}/c").unwrap();
        assert!(Arc::ptr_eq(
            &leaf,
            &host.registered_resource("/a/{b:\\d+}/c").unwrap()
        ));
        // Same call returns the same node instead of a new one.
        assert!(Arc::ptr_eq(&leaf, &host.resource("/a/{b:\\d+}/c").unwrap()));
    }

    #[test]
    fn dollar_name_segments_address_children_by_name() {
        let host = host();
        let leaf = host.resource("/a/{b:\\d+}/c").unwrap();
        assert!(Arc::ptr_eq(&leaf, &host.registered_resource("/a/$b/c").unwrap()));
        assert!(host.registered_resource("/a/$nope/c").is_err());
    }

    #[test]
    fn paths_below_resources_are_relative() {
        let host = host();
        let a = host.resource("/a").unwrap();
        let deep = a.resource("sub/{x}").unwrap();
        assert!(Arc::ptr_eq(&deep, &host.registered_resource("/a/sub/{x}").unwrap()));
        assert!(matches!(
            a.resource("/rooted"),
            Err(RouterError::RootedSubPath(_))
        ));
        assert!(matches!(
            host.resource("relative"),
            Err(RouterError::NonRootedPath(_))
        ));
    }

    #[test]
    fn trailing_slash_disagreement_is_a_conflict() {
        let host = host();
        host.resource("/x/").unwrap();
        assert!(matches!(
            host.resource("/x"),
            Err(RouterError::ConfigConflict { field: "trailing_slash", .. })
        ));
    }

    #[test]
    fn dormant_intermediates_adopt_flags_later() {
        let host = host();
        host.resource("/x/{y}").unwrap();
        // "x" was created as a dormant intermediate; registering "/x/" now
        // settles its trailing slash instead of conflicting.
        let x = host.resource("/x/").unwrap();
        assert!(x.configuration().trailing_slash);
    }

    #[test]
    fn explicit_scheme_disagreement_is_a_conflict() {
        let host = host();
        host.resource("https:///x").unwrap();
        assert!(matches!(
            host.resource("http:///x"),
            Err(RouterError::ConfigConflict { field: "secure", .. })
        ));
        // A schemeless path stays neutral.
        assert!(host.resource("/x").is_ok());
    }

    #[test]
    fn value_name_reuse_along_a_chain_is_rejected() {
        let host = host();
        assert!(matches!(
            host.resource("/{id:\\d+}/x/{id:\\d+}"),
            Err(RouterError::ValueNameCollision(_))
        ));
    }

    #[test]
    fn template_name_reuse_along_a_chain_is_rejected() {
        let host = host();
        assert!(matches!(
            host.resource("/$n:a/$n:b"),
            Err(RouterError::NameCollision(_))
        ));
    }

    #[test]
    fn same_shape_different_value_names_conflict() {
        let host = host();
        host.resource("/{id:\\d+}").unwrap();
        assert!(matches!(
            host.resource("/{num:\\d+}"),
            Err(RouterError::ValueNameConflict(_))
        ));
    }

    #[test]
    fn same_static_different_template_names_conflict() {
        let host = host();
        host.resource("/about").unwrap();
        assert!(matches!(
            host.resource("/$info:about"),
            Err(RouterError::TemplateNameConflict(_))
        ));
    }

    #[test]
    fn different_patterns_coexist_in_registration_order() {
        let host = host();
        let digits = host.resource("/{id:\\d+}").unwrap();
        let words = host.resource("/{slug:[a-z]+}").unwrap();
        let order = host.pattern_children.read().clone();
        assert_eq!(order.len(), 2);
        assert!(Arc::ptr_eq(&order[0], &digits));
        assert!(Arc::ptr_eq(&order[1], &words));
    }

    #[test]
    fn two_wildcard_children_with_different_names_conflict() {
        let host = host();
        host.resource("/{rest}").unwrap();
        assert!(matches!(
            host.resource("/{tail}"),
            Err(RouterError::ValueNameConflict(_))
        ));
    }

    #[test]
    fn grafting_merges_with_a_dormant_twin() {
        let host = host();
        host.resource("/a/b").unwrap();

        let detached = Responder::new_resource("/a/b").unwrap();
        detached.set_handler("GET", noop()).unwrap();
        host.register_resource(detached.clone()).unwrap();

        let resolved = host.registered_resource("/a/b").unwrap();
        assert!(Arc::ptr_eq(&resolved, &detached));
        assert!(resolved.has_handlers());
    }

    #[test]
    fn grafting_keeps_the_children_of_the_dormant_twin() {
        let host = host();
        host.resource("/a/b/old").unwrap();

        let detached = Responder::new_resource("/a/b").unwrap();
        detached.set_handler("GET", noop()).unwrap();
        host.register_resource(detached).unwrap();

        assert!(host.registered_resource("/a/b/old").is_ok());
    }

    #[test]
    fn both_sides_with_handlers_is_a_duplicate() {
        let host = host();
        host.resource("/a/b").unwrap().set_handler("GET", noop()).unwrap();

        let detached = Responder::new_resource("/a/b").unwrap();
        detached.set_handler("GET", noop()).unwrap();
        assert!(matches!(
            host.register_resource(detached),
            Err(RouterError::DuplicateTemplate(_))
        ));
    }

    #[test]
    fn grafting_synthesizes_dormant_intermediates() {
        let host = host();
        let detached = Responder::new_resource("/x/y/z").unwrap();
        host.register_resource(detached).unwrap();

        let y = host.registered_resource("/x/y").unwrap();
        assert!(!y.has_handlers());
        assert!(host.registered_resource("/x/y/z").is_ok());
    }

    #[test]
    fn prefix_disagreement_is_a_path_conflict() {
        let host = host();
        let c = host.resource("/c").unwrap();
        let detached = Responder::new_resource("/a/b").unwrap();
        assert!(matches!(
            c.register_resource(detached),
            Err(RouterError::PathConflict { .. })
        ));
    }

    #[test]
    fn host_intent_must_match_the_actual_host() {
        let host = host();
        let detached = Responder::new_resource("http://other.example/a").unwrap();
        assert!(matches!(
            host.register_resource(detached),
            Err(RouterError::PathConflict { .. })
        ));

        let matching = Responder::new_resource("http://example.com/a").unwrap();
        assert!(host.register_resource(matching).is_ok());
    }

    #[test]
    fn a_root_resource_cannot_go_below_a_host() {
        let host = host();
        let root = Responder::new_resource("/").unwrap();
        assert!(matches!(
            host.register_resource(root),
            Err(RouterError::RootUnderHost)
        ));
        assert!(matches!(host.resource("/"), Err(RouterError::RootUnderHost)));
    }

    #[test]
    fn redirect_insecure_requires_a_secure_url() {
        let host = host();
        let cfg = Config {
            redirect_insecure: true,
            ..Config::default()
        };
        assert!(matches!(
            host.resource_using_config("/plain", cfg),
            Err(RouterError::RedirectInsecureRequiresSecure)
        ));
        assert!(host.resource_using_config("https:///tls", cfg).is_ok());
    }

    #[test]
    fn set_configuration_upgrades_redirect_insecure() {
        let host = host();
        let node = host.resource("/later").unwrap();
        node.set_configuration(Config {
            redirect_insecure: true,
            ..Config::default()
        });
        let cfg = node.configuration();
        assert!(cfg.secure);
        assert!(cfg.redirect_insecure);
    }

    #[test]
    fn registering_under_an_active_parent_activates() {
        let host = host();
        let parent = host.resource("/p").unwrap();
        parent.set_handler("GET", noop()).unwrap();
        let child = parent.resource("c").unwrap();
        assert!(child.is_active());
    }

    #[test]
    fn url_building_walks_the_chain() {
        let host = host();
        let leaf = host.resource("/blogs/{title}/comments/").unwrap();
        assert_eq!(
            leaf.url(&[("title", "hello")]).unwrap(),
            "http://example.com/blogs/hello/comments/"
        );
        assert_eq!(
            leaf.url_template(),
            "http://example.com/blogs/{title}/comments/"
        );
    }

    #[test]
    fn url_building_validates_values() {
        let host = host();
        let leaf = host.resource("/p/{id:\\d+}").unwrap();
        assert!(matches!(
            leaf.url(&[("id", "abc")]),
            Err(RouterError::Template(_))
        ));
        assert!(matches!(leaf.url(&[]), Err(RouterError::Template(_))));
    }
}
