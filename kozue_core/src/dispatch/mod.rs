//! The request dispatch state machine.
//!
//! Every responder's default receiver runs [`handle_or_pass`]: latch the
//! subtree flag, finish the request here when the path is fully consumed,
//! otherwise pass to the matching child and pick the request back up if it
//! falls through unhandled under a subtree handler.

pub(crate) mod state;

use std::sync::Arc;

use http::StatusCode;
use kozue_lib::url_encoding::decode_segment;
use tracing::trace;

use crate::ctx::RouteCtx;
use crate::handler::BoxFuture;
use crate::resource::Responder;

/// The per-node state machine; the built-in request receiver.
pub(crate) fn handle_or_pass(node: Arc<Responder>, mut ctx: RouteCtx) -> BoxFuture<RouteCtx> {
    Box::pin(async move {
        if node.is_subtree_handler() {
            ctx.state.subtree_exists = true;
        }

        if ctx.state.is_terminal() {
            return finalize(node, ctx, false).await;
        }

        // Remember where this node stood; a failed descent must not leak
        // its cursor or captures into the subtree fall-back view.
        let checkpoint_cursor = ctx.state.cursor();
        let checkpoint_captures = ctx.state.captures.len();

        ctx = match node.request_passer() {
            Some(h) => h.handle(ctx).await,
            None => pass_request(node.clone(), ctx).await,
        };

        if !ctx.state.handled && node.is_subtree_handler() {
            ctx.state.captures.truncate(checkpoint_captures);
            ctx.state.advance_to(checkpoint_cursor);
            ctx.state.set_fallback(checkpoint_cursor);
            return finalize(node, ctx, true).await;
        }

        ctx
    })
}

/// The built-in request passer: match the next path segment against the
/// child buckets, strictly static first, then patterns in registration
/// order, then the wildcard child.
pub(crate) fn pass_request(node: Arc<Responder>, mut ctx: RouteCtx) -> BoxFuture<RouteCtx> {
    Box::pin(async move {
        let peeked = match ctx.state.peek_segment() {
            Some((raw, next)) => Some((decode_segment(raw), next)),
            None => None,
        };
        let Some((decoded, next_cursor)) = peeked else {
            return ctx;
        };
        let Some(segment) = decoded else {
            // Malformed percent-escapes are the client's fault.
            ctx.respond(StatusCode::BAD_REQUEST, "");
            return ctx;
        };

        if let Some(child) = node.find_static_child(&segment) {
            trace!(segment = %segment, "static child hit");
            ctx.state.advance_to(next_cursor);
            return child.invoke_receiver(ctx).await;
        }

        for child in node.pattern_children_snapshot() {
            if child.template().match_segment(&segment, &mut ctx.state.captures) {
                trace!(segment = %segment, template = %child.template(), "pattern child hit");
                ctx.state.advance_to(next_cursor);
                return child.invoke_receiver(ctx).await;
            }
        }

        if let Some(child) = node.wildcard_child() {
            if child.template().match_segment(&segment, &mut ctx.state.captures) {
                trace!(segment = %segment, "wildcard child hit");
                ctx.state.advance_to(next_cursor);
                return child.invoke_receiver(ctx).await;
            }
        }

        if ctx.state.subtree_exists {
            // A subtree-handler ancestor picks the request up on the way
            // back out.
            return ctx;
        }

        let not_found = ctx.state.not_found.clone();
        not_found.handle(ctx).await
    })
}

// Finish the request at `node`: decide between 404, a redirect toward the
// canonical URL, and the method handler table. `fallback` is set when a
// subtree handler is serving an unmatched tail; the trailing-slash policy
// concerns only the node's own URL and is skipped then.
async fn finalize(node: Arc<Responder>, mut ctx: RouteCtx, fallback: bool) -> RouteCtx {
    if !node.has_handlers() && node.request_handler_override().is_none() {
        if ctx.state.subtree_exists {
            return ctx;
        }
        let not_found = ctx.state.not_found.clone();
        return not_found.handle(ctx).await;
    }

    let cfg = node.configuration();

    let mut target_scheme: Option<&str> = None;
    if cfg.secure && !ctx.state.secure_connection() {
        if !cfg.redirect_insecure {
            let not_found = ctx.state.not_found.clone();
            return not_found.handle(ctx).await;
        }
        target_scheme = Some("https");
    }

    let mut target_path: Option<String> = None;
    if ctx.state.is_unclean() && !cfg.lenient_on_unclean_path {
        target_path = Some(ctx.state.route_path().to_string());
    }

    if !fallback && !ctx.state.is_root_request() {
        let request_slash = ctx.state.has_trailing_slash();
        if cfg.trailing_slash != request_slash {
            if cfg.lenient_on_trailing_slash {
                // Serve as-is.
            } else if cfg.strict_on_trailing_slash {
                let not_found = ctx.state.not_found.clone();
                return not_found.handle(ctx).await;
            } else {
                let base = target_path
                    .take()
                    .unwrap_or_else(|| ctx.state.route_path().to_string());
                let rewritten = if cfg.trailing_slash {
                    format!("{}/", base.trim_end_matches('/'))
                } else {
                    base.trim_end_matches('/').to_string()
                };
                target_path = Some(rewritten);
            }
        }
    }

    if target_scheme.is_some() || target_path.is_some() {
        let scheme = target_scheme.unwrap_or(if ctx.state.secure_connection() {
            "https"
        } else {
            "http"
        });
        let path = target_path.as_deref().unwrap_or_else(|| ctx.state.raw_path());
        let location = if ctx.state.host().is_empty() {
            path.to_string()
        } else {
            format!("{}://{}{}", scheme, ctx.state.host(), path)
        };
        let code = node.permanent_redirect_code(ctx.state.permanent_code);
        trace!(location = %location, code = code.as_u16(), "redirecting to canonical URL");
        let redirect = node.redirect_handler();
        return redirect.handle(ctx, location, code).await;
    }

    ctx.state.shared = node.shared_data();
    match node.request_handler_override() {
        Some(h) => h.handle(ctx).await,
        None => invoke_method(node, ctx).await,
    }
}

/// The built-in request handler: dispatch on the method table.
pub(crate) async fn invoke_method(node: Arc<Responder>, ctx: RouteCtx) -> RouteCtx {
    let method = ctx.method().clone();
    match node.method_dispatch(&method) {
        Some(handler) => handler.handle(ctx).await,
        None => {
            let not_found = ctx.state.not_found.clone();
            not_found.handle(ctx).await
        }
    }
}
