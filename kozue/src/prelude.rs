//! One-stop imports for building a routing tree.
//!
//! ```rust
//! use kozue::prelude::*;
//!
//! let router = Router::new();
//! let blogs = router.resource("/blogs/").unwrap();
//! blogs
//!     .set_handler("GET", |mut ctx: RouteCtx| async move {
//!         ctx.respond(StatusCode::OK, "blogs index");
//!         ctx
//!     })
//!     .unwrap();
//! ```

pub use kozue_core::ctx::RouteCtx;
pub use kozue_core::error::RouterError;
pub use kozue_core::handler::{ArcHandler, Handler, Middleware, RedirectHandler};
pub use kozue_core::resource::{Config, Responder};
pub use kozue_core::router::Router;
pub use kozue_core::template::{Similarity, Template, TemplateKind};

pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode, header};
