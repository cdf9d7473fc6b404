pub mod prelude;

pub use kozue_core::Router;
pub use kozue_core::ctx::RouteCtx;
pub use kozue_core::error::{Result, RouterError};
pub use kozue_core::handler::table::MethodTable;
pub use kozue_core::handler::{
    ArcHandler, ArcRedirectHandler, BoxFuture, Handler, Middleware, RedirectHandler,
    RedirectMiddleware,
};
pub use kozue_core::resource::{Config, Responder, ResponderKind};
pub use kozue_core::template::{Captures, Similarity, Template, TemplateError, TemplateKind};

pub use kozue_core::alias::{PRwLock, PRwLockReadGuard, PRwLockWriteGuard};

pub use kozue_core;
pub use kozue_lib;
