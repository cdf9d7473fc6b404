// Type aliases (must be declared before other modules that use it)
pub mod alias;

pub mod ctx;
pub mod error;
pub mod handler;
pub mod resource;
pub mod router;
pub mod template;

pub(crate) mod dispatch;

pub mod debug;

// Re-export commonly used type aliases
pub use alias::{PRwLock, PRwLockReadGuard, PRwLockWriteGuard};

pub use ctx::RouteCtx;
pub use error::{Result, RouterError};
pub use handler::table::MethodTable;
pub use handler::{
    ArcHandler, ArcRedirectHandler, BoxFuture, Handler, Middleware, RedirectHandler,
    RedirectMiddleware,
};
pub use resource::{Config, Responder, ResponderKind};
pub use router::Router;
pub use template::{Captures, Similarity, Template, TemplateError, TemplateKind};
