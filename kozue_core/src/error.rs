use std::fmt;

use crate::template::TemplateError;

/// Errors raised while building the responder tree.
///
/// Every construction entry point returns one of these instead of leaving the
/// tree half-built; callers are expected to treat them as programmer errors
/// and fail fast.
#[derive(Debug)]
pub enum RouterError {
    /// A required argument was empty or absent.
    NilArgument(&'static str),
    /// The template text inside a URL could not be parsed.
    Template(TemplateError),
    /// Host templates must not consist of a single wildcard capture.
    WildcardHost(String),
    /// A host registration carried path segments.
    HostWithPath(String),
    /// A host responder was registered below another responder.
    MisplacedHost(String),
    /// The responder is already part of a tree.
    AlreadyRegistered(String),
    /// A path addressed from a router or host must start with `/`.
    NonRootedPath(String),
    /// A path addressed from a resource must be relative.
    RootedSubPath(String),
    /// An empty segment appeared in the middle of a path template.
    EmptySegment(String),
    /// `redirect_insecure` was requested on a node that is not `secure`.
    RedirectInsecureRequiresSecure,
    /// Two responders on one root-to-leaf chain share a template name.
    NameCollision(String),
    /// Two captures on one root-to-leaf chain share a value name.
    ValueNameCollision(String),
    /// Both sides of a `TheSame` template collision carry method handlers.
    DuplicateTemplate(String),
    /// Templates at the same position differ only in capture value names.
    ValueNameConflict(String),
    /// Templates at the same position differ only in their template name.
    TemplateNameConflict(String),
    /// Two responders claiming one template disagree on configuration.
    ConfigConflict { template: String, field: &'static str },
    /// A URL template disagreed with the chain of ancestors it was
    /// registered under.
    PathConflict { expected: String, found: String },
    /// A root resource cannot live below a host.
    RootUnderHost,
    /// The permanent-redirect code must be 301 or 308.
    UnsupportedRedirectCode(u16),
    /// Redirect targets must carry a 3xx status code.
    NonRedirectCode(u16),
    /// A method token was not a valid HTTP method.
    UnknownMethod(String),
    /// `wrap_handler_of` named a method that has no handler yet.
    NoHandlerFor(String),
    /// A look-up path named a child that does not exist.
    NoSuchResource(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NilArgument(what) => write!(f, "{} must not be empty", what),
            Self::Template(err) => write!(f, "Template error: {}", err),
            Self::WildcardHost(t) => write!(f, "Host template may not be a wildcard: {}", t),
            Self::HostWithPath(u) => {
                write!(f, "Host registration must not carry path segments: {}", u)
            }
            Self::MisplacedHost(t) => {
                write!(f, "Host {} can only be registered at a router", t)
            }
            Self::AlreadyRegistered(t) => {
                write!(f, "Responder {} is already part of a tree", t)
            }
            Self::NonRootedPath(p) => write!(f, "Path must start with '/': {}", p),
            Self::RootedSubPath(p) => {
                write!(f, "Path below a resource must be relative: {}", p)
            }
            Self::EmptySegment(p) => write!(f, "Empty segment in path template: {}", p),
            Self::RedirectInsecureRequiresSecure => {
                write!(f, "redirect_insecure requires secure")
            }
            Self::NameCollision(name) => {
                write!(f, "Template name {:?} already used on this chain", name)
            }
            Self::ValueNameCollision(name) => {
                write!(f, "Capture value name {:?} already used on this chain", name)
            }
            Self::DuplicateTemplate(t) => {
                write!(f, "Both responders for template {} carry handlers", t)
            }
            Self::ValueNameConflict(t) => {
                write!(f, "Template {} collides with an existing one under different value names", t)
            }
            Self::TemplateNameConflict(t) => {
                write!(f, "Template {} collides with an existing one under a different name", t)
            }
            Self::ConfigConflict { template, field } => {
                write!(f, "Responders for template {} disagree on {}", template, field)
            }
            Self::PathConflict { expected, found } => {
                write!(f, "URL template names {} where the tree has {}", found, expected)
            }
            Self::RootUnderHost => write!(f, "A root resource cannot be registered under a host"),
            Self::UnsupportedRedirectCode(code) => {
                write!(f, "Permanent redirect code must be 301 or 308, got {}", code)
            }
            Self::NonRedirectCode(code) => {
                write!(f, "Redirect status code must be in 300..=399, got {}", code)
            }
            Self::UnknownMethod(m) => write!(f, "Invalid HTTP method token: {:?}", m),
            Self::NoHandlerFor(m) => write!(f, "No handler registered for method {:?}", m),
            Self::NoSuchResource(p) => write!(f, "No registered resource at {:?}", p),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<TemplateError> for RouterError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

/// Construction-side result alias.
pub type Result<T> = std::result::Result<T, RouterError>;
