//! Responder configuration flags.

/// The policy switches of one responder. All default to off; `secure` and
/// `trailing_slash` are usually derived from the URL template the responder
/// was constructed with.
///
/// `strict_on_trailing_slash` and `lenient_on_trailing_slash` are competing
/// policies; when both are set the lenient one wins because the dispatch
/// machine checks it first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Handle unmatched paths falling through this responder's subtree.
    pub subtree_handler: bool,
    /// Only serve over TLS connections.
    pub secure: bool,
    /// Redirect plain-HTTP requests to the HTTPS URL instead of a 404.
    /// Only meaningful together with `secure`.
    pub redirect_insecure: bool,
    /// The canonical URL of this responder ends with `/`.
    pub trailing_slash: bool,
    /// A mismatched trailing slash is a 404 instead of a redirect.
    pub strict_on_trailing_slash: bool,
    /// A mismatched trailing slash is served as-is.
    pub lenient_on_trailing_slash: bool,
    /// An unclean request path is served as-is instead of being
    /// canonicalized and redirected.
    pub lenient_on_unclean_path: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived convenience: both leniency flags at once.
    pub fn handles_path_as_is(&self) -> bool {
        self.lenient_on_trailing_slash && self.lenient_on_unclean_path
    }

    /// Set both leniency flags.
    pub fn set_handles_path_as_is(&mut self) -> &mut Self {
        self.lenient_on_trailing_slash = true;
        self.lenient_on_unclean_path = true;
        self
    }

    /// OR-in `other`; flags are never cleared once set.
    pub(crate) fn merge(&mut self, other: &Config) {
        self.subtree_handler |= other.subtree_handler;
        self.secure |= other.secure;
        self.redirect_insecure |= other.redirect_insecure;
        self.trailing_slash |= other.trailing_slash;
        self.strict_on_trailing_slash |= other.strict_on_trailing_slash;
        self.lenient_on_trailing_slash |= other.lenient_on_trailing_slash;
        self.lenient_on_unclean_path |= other.lenient_on_unclean_path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_path_as_is_is_derived() {
        let mut cfg = Config::new();
        assert!(!cfg.handles_path_as_is());
        cfg.lenient_on_trailing_slash = true;
        assert!(!cfg.handles_path_as_is());
        cfg.lenient_on_unclean_path = true;
        assert!(cfg.handles_path_as_is());

        let mut other = Config::new();
        other.set_handles_path_as_is();
        assert!(other.handles_path_as_is());
    }

    #[test]
    fn merge_never_clears() {
        let mut cfg = Config {
            secure: true,
            trailing_slash: true,
            ..Config::default()
        };
        cfg.merge(&Config {
            subtree_handler: true,
            ..Config::default()
        });
        assert!(cfg.secure);
        assert!(cfg.trailing_slash);
        assert!(cfg.subtree_handler);
    }
}
