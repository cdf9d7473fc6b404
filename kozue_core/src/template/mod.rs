//! The segment-template language.
//!
//! A template describes one host or path segment as a mix of literal text,
//! named regex captures `{name:regex}` and at most one wildcard capture
//! `{name}`. An optional `$name:` prefix names the template; without it the
//! first named capture lends its value name to the template.
//!
//! Templates are parsed once, carry their compiled regexes, and are shared
//! immutably between requests.

pub(crate) mod lexer;
pub(crate) mod parser;

use std::fmt;

use regex::Regex;

use self::parser::{RawPiece, RawTemplate};

/// Ordered accumulator of `(value name, captured text)` pairs collected while
/// matching templates along a request path.
pub type Captures = Vec<(String, String)>;

/// Errors from parsing, matching or applying a segment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    // The template text contains no segments at all.
    Empty,
    // A '{' without matching '}' or the other way round; `at` is the index
    // of the offending token.
    UnbalancedBrace { at: usize },
    // "{}" or "{:}" — a capture with neither name nor regex.
    EmptyCapture { at: usize },
    // "{name:}" with no earlier regex bound to that name in this template.
    NoRegexToReuse { name: String },
    // More than one wildcard capture in one template.
    MultipleWildcards,
    // A wildcard directly followed by another capture; nothing bounds it.
    UnboundedWildcard { name: String },
    // An unescaped '$' or ':' outside its name-prefix position.
    UnescapedChar { ch: char, at: usize },
    // A '$' prefix without a "name:" following it.
    ExpectedName,
    // The regex source failed to compile.
    InvalidRegex { source: String, reason: String },
    // `apply` was not given a value for a required capture.
    MissingValue { name: String },
    // `apply` was given a value that fails the capture's regex.
    InvalidValue { name: String, value: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Template is empty"),
            Self::UnbalancedBrace { at } => write!(f, "Unbalanced brace at token {}", at),
            Self::EmptyCapture { at } => {
                write!(f, "Capture without name or regex at token {}", at)
            }
            Self::NoRegexToReuse { name } => {
                write!(f, "No earlier regex bound to {:?} to reuse", name)
            }
            Self::MultipleWildcards => write!(f, "More than one wildcard capture"),
            Self::UnboundedWildcard { name } => {
                write!(f, "Wildcard {:?} is not bounded by a literal or the segment end", name)
            }
            Self::UnescapedChar { ch, at } => {
                write!(f, "Unescaped {:?} at token {}", ch, at)
            }
            Self::ExpectedName => write!(f, "Expected \"name:\" after leading '$'"),
            Self::InvalidRegex { source, reason } => {
                write!(f, "Invalid regex {:?}: {}", source, reason)
            }
            Self::MissingValue { name } => write!(f, "No value supplied for {:?}", name),
            Self::InvalidValue { name, value } => {
                write!(f, "Value {:?} does not satisfy the regex of {:?}", value, name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Structural classification of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Literal text only; matched by exact string comparison.
    Static,
    /// A single wildcard capture and nothing else.
    Wildcard,
    /// Everything else: regex captures, or literals mixed with captures.
    Pattern,
}

/// How close two templates are to denoting the same tree position.
///
/// This relation, not string equality, governs responder identity: two
/// registrations whose templates are `TheSame` address one node, while the
/// two `Different*` outcomes are construction conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    /// Shapes, literal content or regex sources differ.
    Different,
    /// Same shapes and regexes, but capture value names differ somewhere.
    DifferentValueNames,
    /// Same shapes, regexes and value names, but the template names differ.
    DifferentNames,
    /// Indistinguishable.
    TheSame,
}

#[derive(Debug)]
enum Piece {
    Literal(String),
    Capture {
        name: String,
        source: String,
        re: Regex,
    },
    Wildcard {
        name: String,
    },
}

/// The parsed, executable form of one segment template.
#[derive(Debug)]
pub struct Template {
    name: Option<String>,
    explicit_name: bool,
    pieces: Vec<Piece>,
    kind: TemplateKind,
}

impl Template {
    /// Parse a segment-template string.
    pub fn parse(text: &str) -> Result<Template, TemplateError> {
        let raw = parser::parse_tokens(&lexer::tokenize(text))?;
        Template::from_raw(raw)
    }

    // Compile the raw pieces, anchoring each capture regex for its position:
    // every capture matches at the current cursor (so it is compiled with a
    // leading anchor against the remaining text) and the final piece must
    // consume the rest of the segment.
    fn from_raw(raw: RawTemplate) -> Result<Template, TemplateError> {
        let RawTemplate {
            name,
            explicit_name,
            pieces: raw_pieces,
            ..
        } = raw;

        let last = raw_pieces.len() - 1;
        let mut pieces = Vec::with_capacity(raw_pieces.len());
        for (i, piece) in raw_pieces.into_iter().enumerate() {
            match piece {
                RawPiece::Literal(s) => pieces.push(Piece::Literal(s)),
                RawPiece::Wildcard { name } => pieces.push(Piece::Wildcard { name }),
                RawPiece::Capture { name, regex } => {
                    let anchored = if i == last {
                        format!("^(?:{})$", regex)
                    } else {
                        format!("^(?:{})", regex)
                    };
                    let re = Regex::new(&anchored).map_err(|e| TemplateError::InvalidRegex {
                        source: regex.clone(),
                        reason: e.to_string(),
                    })?;
                    pieces.push(Piece::Capture {
                        name,
                        source: regex,
                        re,
                    });
                }
            }
        }

        let kind = if pieces.len() == 1 {
            match pieces[0] {
                Piece::Literal(_) => TemplateKind::Static,
                Piece::Wildcard { .. } => TemplateKind::Wildcard,
                Piece::Capture { .. } => TemplateKind::Pattern,
            }
        } else if pieces.iter().all(|p| matches!(p, Piece::Literal(_))) {
            TemplateKind::Static
        } else {
            TemplateKind::Pattern
        };

        Ok(Template {
            name,
            explicit_name,
            pieces,
            kind,
        })
    }

    /// The template's name: the `$name:` prefix if one was written, otherwise
    /// the value name of the first named capture.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == TemplateKind::Static
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == TemplateKind::Wildcard
    }

    /// The unescaped literal content of a static template.
    pub fn literal(&self) -> Option<&str> {
        if self.kind != TemplateKind::Static {
            return None;
        }
        match &self.pieces[0] {
            Piece::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// All non-empty capture value names, in order.
    pub fn value_names(&self) -> Vec<&str> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Capture { name, .. } | Piece::Wildcard { name } if !name.is_empty() => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Match one (already percent-decoded) segment string.
    ///
    /// On success the captured pairs are appended to `captures` and `true`
    /// is returned; on failure `captures` is left untouched. A value name
    /// that already appears in the accumulator must capture the same text
    /// again, otherwise the match fails (cross-segment repetition check).
    pub fn match_segment(&self, text: &str, captures: &mut Captures) -> bool {
        let base = captures.len();
        let mut cursor = 0usize;

        for (i, piece) in self.pieces.iter().enumerate() {
            let rest = &text[cursor..];
            match piece {
                Piece::Literal(lit) => {
                    if !rest.starts_with(lit.as_str()) {
                        captures.truncate(base);
                        return false;
                    }
                    cursor += lit.len();
                }
                Piece::Capture { name, re, .. } => {
                    let Some(m) = re.find(rest) else {
                        captures.truncate(base);
                        return false;
                    };
                    if !record_capture(captures, name, &rest[..m.end()]) {
                        captures.truncate(base);
                        return false;
                    }
                    cursor += m.end();
                }
                Piece::Wildcard { name } => {
                    // A wildcard takes a non-empty run up to the first
                    // occurrence of the next literal, or the segment end.
                    let Some(first) = rest.chars().next() else {
                        captures.truncate(base);
                        return false;
                    };
                    let min = first.len_utf8();
                    let taken = match self.pieces.get(i + 1) {
                        Some(Piece::Literal(lit)) => match rest[min..].find(lit.as_str()) {
                            Some(pos) => &rest[..min + pos],
                            None => {
                                captures.truncate(base);
                                return false;
                            }
                        },
                        None => rest,
                        Some(_) => {
                            // The parser rejects wildcards bounded by
                            // captures; nothing else can follow.
                            captures.truncate(base);
                            return false;
                        }
                    };
                    if !record_capture(captures, name, taken) {
                        captures.truncate(base);
                        return false;
                    }
                    cursor += taken.len();
                }
            }
        }

        if cursor != text.len() {
            captures.truncate(base);
            return false;
        }
        true
    }

    /// Substitute `(name, value)` pairs into the template, producing the
    /// literal segment text it would match.
    ///
    /// A missing value fails with [`TemplateError::MissingValue`] unless
    /// `ignore_missing` is set, in which case the empty string is
    /// substituted. A value that fails its capture's regex fails with
    /// [`TemplateError::InvalidValue`].
    pub fn apply(
        &self,
        values: &[(&str, &str)],
        ignore_missing: bool,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(lit) => out.push_str(lit),
                Piece::Wildcard { name } => match lookup(values, name) {
                    Some(value) => out.push_str(value),
                    None if ignore_missing => {}
                    None => {
                        return Err(TemplateError::MissingValue { name: name.clone() });
                    }
                },
                Piece::Capture { name, re, .. } => match lookup(values, name) {
                    Some(value) => {
                        let full = re.find(value).is_some_and(|m| m.end() == value.len());
                        if !full {
                            return Err(TemplateError::InvalidValue {
                                name: name.clone(),
                                value: value.to_string(),
                            });
                        }
                        out.push_str(value);
                    }
                    None if ignore_missing => {}
                    None => {
                        return Err(TemplateError::MissingValue { name: name.clone() });
                    }
                },
            }
        }
        Ok(out)
    }

    /// The four-valued identity relation: equal shapes and regex sources
    /// first, then value names, then the template name.
    pub fn similarity(&self, other: &Template) -> Similarity {
        if self.pieces.len() != other.pieces.len() {
            return Similarity::Different;
        }

        let mut value_names_match = true;
        for (a, b) in self.pieces.iter().zip(other.pieces.iter()) {
            match (a, b) {
                (Piece::Literal(x), Piece::Literal(y)) => {
                    if x != y {
                        return Similarity::Different;
                    }
                }
                (
                    Piece::Capture {
                        name: n1,
                        source: s1,
                        ..
                    },
                    Piece::Capture {
                        name: n2,
                        source: s2,
                        ..
                    },
                ) => {
                    if s1 != s2 {
                        return Similarity::Different;
                    }
                    if n1 != n2 {
                        value_names_match = false;
                    }
                }
                (Piece::Wildcard { name: n1 }, Piece::Wildcard { name: n2 }) => {
                    if n1 != n2 {
                        value_names_match = false;
                    }
                }
                _ => return Similarity::Different,
            }
        }

        if !value_names_match {
            return Similarity::DifferentValueNames;
        }
        if self.name != other.name {
            return Similarity::DifferentNames;
        }
        Similarity::TheSame
    }

    /// Serialize back to template text. The output round-trips through
    /// [`Template::parse`] to a structurally identical template.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.explicit_name {
            if let Some(name) = &self.name {
                out.push('$');
                out.push_str(&escape(name));
                out.push(':');
            }
        }
        for piece in &self.pieces {
            match piece {
                Piece::Literal(lit) => out.push_str(&escape(lit)),
                Piece::Capture { name, source, .. } => {
                    out.push('{');
                    out.push_str(&escape(name));
                    out.push(':');
                    out.push_str(source);
                    out.push('}');
                }
                Piece::Wildcard { name } => {
                    out.push('{');
                    out.push_str(&escape(name));
                    out.push('}');
                }
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.similarity(other) == Similarity::TheSame
    }
}

// Append (name, value) unless the name is empty; a repeated name must carry
// the same value and is not duplicated in the accumulator.
fn record_capture(captures: &mut Captures, name: &str, value: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    if let Some((_, prev)) = captures.iter().find(|(n, _)| n == name) {
        return prev == value;
    }
    captures.push((name.to_string(), value.to_string()));
    true
}

fn lookup<'v>(values: &[(&str, &'v str)], name: &str) -> Option<&'v str> {
    if name.is_empty() {
        return None;
    }
    values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '$' | '{' | '}' | ':') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(text: &str) -> Template {
        Template::parse(text).unwrap()
    }

    #[test]
    fn kinds() {
        assert_eq!(t("blogs").kind(), TemplateKind::Static);
        assert_eq!(t("{title}").kind(), TemplateKind::Wildcard);
        assert_eq!(t("{id:\\d+}").kind(), TemplateKind::Pattern);
        assert_eq!(t("page-{id:\\d+}").kind(), TemplateKind::Pattern);
        assert_eq!(t("pre-{rest}").kind(), TemplateKind::Pattern);
    }

    #[test]
    fn static_match_is_exact() {
        let tpl = t("blogs");
        let mut caps = Captures::new();
        assert!(tpl.match_segment("blogs", &mut caps));
        assert!(!tpl.match_segment("blog", &mut caps));
        assert!(!tpl.match_segment("blogsx", &mut caps));
        assert!(caps.is_empty());
    }

    #[test]
    fn regex_capture_matches_and_records() {
        let tpl = t("{id:\\d+}");
        let mut caps = Captures::new();
        assert!(tpl.match_segment("42", &mut caps));
        assert_eq!(caps, vec![("id".to_string(), "42".to_string())]);
        assert!(!tpl.match_segment("42x", &mut caps));
        assert!(!tpl.match_segment("x42", &mut caps));
    }

    #[test]
    fn mixed_segment_walks_pieces() {
        let tpl = t("page-{num:\\d+}.html");
        let mut caps = Captures::new();
        assert!(tpl.match_segment("page-7.html", &mut caps));
        assert_eq!(caps, vec![("num".to_string(), "7".to_string())]);

        caps.clear();
        assert!(!tpl.match_segment("page-7.htm", &mut caps));
        assert!(caps.is_empty());
    }

    #[test]
    fn wildcard_takes_run_up_to_next_literal() {
        let tpl = t("{name}.tar.gz");
        let mut caps = Captures::new();
        assert!(tpl.match_segment("backup.tar.gz", &mut caps));
        assert_eq!(caps, vec![("name".to_string(), "backup".to_string())]);
    }

    #[test]
    fn wildcard_requires_nonempty_run() {
        let tpl = t("{name}-x");
        let mut caps = Captures::new();
        assert!(!tpl.match_segment("-x", &mut caps));
        assert!(tpl.match_segment("a-x", &mut caps));
        assert_eq!(caps, vec![("name".to_string(), "a".to_string())]);
    }

    #[test]
    fn lone_wildcard_takes_everything() {
        let tpl = t("{title}");
        let mut caps = Captures::new();
        assert!(!tpl.match_segment("", &mut caps));
        assert!(tpl.match_segment("hello-world", &mut caps));
        assert_eq!(caps, vec![("title".to_string(), "hello-world".to_string())]);
    }

    #[test]
    fn repeated_value_name_must_capture_equal_text() {
        let tpl = t("{id:\\d+}");
        let mut caps = vec![("id".to_string(), "42".to_string())];
        assert!(tpl.match_segment("42", &mut caps));
        assert_eq!(caps.len(), 1);
        assert!(!tpl.match_segment("43", &mut caps));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn failed_match_rolls_back_captures() {
        let tpl = t("{a}-{b:\\d+}");
        let mut caps = Captures::new();
        assert!(!tpl.match_segment("left-right", &mut caps));
        assert!(caps.is_empty());
        assert!(tpl.match_segment("left-7", &mut caps));
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn apply_substitutes_and_validates() {
        let tpl = t("page-{num:\\d+}");
        assert_eq!(tpl.apply(&[("num", "3")], false).unwrap(), "page-3");
        assert!(matches!(
            tpl.apply(&[("num", "x")], false),
            Err(TemplateError::InvalidValue { .. })
        ));
        assert!(matches!(
            tpl.apply(&[], false),
            Err(TemplateError::MissingValue { .. })
        ));
        assert_eq!(tpl.apply(&[], true).unwrap(), "page-");
    }

    #[test]
    fn apply_then_match_recovers_values() {
        let tpl = t("{user:[a-z]+}-{id:\\d+}");
        let text = tpl.apply(&[("user", "ada"), ("id", "7")], false).unwrap();
        let mut caps = Captures::new();
        assert!(tpl.match_segment(&text, &mut caps));
        assert_eq!(
            caps,
            vec![
                ("user".to_string(), "ada".to_string()),
                ("id".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn similarity_ladder() {
        let a = t("page-{num:\\d+}");
        assert_eq!(a.similarity(&t("page-{num:\\d+}")), Similarity::TheSame);
        assert_eq!(
            a.similarity(&t("page-{n:\\d+}")),
            Similarity::DifferentValueNames
        );
        assert_eq!(
            a.similarity(&t("$paged:page-{num:\\d+}")),
            Similarity::DifferentNames
        );
        assert_eq!(a.similarity(&t("page-{num:\\w+}")), Similarity::Different);
        assert_eq!(a.similarity(&t("leaf-{num:\\d+}")), Similarity::Different);
        assert_eq!(a.similarity(&t("page-{num}")), Similarity::Different);
    }

    #[test]
    fn similarity_of_statics_compares_content_and_name() {
        assert_eq!(t("about").similarity(&t("about")), Similarity::TheSame);
        assert_eq!(t("about").similarity(&t("contact")), Similarity::Different);
        assert_eq!(
            t("about").similarity(&t("$info:about")),
            Similarity::DifferentNames
        );
    }

    #[test]
    fn render_round_trips() {
        for text in [
            "blogs",
            "{title}",
            "{id:\\d+}",
            "$page:page-{num:\\d+}.html",
            "a\\{b\\}c",
            "{name}.tar.gz",
            "{hex:[0-9a-f]{2,4}}",
        ] {
            let tpl = t(text);
            let re_parsed = Template::parse(&tpl.render()).unwrap();
            assert_eq!(
                tpl.similarity(&re_parsed),
                Similarity::TheSame,
                "round trip of {:?} via {:?}",
                text,
                tpl.render()
            );
        }
    }

    #[test]
    fn template_name_resolution() {
        assert_eq!(t("blogs").name(), None);
        assert_eq!(t("{title}").name(), Some("title"));
        assert_eq!(t("a-{x:\\d+}-{y:\\d+}").name(), Some("x"));
        assert_eq!(t("$custom:{title}").name(), Some("custom"));
    }

    #[test]
    fn value_names_are_collected_in_order() {
        assert_eq!(t("{a:\\d+}-{b}").value_names(), vec!["a", "b"]);
        assert!(t("static").value_names().is_empty());
        assert!(t("{:\\d+}").value_names().is_empty());
    }
}
