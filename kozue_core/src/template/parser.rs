use super::TemplateError;
use super::lexer::RawToken;

/// One unresolved template piece. Regex sources are still raw text here;
/// compilation with positional anchors happens in `Template::from_raw` once
/// the piece positions are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawPiece {
    Literal(String),
    Capture { name: String, regex: String },
    Wildcard { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawTemplate {
    pub name: Option<String>,
    pub explicit_name: bool,
    pub pieces: Vec<RawPiece>,
    pub wildcard: Option<usize>,
}

/// Convert a token stream into the raw piece sequence of one segment
/// template.
///
/// Rules:
/// - A leading `Dollar Literal Colon` triple is the template name.
/// - `Dollar` or `Colon` anywhere else is a stray unescaped character.
/// - Adjacent literal runs merge into a single piece.
/// - `{name}` is a wildcard capture; at most one may appear, and it may not
///   be followed directly by another capture (nothing would bound its run).
/// - `{name:}` reuses the most recent regex bound to `name` earlier in this
///   template; there must be one.
/// - `{:regex}` matches without recording a capture; `{}` is an error.
pub(crate) fn parse_tokens(tokens: &[RawToken]) -> Result<RawTemplate, TemplateError> {
    if tokens.is_empty() {
        return Err(TemplateError::Empty);
    }

    let mut name: Option<String> = None;
    let mut explicit_name = false;
    let mut i = 0usize;

    if matches!(tokens.first(), Some(RawToken::Dollar)) {
        match (tokens.get(1), tokens.get(2)) {
            (Some(RawToken::Literal(n)), Some(RawToken::Colon)) if !n.is_empty() => {
                name = Some(n.clone());
                explicit_name = true;
                i = 3;
            }
            _ => return Err(TemplateError::ExpectedName),
        }
    }

    let mut pieces: Vec<RawPiece> = Vec::new();
    let mut wildcard: Option<usize> = None;

    while i < tokens.len() {
        match &tokens[i] {
            RawToken::Literal(s) => {
                if let Some(RawPiece::Literal(prev)) = pieces.last_mut() {
                    prev.push_str(s);
                } else {
                    pieces.push(RawPiece::Literal(s.clone()));
                }
                i += 1;
            }

            RawToken::Dollar => {
                return Err(TemplateError::UnescapedChar { ch: '$', at: i });
            }
            RawToken::Colon => {
                return Err(TemplateError::UnescapedChar { ch: ':', at: i });
            }
            RawToken::CaptureClose => {
                return Err(TemplateError::UnbalancedBrace { at: i });
            }
            RawToken::Ident(_) | RawToken::RegexBody(_) => {
                // The lexer only emits these between CaptureStart and
                // CaptureClose; seeing one here means the group never opened.
                return Err(TemplateError::UnbalancedBrace { at: i });
            }

            RawToken::CaptureStart => {
                let (piece, next) = parse_capture(tokens, i, &pieces)?;
                if matches!(piece, RawPiece::Wildcard { .. }) {
                    if wildcard.is_some() {
                        return Err(TemplateError::MultipleWildcards);
                    }
                    wildcard = Some(pieces.len());
                }
                pieces.push(piece);
                i = next;
            }
        }
    }

    if pieces.is_empty() {
        return Err(TemplateError::Empty);
    }

    // A wildcard needs a literal (or the segment end) to bound its run.
    if let Some(w) = wildcard {
        if matches!(pieces.get(w + 1), Some(RawPiece::Capture { .. })) {
            let wildcard_name = match &pieces[w] {
                RawPiece::Wildcard { name } => name.clone(),
                _ => String::new(),
            };
            return Err(TemplateError::UnboundedWildcard { name: wildcard_name });
        }
    }

    if name.is_none() {
        name = pieces.iter().find_map(|p| match p {
            RawPiece::Capture { name, .. } | RawPiece::Wildcard { name } if !name.is_empty() => {
                Some(name.clone())
            }
            _ => None,
        });
    }

    Ok(RawTemplate {
        name,
        explicit_name,
        pieces,
        wildcard,
    })
}

// Parse one capture group starting at tokens[i] (the CaptureStart).
// Returns the finished piece and the index just past the CaptureClose.
fn parse_capture(
    tokens: &[RawToken],
    start: usize,
    earlier: &[RawPiece],
) -> Result<(RawPiece, usize), TemplateError> {
    let mut i = start + 1;

    let name = match tokens.get(i) {
        Some(RawToken::Ident(n)) => {
            i += 1;
            n.clone()
        }
        _ => return Err(TemplateError::UnbalancedBrace { at: start }),
    };

    match tokens.get(i) {
        Some(RawToken::CaptureClose) => {
            // `{name}` — wildcard capture.
            if name.is_empty() {
                return Err(TemplateError::EmptyCapture { at: start });
            }
            Ok((RawPiece::Wildcard { name }, i + 1))
        }
        Some(RawToken::RegexBody(body)) => {
            i += 1;
            if !matches!(tokens.get(i), Some(RawToken::CaptureClose)) {
                return Err(TemplateError::UnbalancedBrace { at: start });
            }
            let regex = if body.is_empty() {
                if name.is_empty() {
                    return Err(TemplateError::EmptyCapture { at: start });
                }
                prior_regex_of(earlier, &name)
                    .ok_or_else(|| TemplateError::NoRegexToReuse { name: name.clone() })?
            } else {
                body.clone()
            };
            Ok((RawPiece::Capture { name, regex }, i + 1))
        }
        _ => Err(TemplateError::UnbalancedBrace { at: start }),
    }
}

// Most recent regex bound to `name` among the pieces parsed so far.
fn prior_regex_of(pieces: &[RawPiece], name: &str) -> Option<String> {
    pieces.iter().rev().find_map(|p| match p {
        RawPiece::Capture { name: n, regex } if n == name => Some(regex.clone()),
        _ => None,
    })
}
