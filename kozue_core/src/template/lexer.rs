#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawToken {
    // Plain literal run outside capture groups (escapes already resolved).
    Literal(String),
    // Unescaped '$' outside a capture; only meaningful at the very start,
    // where it introduces the template name.
    Dollar,
    // Unescaped ':' outside a capture; only meaningful after a leading name.
    Colon,
    // "{"
    CaptureStart,
    // The value name inside a capture, before ':' or '}'. May be empty.
    Ident(String),
    // The regex source inside a capture, after ':'. May be empty (reuse form).
    RegexBody(String),
    // "}"
    CaptureClose,
}

impl RawToken {
    fn push_literal(buf: &mut String, out: &mut Vec<RawToken>) {
        if !buf.is_empty() {
            out.push(RawToken::Literal(std::mem::take(buf)));
        }
    }
}

// Tokenize a segment-template string into a RawToken sequence.
//
// Notes on behavior:
// - Outside captures, "\" followed by one of '$', '{', '}', ':' produces that
//   character as a literal; the '\' is not included in output. A '\' before
//   any other character stays a literal backslash.
// - '$' and ':' outside captures are emitted as their own tokens; the parser
//   decides whether they form a valid name prefix or are stray.
// - Inside "{...}" the name runs until an unescaped ':' or '}'. After the ':'
//   everything up to the matching '}' is collected verbatim as the regex
//   body; braces inside the body nest (quantifiers like "{2,4}" work) and a
//   backslash escapes the following character without being interpreted.
// - A '}' with no open capture is emitted as CaptureClose; an unterminated
//   capture simply never emits its CaptureClose. Both are structural errors
//   the parser reports.
//
// This function only chops the string; grammar validation lives in the parser.
pub fn tokenize(input: &str) -> Vec<RawToken> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0usize;
    let mut out = Vec::new();
    let mut buf = String::new();

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                '$' | '{' | '}' | ':' => {
                    buf.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                _ => {
                    buf.push('\\');
                    i += 1;
                    continue;
                }
            }
        }

        match c {
            '$' => {
                RawToken::push_literal(&mut buf, &mut out);
                out.push(RawToken::Dollar);
                i += 1;
            }
            ':' => {
                RawToken::push_literal(&mut buf, &mut out);
                out.push(RawToken::Colon);
                i += 1;
            }
            '}' => {
                RawToken::push_literal(&mut buf, &mut out);
                out.push(RawToken::CaptureClose);
                i += 1;
            }
            '{' => {
                RawToken::push_literal(&mut buf, &mut out);
                out.push(RawToken::CaptureStart);
                i += 1;
                i = lex_capture(&chars, i, &mut out);
            }
            _ => {
                buf.push(c);
                i += 1;
            }
        }
    }

    RawToken::push_literal(&mut buf, &mut out);
    out
}

// Consume the inside of a capture group starting just after '{'.
// Emits Ident, then optionally RegexBody, then CaptureClose when the group
// is properly terminated. Returns the index after the consumed input.
fn lex_capture(chars: &[char], mut i: usize, out: &mut Vec<RawToken>) -> usize {
    let mut name = String::new();

    // Value name: runs to an unescaped ':' or '}'.
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                '$' | '{' | '}' | ':' => {
                    name.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                _ => {
                    name.push('\\');
                    i += 1;
                    continue;
                }
            }
        }
        match c {
            ':' => {
                out.push(RawToken::Ident(name));
                i += 1;
                return lex_regex_body(chars, i, out);
            }
            '}' => {
                out.push(RawToken::Ident(name));
                out.push(RawToken::CaptureClose);
                return i + 1;
            }
            _ => {
                name.push(c);
                i += 1;
            }
        }
    }

    // EOF inside the name; no CaptureClose gets emitted.
    out.push(RawToken::Ident(name));
    i
}

// Collect the regex body verbatim until the '}' that closes the capture.
// Brace pairs inside the body nest; "\X" copies both characters through
// untouched so the regex engine sees the escape.
fn lex_regex_body(chars: &[char], mut i: usize, out: &mut Vec<RawToken>) -> usize {
    let mut body = String::new();
    let mut depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            body.push('\\');
            body.push(chars[i + 1]);
            i += 2;
            continue;
        }
        match c {
            '{' => {
                depth += 1;
                body.push(c);
                i += 1;
            }
            '}' => {
                if depth == 0 {
                    out.push(RawToken::RegexBody(body));
                    out.push(RawToken::CaptureClose);
                    return i + 1;
                }
                depth -= 1;
                body.push(c);
                i += 1;
            }
            _ => {
                body.push(c);
                i += 1;
            }
        }
    }

    // EOF inside the body; no CaptureClose gets emitted.
    out.push(RawToken::RegexBody(body));
    i
}

#[cfg(test)]
mod tests {
    use super::{RawToken::*, tokenize};

    #[test]
    fn plain_literal() {
        assert_eq!(tokenize("blogs"), vec![Literal("blogs".into())]);
    }

    #[test]
    fn named_static_template() {
        let tokens = tokenize("$info:about");
        assert_eq!(
            tokens,
            vec![Dollar, Literal("info".into()), Colon, Literal("about".into())]
        );
    }

    #[test]
    fn wildcard_capture() {
        let tokens = tokenize("{title}");
        assert_eq!(tokens, vec![CaptureStart, Ident("title".into()), CaptureClose]);
    }

    #[test]
    fn regex_capture() {
        let tokens = tokenize("{id:\\d+}");
        assert_eq!(
            tokens,
            vec![
                CaptureStart,
                Ident("id".into()),
                RegexBody("\\d+".into()),
                CaptureClose,
            ]
        );
    }

    #[test]
    fn regex_body_with_quantifier_braces() {
        let tokens = tokenize("{hex:[0-9a-f]{2,4}}");
        assert_eq!(
            tokens,
            vec![
                CaptureStart,
                Ident("hex".into()),
                RegexBody("[0-9a-f]{2,4}".into()),
                CaptureClose,
            ]
        );
    }

    #[test]
    fn empty_regex_body_reuse_form() {
        let tokens = tokenize("{id:}");
        assert_eq!(
            tokens,
            vec![CaptureStart, Ident("id".into()), RegexBody("".into()), CaptureClose]
        );
    }

    #[test]
    fn literal_with_capture_in_the_middle() {
        let tokens = tokenize("page-{num:\\d+}.html");
        assert_eq!(
            tokens,
            vec![
                Literal("page-".into()),
                CaptureStart,
                Ident("num".into()),
                RegexBody("\\d+".into()),
                CaptureClose,
                Literal(".html".into()),
            ]
        );
    }

    #[test]
    fn escaped_delimiters_become_literal() {
        let tokens = tokenize("a\\{b\\}c\\$d\\:e");
        assert_eq!(tokens, vec![Literal("a{b}c$d:e".into())]);
    }

    #[test]
    fn backslash_before_ordinary_char_is_kept() {
        let tokens = tokenize("a\\d");
        assert_eq!(tokens, vec![Literal("a\\d".into())]);
    }

    #[test]
    fn escaped_brace_inside_regex_does_not_nest() {
        let tokens = tokenize("{v:a\\{b}");
        assert_eq!(
            tokens,
            vec![
                CaptureStart,
                Ident("v".into()),
                RegexBody("a\\{b".into()),
                CaptureClose,
            ]
        );
    }

    #[test]
    fn unterminated_capture_has_no_close_token() {
        let tokens = tokenize("{id:\\d+");
        assert_eq!(
            tokens,
            vec![CaptureStart, Ident("id".into()), RegexBody("\\d+".into())]
        );
    }

    #[test]
    fn stray_close_brace_is_emitted() {
        let tokens = tokenize("a}b");
        assert_eq!(
            tokens,
            vec![Literal("a".into()), CaptureClose, Literal("b".into())]
        );
    }
}
