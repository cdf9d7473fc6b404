//! Percent-encoding helpers for URL path segments.
//!
//! Request paths arrive still percent-encoded; the router splits them on
//! literal `/` and decodes one segment at a time, so an encoded `%2F` never
//! becomes a segment separator.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters that must stay encoded inside a single path segment.
pub const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'/')
    .add(b'%')
    .add(b'{')
    .add(b'}');

/// Decodes one percent-encoded path segment.
///
/// Returns `None` when the segment contains a malformed escape (a `%` not
/// followed by two hex digits) or when the decoded bytes are not valid UTF-8.
/// `percent_decode_str` alone passes malformed escapes through unchanged,
/// which would silently route on garbage, so the escapes are validated first.
pub fn decode_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
            {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Encodes one path segment for inclusion in a URL.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}
