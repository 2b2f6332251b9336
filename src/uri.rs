//! URI resolution and JSON-Pointer segment encoding.

use crate::errors::CompileError;
use failure::{bail, Error};
use url::Url;

/// The scheme of an absolute URI, or `None` for relative references.
pub(crate) fn scheme_of(uri: &str) -> Option<String> {
    Url::parse(uri).ok().map(|url| url.scheme().to_owned())
}

/// Resolves a reference against an optional base URI.
///
/// Absolute references stand on their own. Relative references require a
/// base; without one they cannot name anything and resolution fails.
pub(crate) fn resolve_against(base: Option<&Url>, reference: &str) -> Result<Url, Error> {
    if let Ok(url) = Url::parse(reference) {
        return Ok(url);
    }

    match base {
        Some(base) => match base.join(reference) {
            Ok(url) => Ok(url),
            Err(_) => bail!(CompileError::InvalidUri {
                uri: reference.to_owned(),
            }),
        },
        None => bail!(CompileError::RelativeRefWithoutBase {
            reference: reference.to_owned(),
        }),
    }
}

/// Splits a reference into its document part and optional fragment.
pub(crate) fn split_fragment(reference: &str) -> (&str, Option<&str>) {
    match reference.find('#') {
        Some(at) => (&reference[..at], Some(&reference[at + 1..])),
        None => (reference, None),
    }
}

/// Escapes a pointer segment per RFC 6901: `~` becomes `~0`, `/` becomes
/// `~1`.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Unescapes a pointer segment: `~1` back to `/`, `~0` back to `~`, then
/// percent-decoding for segments that traveled inside a URI fragment.
///
/// Stray `%` bytes that do not begin a valid escape are kept as-is, so
/// `unescape_segment(escape_segment(s)) == s` for any `s`.
pub fn unescape_segment(segment: &str) -> String {
    percent_decode(&segment.replace("~1", "/").replace("~0", "~"))
}

fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_owned();
    }

    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = [bytes[i + 1], bytes[i + 2]];
            let hex = std::str::from_utf8(&hex).expect("hex digits are ASCII");
            decoded.push(u8::from_str_radix(hex, 16).expect("hex digits parse"));
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(decoded).unwrap_or_else(|_| text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_round_trip() {
        for segment in ["plain", "a/b", "a~b", "~1", "a~0b", "50%", "%zz", ""] {
            assert_eq!(unescape_segment(&escape_segment(segment)), segment);
        }
    }

    #[test]
    fn percent_escapes_decode() {
        assert_eq!(unescape_segment("a%20b"), "a b");
        assert_eq!(unescape_segment("%7E"), "~");
        assert_eq!(unescape_segment("100%"), "100%");
    }

    #[test]
    fn tilde_order_matters() {
        // "~01" must decode to the literal "~1", not to "/".
        assert_eq!(unescape_segment("~01"), "~1");
        assert_eq!(escape_segment("/"), "~1");
        assert_eq!(escape_segment("~"), "~0");
    }

    #[test]
    fn relative_needs_base() {
        let base = Url::parse("http://example.com/root.json").unwrap();
        assert_eq!(
            resolve_against(Some(&base), "sub.json").unwrap().as_str(),
            "http://example.com/sub.json"
        );
        assert!(resolve_against(None, "sub.json").is_err());
        assert_eq!(
            resolve_against(None, "json-ir://types/form").unwrap().as_str(),
            "json-ir://types/form"
        );
    }

    #[test]
    fn scheme_extraction() {
        assert_eq!(scheme_of("json-ir://types/form"), Some("json-ir".into()));
        assert_eq!(scheme_of("http://example.com"), Some("http".into()));
        assert_eq!(scheme_of("some-relative"), None);
    }
}
