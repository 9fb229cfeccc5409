//! Shared string utilities: the escapable punctuation set, HTML tag
//! shapes, backslash/entity unescaping and link label normalization.

use regex::{Captures, Regex};

/// Character class of punctuation a backslash may escape.
pub(crate) const ESCAPABLE: &str = r##"[!"#$%&'()*+,./:;<=>?@\[\]\\^_`{|}~-]"##;

/// An HTML entity reference, named or numeric.
pub(crate) const ENTITY: &str = "&(?:#[Xx][0-9A-Fa-f]{1,8}|#[0-9]{1,8}|[A-Za-z][A-Za-z0-9]{1,31});";

const TAG_NAME: &str = "[A-Za-z][A-Za-z0-9-]*";
const ATTRIBUTE_NAME: &str = "[a-zA-Z_:][a-zA-Z0-9:._-]*";
const UNQUOTED_VALUE: &str = "[^\"'=<>`\\x00-\\x20]+";
const SINGLE_QUOTED_VALUE: &str = "'[^']*'";
const DOUBLE_QUOTED_VALUE: &str = "\"[^\"]*\"";

lazy_static! {
    /// An HTML open tag, attributes included.
    pub(crate) static ref OPEN_TAG: String = {
        let value = format!(
            "(?:{}|{}|{})",
            UNQUOTED_VALUE, SINGLE_QUOTED_VALUE, DOUBLE_QUOTED_VALUE
        );
        let value_spec = format!("(?:\\s*=\\s*{})", value);
        let attribute = format!("(?:\\s+{}{}?)", ATTRIBUTE_NAME, value_spec);
        format!("<{}{}*\\s*/?>", TAG_NAME, attribute)
    };

    /// An HTML close tag.
    pub(crate) static ref CLOSE_TAG: String = format!("</{}\\s*>", TAG_NAME);

    static ref BACKSLASH_OR_ENTITY: Regex =
        Regex::new(&format!(r"\\{}|{}", ESCAPABLE, ENTITY)).unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Replace backslash escapes and HTML entities with their literal values.
pub(crate) fn unescape_string(s: &str) -> String {
    if !s.contains('\\') && !s.contains('&') {
        return s.to_string();
    }
    BACKSLASH_OR_ENTITY
        .replace_all(s, |caps: &Captures| {
            let m = &caps[0];
            if let Some(escaped) = m.strip_prefix('\\') {
                escaped.to_string()
            } else {
                decode_entity(m)
            }
        })
        .into_owned()
}

/// Decode a single entity reference, keeping it literal when invalid.
/// A decoded NUL is not allowed through and becomes U+FFFD.
fn decode_entity(entity: &str) -> String {
    match htmlescape::decode_html(entity) {
        Ok(decoded) => {
            if decoded.contains('\u{0}') {
                decoded.replace('\u{0}', "\u{FFFD}")
            } else {
                decoded
            }
        }
        Err(_) => entity.to_string(),
    }
}

/// Normalize a link label: trim, collapse whitespace runs, case fold.
pub(crate) fn normalize_label(label: &str) -> String {
    WHITESPACE_RUN
        .replace_all(label.trim(), " ")
        .to_lowercase()
}

/// Returns true if the string contains only space characters.
pub(crate) fn is_blank(s: &str) -> bool {
    s.bytes()
        .all(|b| matches!(b, b' ' | b'\t' | 0x0b | 0x0c | b'\r' | b'\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_backslash_escapes() {
        assert_eq!(unescape_string(r"a\*b\\c"), r"a*b\c");
        // A backslash before a non-escapable character stays.
        assert_eq!(unescape_string(r"a\qb"), r"a\qb");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(unescape_string("a&amp;b"), "a&b");
        assert_eq!(unescape_string("&#65;"), "A");
        assert_eq!(unescape_string("&#x41;"), "A");
    }

    #[test]
    fn keeps_invalid_entities_literal() {
        assert_eq!(unescape_string("a &notarealentityname12345678; b"),
                   "a &notarealentityname12345678; b");
        assert_eq!(unescape_string("fish & chips"), "fish & chips");
    }

    #[test]
    fn normalizes_labels() {
        assert_eq!(normalize_label("  Foo   Bar\n baz "), "foo bar baz");
        assert_eq!(normalize_label("ABC"), "abc");
        assert_eq!(normalize_label("   "), "");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" \t "));
        assert!(!is_blank(" a "));
    }
}
