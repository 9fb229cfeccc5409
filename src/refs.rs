//! The link reference definition map and the scanner that peels
//! definitions off the front of a closing paragraph.

use crate::common;
use regex::Regex;
use std::collections::HashMap;

/// A single link reference definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefDef {
    pub destination: String,
    pub title: String,
}

/// Map from normalized link label to its first definition.
#[derive(Clone, Debug, Default)]
pub struct RefMap {
    map: HashMap<String, RefDef>,
}

impl RefMap {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Look up a definition by raw label. The label is normalized the
    /// same way definitions are keyed.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&RefDef> {
        self.map.get(&common::normalize_label(label))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The first definition for a label wins; later ones are ignored.
    fn insert(&mut self, label: String, def: RefDef) {
        self.map.entry(label).or_insert(def);
    }
}

lazy_static! {
    static ref LINK_LABEL: Regex = Regex::new(r"^\[(?:[^\\\[\]]|\\.){0,1000}\]").unwrap();
    static ref SPNL: Regex = Regex::new(r"^ *(?:\n *)?").unwrap();
    static ref SPACE_AT_EOL: Regex = Regex::new(r"^ *(?:\n|$)").unwrap();
    static ref LINK_TITLE: Regex = Regex::new(&format!(
        r#"^(?:"(?:\\{esc}|[^"\x00])*"|'(?:\\{esc}|[^'\x00])*'|\((?:\\{esc}|[^)\x00])*\))"#,
        esc = common::ESCAPABLE
    ))
    .unwrap();
}

/// Try to parse a single link reference definition from the start of
/// `src`. On success the definition is recorded (first writer wins) and
/// the number of bytes consumed is returned; `0` means no definition.
pub(crate) fn parse_reference(src: &str, refs: &mut RefMap) -> usize {
    let mut s = Scanner::new(src);

    let raw_label = match s.link_label() {
        Some(label) => label,
        None => return 0,
    };
    if s.peek() != Some(b':') {
        return 0;
    }
    s.pos += 1;
    s.spnl();

    let destination = match s.link_destination() {
        Some(dest) if !dest.is_empty() => dest,
        _ => return 0,
    };

    let before_title = s.pos;
    s.spnl();
    let mut title = match s.link_title() {
        Some(title) => title,
        None => {
            s.pos = before_title;
            String::new()
        }
    };

    // The definition must be alone on its line; a title that leaves
    // trailing garbage is dropped and the destination line re-checked.
    let mut at_line_end = true;
    if !s.space_to_eol() {
        if title.is_empty() {
            at_line_end = false;
        } else {
            title.clear();
            s.pos = before_title;
            at_line_end = s.space_to_eol();
        }
    }
    if !at_line_end {
        return 0;
    }

    let label = common::normalize_label(raw_label);
    if label.is_empty() {
        return 0;
    }
    refs.insert(label, RefDef { destination, title });
    s.pos
}

/// Cursor over a paragraph buffer while scanning a definition.
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    /// Advance over `re` if it matches at the cursor.
    fn eat(&mut self, re: &Regex) -> bool {
        match re.find(self.rest()) {
            Some(m) => {
                self.pos += m.end();
                true
            }
            None => false,
        }
    }

    /// Zero or more spaces with at most one newline.
    fn spnl(&mut self) {
        self.eat(&SPNL);
    }

    /// Spaces up to the end of the current line, consuming its newline.
    fn space_to_eol(&mut self) -> bool {
        self.eat(&SPACE_AT_EOL)
    }

    /// A bracketed link label; returns the text between the brackets.
    fn link_label(&mut self) -> Option<&'a str> {
        let m = LINK_LABEL.find(self.rest())?;
        let raw = &self.rest()[1..m.end() - 1];
        self.pos += m.end();
        Some(raw)
    }

    /// A link destination, either `<...>` or a run of non-space
    /// characters with balanced parentheses.
    fn link_destination(&mut self) -> Option<String> {
        let bytes = self.src.as_bytes();
        if self.peek() == Some(b'<') {
            let mut i = self.pos + 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'>' => {
                        let raw = &self.src[self.pos + 1..i];
                        self.pos = i + 1;
                        return Some(common::unescape_string(raw));
                    }
                    b'<' | b'\n' => return None,
                    b'\\' => i += 2,
                    _ => i += 1,
                }
            }
            None
        } else {
            let start = self.pos;
            let mut parens = 0_usize;
            let mut i = self.pos;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' if i + 1 < bytes.len() && bytes[i + 1].is_ascii_punctuation() => i += 2,
                    b'(' => {
                        parens += 1;
                        i += 1;
                    }
                    b')' => {
                        if parens == 0 {
                            break;
                        }
                        parens -= 1;
                        i += 1;
                    }
                    c if c <= b' ' || c == 0x7f => break,
                    _ => i += 1,
                }
            }
            if i == start || parens != 0 {
                return None;
            }
            let raw = &self.src[start..i];
            self.pos = i;
            Some(common::unescape_string(raw))
        }
    }

    /// A quoted or parenthesized link title.
    fn link_title(&mut self) -> Option<String> {
        let m = LINK_TITLE.find(self.rest())?;
        let raw = &self.rest()[1..m.end() - 1];
        let title = common::unescape_string(raw);
        self.pos += m.end();
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (usize, RefMap) {
        let mut refs = RefMap::new();
        let consumed = parse_reference(src, &mut refs);
        (consumed, refs)
    }

    #[test]
    fn bare_destination() {
        let (consumed, refs) = parse("[foo]: /url\n");
        assert_eq!(consumed, 12);
        let def = refs.get("foo").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title, "");
    }

    #[test]
    fn destination_with_title() {
        let (consumed, refs) = parse("[foo]: /url \"the title\"\nrest");
        assert_eq!(consumed, 24);
        let def = refs.get("foo").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title, "the title");
    }

    #[test]
    fn pointy_destination() {
        let (_, refs) = parse("[foo]: </my url>\n");
        assert_eq!(refs.get("foo").unwrap().destination, "/my url");
    }

    #[test]
    fn title_on_next_line() {
        let (consumed, refs) = parse("[foo]: /url\n'title'\n");
        assert_eq!(consumed, 20);
        assert_eq!(refs.get("foo").unwrap().title, "title");
    }

    #[test]
    fn trailing_garbage_after_title_rejects() {
        let (consumed, refs) = parse("[foo]: /url \"title\" extra\n");
        assert_eq!(consumed, 0);
        assert!(refs.is_empty());
    }

    #[test]
    fn garbage_after_bare_destination_rejects() {
        let (consumed, _) = parse("[foo]: /url extra\n");
        assert_eq!(consumed, 0);
    }

    #[test]
    fn missing_colon_rejects() {
        let (consumed, _) = parse("[foo] /url\n");
        assert_eq!(consumed, 0);
    }

    #[test]
    fn labels_are_normalized() {
        let (_, refs) = parse("[Foo   Bar]: /url\n");
        assert!(refs.get("foo bar").is_some());
        assert!(refs.get("FOO BAR").is_some());
    }

    #[test]
    fn first_definition_wins() {
        let mut refs = RefMap::new();
        let first = parse_reference("[a]: /one\n", &mut refs);
        assert!(first > 0);
        let second = parse_reference("[a]: /two\n", &mut refs);
        assert!(second > 0);
        assert_eq!(refs.get("a").unwrap().destination, "/one");
    }

    #[test]
    fn escapes_in_destination_and_title() {
        let (_, refs) = parse("[x]: /a\\(b \"t\\\"q\"\n");
        let def = refs.get("x").unwrap();
        assert_eq!(def.destination, "/a(b");
        assert_eq!(def.title, "t\"q");
    }
}
