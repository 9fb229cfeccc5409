//! The ordered block-start matchers that open new containers and leaves
//! on each line, plus the list marker parser they share. The order of
//! `STARTS` is load bearing: a thematic break must be tried before a
//! list item, a setext underline before a thematic break, and so on.

use crate::common;
use crate::parser::{Parser, CODE_INDENT};
use crate::tree::{CodeData, Delimiter, Fence, Kind, ListData, ListType, NodeId, SourcePos};
use regex::Regex;

/// Result of a block-start matcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BlockStart {
    NoMatch,
    /// Opened a container; keep trying more starts on this line.
    Container,
    /// Opened a leaf; no more starts apply.
    Leaf,
}

type StartFn = fn(&mut Parser, NodeId) -> BlockStart;

/// The start matchers in the order they must be tried.
pub(crate) const STARTS: &[StartFn] = &[
    block_quote,
    atx_heading,
    fenced_code_block,
    html_block,
    setext_heading,
    thematic_break,
    list_item,
    indented_code_block,
];

lazy_static! {
    /// Opening patterns for HTML block types 1 through 7; index 0 unused.
    pub(crate) static ref HTML_BLOCK_OPEN: Vec<Regex> = vec![
        Regex::new("^$").unwrap(),
        Regex::new(r"(?i)^<(?:script|pre|style)(?:\s|>|$)").unwrap(),
        Regex::new(r"^<!--").unwrap(),
        Regex::new(r"^<\?").unwrap(),
        Regex::new(r"^<![A-Z]").unwrap(),
        Regex::new(r"^<!\[CDATA\[").unwrap(),
        Regex::new(
            r"(?i)^</?(?:address|article|aside|base|basefont|blockquote|body|caption|center|col|colgroup|dd|details|dialog|dir|div|dl|dt|fieldset|figcaption|figure|footer|form|frame|frameset|h1|head|header|hr|html|iframe|legend|li|link|main|menu|menuitem|meta|nav|noframes|ol|optgroup|option|p|param|section|source|title|summary|table|tbody|td|tfoot|th|thead|tr|track|ul)(?:\s|/?>|$)"
        )
        .unwrap(),
        Regex::new(&format!(
            r"(?i)^(?:{}|{})\s*$",
            &*common::OPEN_TAG,
            &*common::CLOSE_TAG
        ))
        .unwrap(),
    ];

    /// Closing patterns for HTML block types 1 through 5; index 0 unused.
    /// Types 6 and 7 close on a blank line instead.
    pub(crate) static ref HTML_BLOCK_CLOSE: Vec<Regex> = vec![
        Regex::new("^$").unwrap(),
        Regex::new(r"(?i)</(?:script|pre|style)>").unwrap(),
        Regex::new(r"-->").unwrap(),
        Regex::new(r"\?>").unwrap(),
        Regex::new(r">").unwrap(),
        Regex::new(r"\]\]>").unwrap(),
    ];

    static ref ATX_HEADING_MARKER: Regex = Regex::new(r"^#{1,6}(?: +|$)").unwrap();
    static ref ATX_ONLY_HASHES: Regex = Regex::new(r"^ *#+ *$").unwrap();
    static ref ATX_TRAILING_HASHES: Regex = Regex::new(r" +#+ *$").unwrap();
    static ref SETEXT_HEADING_LINE: Regex = Regex::new(r"^(?:=+|-+) *$").unwrap();
    static ref THEMATIC_BREAK: Regex =
        Regex::new(r"^(?:(?:\* *){3,}|(?:_ *){3,}|(?:- *){3,}) *$").unwrap();
    static ref BULLET_LIST_MARKER: Regex = Regex::new(r"^[*+-]").unwrap();
    static ref ORDERED_LIST_MARKER: Regex = Regex::new(r"^(\d{1,9})([.)])").unwrap();
}

fn block_quote(p: &mut Parser, _container: NodeId) -> BlockStart {
    if !p.indented && p.peek_at(p.next_nonspace) == Some(b'>') {
        p.advance_next_nonspace();
        p.advance_offset(1, false);
        // An optional space may follow the marker.
        if p.peek_at(p.offset) == Some(b' ') {
            p.advance_offset(1, false);
        }
        p.close_unmatched_blocks();
        p.add_child(Kind::BlockQuote, p.next_nonspace);
        BlockStart::Container
    } else {
        BlockStart::NoMatch
    }
}

fn atx_heading(p: &mut Parser, _container: NodeId) -> BlockStart {
    if p.indented {
        return BlockStart::NoMatch;
    }
    let (marker_len, level) = match ATX_HEADING_MARKER.find(&p.current_line[p.next_nonspace..]) {
        Some(m) => (m.end(), m.as_str().trim().len() as u32),
        None => return BlockStart::NoMatch,
    };
    p.advance_next_nonspace();
    p.advance_offset(marker_len, false);
    p.close_unmatched_blocks();
    let heading = p.add_child(Kind::Heading(level), p.next_nonspace);

    // The heading text is the rest of the line minus any closing hashes.
    let text = {
        let rest = &p.current_line[p.offset..];
        if ATX_ONLY_HASHES.is_match(rest) {
            String::new()
        } else {
            ATX_TRAILING_HASHES.replace(rest, "").into_owned()
        }
    };
    p.tree.get_mut(heading).content = Some(text);
    let remaining = p.current_line.len() - p.offset;
    p.advance_offset(remaining, false);
    BlockStart::Leaf
}

fn fenced_code_block(p: &mut Parser, _container: NodeId) -> BlockStart {
    if p.indented {
        return BlockStart::NoMatch;
    }
    let fence = {
        let rest = p.current_line[p.next_nonspace..].as_bytes();
        let ch = match rest.first().copied() {
            Some(c) if c == b'`' || c == b'~' => c,
            _ => return BlockStart::NoMatch,
        };
        let length = rest.iter().take_while(|&&b| b == ch).count();
        if length < 3 {
            return BlockStart::NoMatch;
        }
        // The rest of the line may not contain the fence character.
        if rest[length..].iter().any(|&b| b == ch) {
            return BlockStart::NoMatch;
        }
        Fence {
            ch: ch as char,
            length,
            offset: p.indent,
        }
    };
    p.close_unmatched_blocks();
    p.add_child(
        Kind::CodeBlock(CodeData {
            fence: Some(fence),
            info: String::new(),
        }),
        p.next_nonspace,
    );
    p.advance_next_nonspace();
    p.advance_offset(fence.length, false);
    BlockStart::Leaf
}

fn html_block(p: &mut Parser, container: NodeId) -> BlockStart {
    if p.indented || p.peek_at(p.next_nonspace) != Some(b'<') {
        return BlockStart::NoMatch;
    }
    let container_is_paragraph = matches!(p.tree.get(container).kind, Kind::Paragraph);
    let block_type = {
        let s = &p.current_line[p.next_nonspace..];
        (1..=7_usize)
            .find(|&t| HTML_BLOCK_OPEN[t].is_match(s) && (t < 7 || !container_is_paragraph))
    };
    match block_type {
        Some(html_type) => {
            p.close_unmatched_blocks();
            // The offset is not advanced: leading spaces belong to the
            // HTML block content.
            p.add_child(Kind::HtmlBlock(html_type as u8), p.offset);
            BlockStart::Leaf
        }
        None => BlockStart::NoMatch,
    }
}

fn setext_heading(p: &mut Parser, container: NodeId) -> BlockStart {
    if p.indented || !matches!(p.tree.get(container).kind, Kind::Paragraph) {
        return BlockStart::NoMatch;
    }
    if !SETEXT_HEADING_LINE.is_match(&p.current_line[p.next_nonspace..]) {
        return BlockStart::NoMatch;
    }
    p.close_unmatched_blocks();

    // Replace the paragraph with a heading at the same tree position,
    // carrying over the accumulated text.
    let level = if p.peek_at(p.next_nonspace) == Some(b'=') {
        1
    } else {
        2
    };
    let start = p.tree.get(container).pos.start;
    let heading = p.tree.new_node(
        Kind::Heading(level),
        SourcePos {
            start,
            end: (0, 0),
        },
    );
    let text = p.tree.get_mut(container).content.take();
    p.tree.get_mut(heading).content = text;
    p.tree.insert_after(container, heading);
    p.tree.unlink(container);
    p.tip = heading;

    let remaining = p.current_line.len() - p.offset;
    p.advance_offset(remaining, false);
    BlockStart::Leaf
}

fn thematic_break(p: &mut Parser, _container: NodeId) -> BlockStart {
    if p.indented || !THEMATIC_BREAK.is_match(&p.current_line[p.next_nonspace..]) {
        return BlockStart::NoMatch;
    }
    p.close_unmatched_blocks();
    p.add_child(Kind::ThematicBreak, p.next_nonspace);
    let remaining = p.current_line.len() - p.offset;
    p.advance_offset(remaining, false);
    BlockStart::Leaf
}

fn list_item(p: &mut Parser, container: NodeId) -> BlockStart {
    let container_is_list = matches!(p.tree.get(container).kind, Kind::List(_));
    if p.indented && !container_is_list {
        return BlockStart::NoMatch;
    }
    let data = match parse_list_marker(p) {
        Some(data) => data,
        None => return BlockStart::NoMatch,
    };
    p.close_unmatched_blocks();

    // Open a new list unless the marker continues the one at the tip.
    let tip_is_list = matches!(p.tree.get(p.tip).kind, Kind::List(_));
    let continues = match &p.tree.get(container).kind {
        Kind::List(existing) | Kind::Item(existing) => lists_match(existing, &data),
        _ => false,
    };
    if !tip_is_list || !continues {
        p.add_child(Kind::List(data.clone()), p.next_nonspace);
    }
    p.add_child(Kind::Item(data), p.next_nonspace);
    BlockStart::Container
}

fn indented_code_block(p: &mut Parser, _container: NodeId) -> BlockStart {
    if !p.indented || matches!(p.tree.get(p.tip).kind, Kind::Paragraph) || p.blank {
        return BlockStart::NoMatch;
    }
    p.advance_offset(CODE_INDENT, true);
    p.close_unmatched_blocks();
    p.add_child(
        Kind::CodeBlock(CodeData {
            fence: None,
            info: String::new(),
        }),
        p.offset,
    );
    BlockStart::Leaf
}

/// Two markers belong to the same list when the type, delimiter and
/// bullet character all agree.
fn lists_match(a: &ListData, b: &ListData) -> bool {
    a.list_type == b.list_type && a.delimiter == b.delimiter && a.bullet_char == b.bullet_char
}

/// Parse a list marker at `next_nonspace`, advancing the cursor past the
/// marker and its padding. Returns `None` when there is no marker.
pub(crate) fn parse_list_marker(p: &mut Parser) -> Option<ListData> {
    let (marker_len, list_type, bullet_char, start, delimiter) = {
        let rest = &p.current_line[p.next_nonspace..];
        if let Some(m) = BULLET_LIST_MARKER.find(rest) {
            (
                m.end(),
                ListType::Bullet,
                Some(rest.as_bytes()[0] as char),
                None,
                None,
            )
        } else if let Some(caps) = ORDERED_LIST_MARKER.captures(rest) {
            let start = caps[1].parse::<u32>().ok()?;
            let delimiter = if &caps[2] == "." {
                Delimiter::Period
            } else {
                Delimiter::Paren
            };
            (
                caps[0].len(),
                ListType::Ordered,
                None,
                Some(start),
                Some(delimiter),
            )
        } else {
            return None;
        }
    };

    // The marker must be followed by a space, a tab or the end of line.
    match p.peek_at(p.next_nonspace + marker_len) {
        None | Some(b' ') | Some(b'\t') => {}
        Some(_) => return None,
    }

    let marker_offset = p.indent;
    p.advance_next_nonspace();
    p.advance_offset(marker_len, true);

    // Measure the spaces after the marker to find the content column.
    let spaces_start_col = p.column;
    let spaces_start_offset = p.offset;
    loop {
        p.advance_offset(1, true);
        let next = p.peek_at(p.offset);
        if p.column - spaces_start_col < 5 && matches!(next, Some(b' ') | Some(b'\t')) {
            continue;
        }
        break;
    }
    let blank_item = p.peek_at(p.offset).is_none();
    let spaces_after_marker = p.column - spaces_start_col;

    let padding = if spaces_after_marker >= 5 || spaces_after_marker == 0 || blank_item {
        // Five or more spaces, none at all, or nothing after the marker:
        // content sits one column past the marker, and at most a single
        // space is consumed.
        p.column = spaces_start_col;
        p.offset = spaces_start_offset;
        if p.peek_at(p.offset) == Some(b' ') {
            p.advance_offset(1, true);
        }
        marker_len + 1
    } else {
        marker_len + spaces_after_marker
    };

    Some(ListData {
        list_type,
        bullet_char,
        start,
        delimiter,
        padding,
        marker_offset,
        tight: true,
    })
}
