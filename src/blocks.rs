//! Per-kind block behavior: how each kind continues across lines and
//! what happens to it when it is finalized.

use crate::common;
use crate::parser::{Parser, CODE_INDENT};
use crate::refs;
use crate::tree::{Fence, Kind, NodeId, Tree};
use regex::Regex;

/// Result of asking an open block whether the current line continues it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BlockContinue {
    /// The line continues this block.
    Matched,
    /// The line does not continue this block; it should be closed.
    Unmatched,
    /// The block consumed the entire line (closing code fence).
    Consumed,
}

/// Continuation rule for `container` against the current line.
pub(crate) fn continue_block(p: &mut Parser, container: NodeId) -> BlockContinue {
    enum Rule {
        Matched,
        Unmatched,
        Quote,
        Item(usize),
        Fenced(Fence),
        Indented,
        Html(u8),
        Paragraph,
    }

    let rule = match &p.tree.get(container).kind {
        Kind::Document | Kind::List(_) => Rule::Matched,
        Kind::BlockQuote => Rule::Quote,
        Kind::Item(data) => Rule::Item(data.marker_offset + data.padding),
        Kind::Heading(_) | Kind::ThematicBreak => Rule::Unmatched,
        Kind::CodeBlock(code) => match code.fence {
            Some(fence) => Rule::Fenced(fence),
            None => Rule::Indented,
        },
        Kind::HtmlBlock(html_type) => Rule::Html(*html_type),
        Kind::Paragraph => Rule::Paragraph,
    };

    match rule {
        Rule::Matched => BlockContinue::Matched,
        Rule::Unmatched => BlockContinue::Unmatched,
        Rule::Quote => continue_block_quote(p),
        Rule::Item(content_indent) => continue_item(p, container, content_indent),
        Rule::Fenced(fence) => continue_fenced_code(p, container, fence),
        Rule::Indented => continue_indented_code(p),
        Rule::Html(html_type) => {
            if p.blank && (html_type == 6 || html_type == 7) {
                BlockContinue::Unmatched
            } else {
                BlockContinue::Matched
            }
        }
        Rule::Paragraph => {
            if p.blank {
                BlockContinue::Unmatched
            } else {
                BlockContinue::Matched
            }
        }
    }
}

fn continue_block_quote(p: &mut Parser) -> BlockContinue {
    if !p.indented && p.peek_at(p.next_nonspace) == Some(b'>') {
        p.advance_next_nonspace();
        p.advance_offset(1, false);
        // An optional space may follow the marker.
        if p.peek_at(p.offset) == Some(b' ') {
            p.advance_offset(1, false);
        }
        BlockContinue::Matched
    } else {
        BlockContinue::Unmatched
    }
}

fn continue_item(p: &mut Parser, container: NodeId, content_indent: usize) -> BlockContinue {
    if p.blank {
        if p.tree.get(container).first_child.is_none() {
            // A blank line cannot continue an item with no content yet.
            return BlockContinue::Unmatched;
        }
        p.advance_next_nonspace();
    } else if p.indent >= content_indent {
        p.advance_offset(content_indent, true);
    } else {
        return BlockContinue::Unmatched;
    }
    BlockContinue::Matched
}

fn continue_fenced_code(p: &mut Parser, container: NodeId, fence: Fence) -> BlockContinue {
    let closes = p.indent <= 3 && p.peek_at(p.next_nonspace) == Some(fence.ch as u8) && {
        let rest = p.current_line[p.next_nonspace..].as_bytes();
        let run = rest.iter().take_while(|&&b| b == fence.ch as u8).count();
        run >= fence.length && rest[run..].iter().all(|&b| b == b' ')
    };
    if closes {
        // Closing fence: the line is fully consumed.
        let line = p.line_number;
        p.finalize(container, line);
        return BlockContinue::Consumed;
    }

    // Skip up to `fence.offset` leading spaces of the content.
    let mut remaining = fence.offset;
    while remaining > 0 && p.peek_at(p.offset) == Some(b' ') {
        p.advance_offset(1, false);
        remaining -= 1;
    }
    BlockContinue::Matched
}

fn continue_indented_code(p: &mut Parser) -> BlockContinue {
    if p.indent >= CODE_INDENT {
        p.advance_offset(CODE_INDENT, true);
    } else if p.blank {
        p.advance_next_nonspace();
    } else {
        return BlockContinue::Unmatched;
    }
    BlockContinue::Matched
}

lazy_static! {
    static ref TRAILING_BLANK_LINES: Regex = Regex::new(r"(?:\n *)+$").unwrap();
}

/// Kind-specific post-processing when `block` closes.
pub(crate) fn finalize_block(p: &mut Parser, block: NodeId) {
    if matches!(p.tree.get(block).kind, Kind::List(_)) {
        finalize_list(&mut p.tree, block);
    } else if matches!(p.tree.get(block).kind, Kind::CodeBlock(_)) {
        finalize_code_block(&mut p.tree, block);
    } else if matches!(p.tree.get(block).kind, Kind::HtmlBlock(_)) {
        finalize_html_block(&mut p.tree, block);
    } else if matches!(p.tree.get(block).kind, Kind::Paragraph) {
        finalize_paragraph(p, block);
    }
}

/// A list is loose when any of its items is separated from the next by a
/// blank line, or when any block inside a non-final position of an item
/// ends with one.
fn finalize_list(tree: &mut Tree, block: NodeId) {
    let mut tight = true;
    let mut item = tree.get(block).first_child;
    'items: while let Some(it) = item {
        if ends_with_blank_line(tree, it) && tree.get(it).next.is_some() {
            tight = false;
            break;
        }
        let mut sub = tree.get(it).first_child;
        while let Some(s) = sub {
            if ends_with_blank_line(tree, s)
                && (tree.get(it).next.is_some() || tree.get(s).next.is_some())
            {
                tight = false;
                break 'items;
            }
            sub = tree.get(s).next;
        }
        item = tree.get(it).next;
    }
    if !tight {
        if let Kind::List(data) = &mut tree.get_mut(block).kind {
            data.tight = false;
        }
    }
}

fn finalize_code_block(tree: &mut Tree, block: NodeId) {
    let content = tree.get_mut(block).content.take().unwrap_or_default();
    let fenced = matches!(&tree.get(block).kind, Kind::CodeBlock(data) if data.is_fenced());
    if fenced {
        // The first line is the info string, the rest is the body.
        let newline = content.find('\n').unwrap_or_else(|| content.len());
        let info = common::unescape_string(content[..newline].trim());
        let rest = if newline < content.len() {
            &content[newline + 1..]
        } else {
            ""
        };
        let node = tree.get_mut(block);
        if let Kind::CodeBlock(data) = &mut node.kind {
            data.info = info;
        }
        node.literal = rest.to_string();
    } else {
        tree.get_mut(block).literal = TRAILING_BLANK_LINES.replace(&content, "\n").into_owned();
    }
}

fn finalize_html_block(tree: &mut Tree, block: NodeId) {
    let content = tree.get_mut(block).content.take().unwrap_or_default();
    tree.get_mut(block).literal = TRAILING_BLANK_LINES.replace(&content, "").into_owned();
}

/// Peel link reference definitions off the front of the paragraph. If
/// nothing but definitions was there, the paragraph disappears.
fn finalize_paragraph(p: &mut Parser, block: NodeId) {
    let mut content = match p.tree.get_mut(block).content.take() {
        Some(content) => content,
        None => return,
    };
    let mut has_reference_defs = false;
    while content.starts_with('[') {
        let consumed = refs::parse_reference(&content, &mut p.tree.refs);
        if consumed == 0 {
            break;
        }
        content.drain(..consumed);
        has_reference_defs = true;
    }
    let empty = has_reference_defs && common::is_blank(&content);
    p.tree.get_mut(block).content = Some(content);
    if empty {
        p.tree.unlink(block);
    }
}

/// Whether `block` ends with a blank line, descending into the last
/// child of lists and items.
fn ends_with_blank_line(tree: &Tree, start: NodeId) -> bool {
    let mut block = Some(start);
    while let Some(id) = block {
        let node = tree.get(id);
        if node.last_line_blank {
            return true;
        }
        if matches!(node.kind, Kind::List(_) | Kind::Item(_)) {
            block = node.last_child;
        } else {
            break;
        }
    }
    false
}
