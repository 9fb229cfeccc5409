//! The block parser. Parsing is line oriented: each line is first offered
//! to every open block on the spine from the document down to the tip,
//! then to the block-start matchers, and whatever text remains is
//! appended to the deepest open leaf. Blocks that fail to continue are
//! finalized, which is also where the retroactive decisions happen:
//! setext headings replace their paragraph, reference definitions are
//! peeled off closing paragraphs, and list tightness is computed.
//!
//! Offsets into the line are bytes; columns are expanded-tab columns
//! (tabs stop every 4). The two are tracked separately so that indented
//! content inside list items and block quotes measures correctly even
//! when a tab has to be split.

use crate::blocks::{self, BlockContinue};
use crate::starts::{self, BlockStart};
use crate::tree::{Kind, NodeId, SourcePos, Tree};
use regex::Regex;
use std::mem;
use std::time::Instant;

/// Number of columns that make a line indented code.
pub(crate) const CODE_INDENT: usize = 4;

lazy_static! {
    static ref LINE_ENDING: Regex = Regex::new(r"\r\n|\n|\r").unwrap();
    /// Characters that can begin a new block; anything else lets the
    /// start matchers be skipped for the line.
    static ref MAYBE_SPECIAL: Regex = Regex::new(r"^[#`~*+_=<>0-9-]").unwrap();
}

/// Parser configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    /// Smart punctuation; meaningful only to the inline pass and ignored
    /// here.
    pub smart: bool,
    /// Log timing information for each parse.
    pub time: bool,
    /// Whether downstream renderers use source positions. Positions are
    /// always computed regardless.
    pub sourcepos: bool,
}

/// The block parser. An instance may be reused for several documents,
/// but a single parse is not reentrant.
pub struct Parser {
    pub(crate) tree: Tree,
    pub(crate) doc: NodeId,
    pub(crate) tip: NodeId,
    pub(crate) oldtip: NodeId,
    pub(crate) current_line: String,
    pub(crate) line_number: usize,
    pub(crate) offset: usize,
    pub(crate) column: usize,
    pub(crate) next_nonspace: usize,
    pub(crate) next_nonspace_column: usize,
    pub(crate) indent: usize,
    pub(crate) indented: bool,
    pub(crate) blank: bool,
    pub(crate) all_closed: bool,
    pub(crate) last_matched_container: NodeId,
    pub(crate) last_line_length: usize,
    options: Options,
}

impl Parser {
    #[must_use]
    pub fn new(options: Options) -> Self {
        let tree = Tree::new();
        let doc = tree.document();
        Self {
            tree,
            doc,
            tip: doc,
            oldtip: doc,
            current_line: String::new(),
            line_number: 0,
            offset: 0,
            column: 0,
            next_nonspace: 0,
            next_nonspace_column: 0,
            indent: 0,
            indented: false,
            blank: false,
            all_closed: true,
            last_matched_container: doc,
            last_line_length: 0,
            options,
        }
    }

    /// Parse `input` into a block tree. The parser resets itself first,
    /// so an instance can be reused across documents.
    pub fn parse(&mut self, input: &str) -> Tree {
        let started = Instant::now();
        self.reset();

        let lines: Vec<&str> = LINE_ENDING.split(input).collect();
        let mut count = lines.len();
        if input.ends_with('\n') {
            // The final newline opens no new line.
            count -= 1;
        }
        for line in &lines[..count] {
            self.incorporate_line(line);
        }
        loop {
            let tip = self.tip;
            self.finalize(tip, count);
            if tip == self.doc {
                break;
            }
        }
        self.process_content();

        if self.options.time {
            log::debug!("parsed {} lines in {:?}", count, started.elapsed());
        }
        mem::replace(&mut self.tree, Tree::new())
    }

    fn reset(&mut self) {
        self.tree = Tree::new();
        self.doc = self.tree.document();
        self.tip = self.doc;
        self.oldtip = self.doc;
        self.current_line = String::new();
        self.line_number = 0;
        self.offset = 0;
        self.column = 0;
        self.next_nonspace = 0;
        self.next_nonspace_column = 0;
        self.indent = 0;
        self.indented = false;
        self.blank = false;
        self.all_closed = true;
        self.last_matched_container = self.doc;
        self.last_line_length = 0;
    }

    //#region scanner

    pub(crate) fn peek_at(&self, pos: usize) -> Option<u8> {
        self.current_line.as_bytes().get(pos).copied()
    }

    /// Locate the next non-space character and derive the line's blank
    /// and indentation state from it.
    pub(crate) fn find_next_nonspace(&mut self) {
        let bytes = self.current_line.as_bytes();
        let mut i = self.offset;
        let mut cols = self.column;
        loop {
            match bytes.get(i) {
                Some(b' ') => {
                    i += 1;
                    cols += 1;
                }
                Some(b'\t') => {
                    i += 1;
                    cols += 4 - (cols % 4);
                }
                _ => break,
            }
        }
        self.blank = i >= bytes.len();
        self.next_nonspace = i;
        self.next_nonspace_column = cols;
        self.indent = self.next_nonspace_column - self.column;
        self.indented = self.indent >= CODE_INDENT;
    }

    /// Jump the cursor to the precomputed next non-space.
    pub(crate) fn advance_next_nonspace(&mut self) {
        self.offset = self.next_nonspace;
        self.column = self.next_nonspace_column;
    }

    /// Advance the cursor by `count` columns (or byte positions when
    /// `columns` is false). A tab may be split: the offset then moves a
    /// single byte while the column jumps to the next tab stop, consuming
    /// the corresponding portion of `count`.
    pub(crate) fn advance_offset(&mut self, count: usize, columns: bool) {
        let mut remaining = count;
        while remaining > 0 {
            match self.current_line.as_bytes().get(self.offset) {
                Some(b'\t') => {
                    let chars_to_tab = 4 - (self.column % 4);
                    self.column += chars_to_tab;
                    self.offset += 1;
                    remaining = if columns {
                        remaining.saturating_sub(chars_to_tab)
                    } else {
                        remaining - 1
                    };
                }
                Some(_) => {
                    self.offset += 1;
                    self.column += 1;
                    remaining -= 1;
                }
                None => break,
            }
        }
    }

    //#endregion

    /// Analyze one line of input and update the tree.
    fn incorporate_line(&mut self, line: &str) {
        let mut all_matched = true;
        let mut container = self.doc;
        self.oldtip = self.tip;
        self.offset = 0;
        self.column = 0;
        self.line_number += 1;

        // Replace NUL characters for security.
        self.current_line = if line.contains('\u{0}') {
            line.replace('\u{0}', "\u{FFFD}")
        } else {
            line.to_string()
        };

        // Phase 1: offer the line to every open block down the spine. On
        // failure `container` ends at the last matching block.
        loop {
            let child = match self.tree.get(container).last_child {
                Some(c) if self.tree.get(c).is_open() => c,
                _ => break,
            };
            container = child;
            self.find_next_nonspace();
            match blocks::continue_block(self, container) {
                BlockContinue::Matched => {}
                BlockContinue::Unmatched => all_matched = false,
                BlockContinue::Consumed => {
                    // A closing code fence swallowed the whole line.
                    self.last_line_length = self.current_line.len();
                    return;
                }
            }
            if !all_matched {
                container = self
                    .tree
                    .get(container)
                    .parent
                    .expect("open spine extends above the document");
                break;
            }
        }

        self.all_closed = container == self.oldtip;
        self.last_matched_container = container;

        // A second blank line in a row breaks out of all lists.
        if self.blank && self.tree.get(container).last_line_blank {
            self.break_out_of_lists(container);
            container = self.tip;
        }

        let mut matched_leaf = {
            let kind = &self.tree.get(container).kind;
            !matches!(kind, Kind::Paragraph) && kind.accepts_lines()
        };

        // Phase 2: unless the matched block is a verbatim leaf, look for
        // new block starts.
        while !matched_leaf {
            self.find_next_nonspace();

            // Performance shortcut: no block can start on this line.
            if !self.indented && !MAYBE_SPECIAL.is_match(&self.current_line[self.next_nonspace..]) {
                self.advance_next_nonspace();
                break;
            }

            let mut matched = false;
            for start in starts::STARTS {
                match start(self, container) {
                    BlockStart::Container => {
                        container = self.tip;
                        matched = true;
                        break;
                    }
                    BlockStart::Leaf => {
                        container = self.tip;
                        matched_leaf = true;
                        matched = true;
                        break;
                    }
                    BlockStart::NoMatch => {}
                }
            }
            if !matched {
                self.advance_next_nonspace();
                break;
            }
        }

        // Phase 3: place what remains of the line.
        if !self.all_closed && !self.blank && matches!(self.tree.get(self.tip).kind, Kind::Paragraph)
        {
            // Lazy continuation of a paragraph across an unmatched spine.
            self.add_line();
        } else {
            self.close_unmatched_blocks();
            if self.blank {
                if let Some(last) = self.tree.get(container).last_child {
                    self.tree.get_mut(last).last_line_blank = true;
                }
            }

            // Blank lines inside a block quote or a fenced code block do
            // not count, and neither does the blank tail of an empty item
            // opened on this very line.
            let last_line_blank = self.blank && {
                let node = self.tree.get(container);
                !(matches!(node.kind, Kind::BlockQuote)
                    || matches!(&node.kind, Kind::CodeBlock(data) if data.is_fenced())
                    || (matches!(node.kind, Kind::Item(_))
                        && node.first_child.is_none()
                        && node.pos.start.0 == self.line_number))
            };
            let mut up = Some(container);
            while let Some(id) = up {
                self.tree.get_mut(id).last_line_blank = last_line_blank;
                up = self.tree.get(id).parent;
            }

            if self.tree.get(container).kind.accepts_lines() {
                self.add_line();
                // HTML blocks of types 1 through 5 can end mid-document
                // on their close pattern.
                let html_type = match &self.tree.get(container).kind {
                    Kind::HtmlBlock(t) if (1..=5).contains(t) => Some(*t),
                    _ => None,
                };
                if let Some(html_type) = html_type {
                    if starts::HTML_BLOCK_CLOSE[html_type as usize]
                        .is_match(&self.current_line[self.offset..])
                    {
                        let line = self.line_number;
                        self.finalize(container, line);
                    }
                }
            } else if self.offset < self.current_line.len() && !self.blank {
                // Whatever is left becomes a fresh paragraph.
                self.add_child(Kind::Paragraph, self.offset);
                self.advance_next_nonspace();
                self.add_line();
            }
        }
        self.last_line_length = self.current_line.len();
    }

    /// Append the remainder of the current line to the tip's buffer.
    fn add_line(&mut self) {
        let tip = self.tip;
        let buf = match self.tree.get_mut(tip).content.as_mut() {
            Some(buf) => buf,
            None => panic!(
                "block at the tip does not accept lines (line {})",
                self.line_number
            ),
        };
        buf.push_str(&self.current_line[self.offset..]);
        buf.push('\n');
    }

    /// Open a new block as a child of the tip, closing blocks until one
    /// can accept it.
    pub(crate) fn add_child(&mut self, kind: Kind, offset: usize) -> NodeId {
        while !self.tree.get(self.tip).kind.can_contain(&kind) {
            if self.tip == self.doc {
                panic!(
                    "no open block can contain a {} (line {}, offset {})",
                    kind.name(),
                    self.line_number,
                    self.offset
                );
            }
            let tip = self.tip;
            self.finalize(tip, self.line_number - 1);
        }

        log::trace!("open {} at line {}", kind.name(), self.line_number);
        let node = self.tree.new_node(
            kind,
            SourcePos {
                start: (self.line_number, offset + 1),
                end: (0, 0),
            },
        );
        self.tree.get_mut(node).content = Some(String::new());
        self.tree.append_child(self.tip, node);
        self.tip = node;
        node
    }

    /// Finalize every block the current line failed to continue.
    pub(crate) fn close_unmatched_blocks(&mut self) {
        if !self.all_closed {
            while self.oldtip != self.last_matched_container {
                let parent = self
                    .tree
                    .get(self.oldtip)
                    .parent
                    .expect("unmatched block above the document");
                let old = self.oldtip;
                self.finalize(old, self.line_number - 1);
                self.oldtip = parent;
            }
            self.all_closed = true;
        }
    }

    /// Close `block`: record its end position, run its kind's finalize
    /// hook and move the tip to its parent.
    pub(crate) fn finalize(&mut self, block: NodeId, line_number: usize) {
        log::trace!(
            "close {} at line {}",
            self.tree.get(block).kind.name(),
            line_number
        );
        let parent = self.tree.get(block).parent;
        {
            let node = self.tree.get_mut(block);
            node.open = false;
            node.pos.end = (line_number, self.last_line_length);
        }
        blocks::finalize_block(self, block);
        self.tip = parent.unwrap_or(block);
    }

    /// Finalize `block` and every ancestor up through the outermost
    /// enclosing list. Two blank lines in a row end all containing lists.
    fn break_out_of_lists(&mut self, block: NodeId) {
        let mut last_list = None;
        let mut b = Some(block);
        while let Some(id) = b {
            if matches!(self.tree.get(id).kind, Kind::List(_)) {
                last_list = Some(id);
            }
            b = self.tree.get(id).parent;
        }

        if let Some(list) = last_list {
            let mut current = block;
            while current != list {
                let parent = self
                    .tree
                    .get(current)
                    .parent
                    .expect("list ancestor not on the spine");
                self.finalize(current, self.line_number);
                current = parent;
            }
            self.finalize(list, self.line_number);
            self.tip = self.tree.get(list).parent.unwrap_or(self.doc);
        }
    }

    /// Hand paragraph and heading text over to `literal` for the inline
    /// pass, releasing the content buffers.
    fn process_content(&mut self) {
        let ids: Vec<NodeId> = self.tree.descendants(self.doc).collect();
        for id in ids {
            if matches!(self.tree.get(id).kind, Kind::Paragraph | Kind::Heading(_)) {
                let content = self.tree.get_mut(id).content.take().unwrap_or_default();
                self.tree.get_mut(id).literal = content.trim().to_string();
            }
        }
    }
}
