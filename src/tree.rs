//! The block tree for a parsed document. Nodes live in an arena owned by
//! the `Tree`; parent, sibling and child links are indices into it, so
//! the tree can be grown and rewired without juggling mutable references.

use crate::refs::RefMap;
use std::fmt;

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Whether a list is bulleted or numbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ListType {
    Bullet,
    Ordered,
}

/// The delimiter following an ordered list marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Period,
    Paren,
}

/// Marker data shared by a list and its items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListData {
    pub list_type: ListType,
    pub bullet_char: Option<char>,
    pub start: Option<u32>,
    pub delimiter: Option<Delimiter>,
    /// Columns from the line start to the first content column after the
    /// marker.
    pub padding: usize,
    /// Indent of the marker itself.
    pub marker_offset: usize,
    pub tight: bool,
}

/// The fence opening a fenced code block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fence {
    pub ch: char,
    pub length: usize,
    pub offset: usize,
}

/// Code block data. Indented code blocks carry no fence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeData {
    pub fence: Option<Fence>,
    /// The info string of a fenced block, set on finalize.
    pub info: String,
}

impl CodeData {
    #[must_use]
    pub fn is_fenced(&self) -> bool {
        self.fence.is_some()
    }
}

/// The set of block kinds, carrying their kind-specific data.
#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    Document,
    BlockQuote,
    List(ListData),
    Item(ListData),
    /// A heading with its level (1 through 6).
    Heading(u32),
    ThematicBreak,
    CodeBlock(CodeData),
    /// An HTML block with its type (1 through 7).
    HtmlBlock(u8),
    Paragraph,
}

impl Kind {
    /// Whether a block of this kind may contain a child of kind `child`.
    #[must_use]
    pub fn can_contain(&self, child: &Kind) -> bool {
        match self {
            Kind::Document | Kind::BlockQuote | Kind::Item(_) => !matches!(child, Kind::Item(_)),
            Kind::List(_) => matches!(child, Kind::Item(_)),
            _ => false,
        }
    }

    /// Whether a block of this kind accumulates raw line content.
    #[must_use]
    pub fn accepts_lines(&self) -> bool {
        matches!(self, Kind::CodeBlock(_) | Kind::HtmlBlock(_) | Kind::Paragraph)
    }

    /// Whether this kind may contain other blocks at all.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Kind::Document | Kind::BlockQuote | Kind::List(_) | Kind::Item(_)
        )
    }

    /// Short name used in traces, panics and the outline format.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Document => "document",
            Kind::BlockQuote => "block_quote",
            Kind::List(_) => "list",
            Kind::Item(_) => "item",
            Kind::Heading(_) => "heading",
            Kind::ThematicBreak => "thematic_break",
            Kind::CodeBlock(_) => "code_block",
            Kind::HtmlBlock(_) => "html_block",
            Kind::Paragraph => "paragraph",
        }
    }
}

/// 1-based, inclusive (line, expanded-tab column) range covered by a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourcePos {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

/// A single block in the tree.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) kind: Kind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) open: bool,
    pub(crate) last_line_blank: bool,
    pub(crate) pos: SourcePos,
    pub(crate) content: Option<String>,
    pub(crate) literal: String,
}

impl Node {
    fn new(kind: Kind, pos: SourcePos) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
            open: true,
            last_line_blank: false,
            pos,
            content: None,
            literal: String::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Finalized text payload of a leaf block.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    #[must_use]
    pub fn source_pos(&self) -> SourcePos {
        self.pos
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[must_use]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[must_use]
    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    #[must_use]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// The raw content buffer, present only while the block still
    /// expects lines.
    #[must_use]
    pub fn string_content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// A parsed document: the node arena, the document root and the
/// reference map accumulated from link reference definitions.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    doc: NodeId,
    pub(crate) refs: RefMap,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let doc = Node::new(
            Kind::Document,
            SourcePos {
                start: (1, 1),
                end: (0, 0),
            },
        );
        Self {
            nodes: vec![doc],
            doc: 0,
            refs: RefMap::new(),
        }
    }

    /// The document root.
    #[must_use]
    pub fn document(&self) -> NodeId {
        self.doc
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Link reference definitions collected during the parse.
    #[must_use]
    pub fn refs(&self) -> &RefMap {
        &self.refs
    }

    pub(crate) fn new_node(&mut self, kind: Kind, pos: SourcePos) -> NodeId {
        self.nodes.push(Node::new(kind, pos));
        self.nodes.len() - 1
    }

    /// Append `child` as the last child of `parent`.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        if let Some(last) = self.nodes[parent].last_child {
            self.nodes[last].next = Some(child);
            self.nodes[child].prev = Some(last);
        } else {
            self.nodes[parent].first_child = Some(child);
        }
        self.nodes[parent].last_child = Some(child);
    }

    /// Insert a detached `sibling` immediately after `node`.
    pub(crate) fn insert_after(&mut self, node: NodeId, sibling: NodeId) {
        let next = self.nodes[node].next;
        let parent = self.nodes[node].parent;
        self.nodes[sibling].prev = Some(node);
        self.nodes[sibling].next = next;
        self.nodes[sibling].parent = parent;
        self.nodes[node].next = Some(sibling);
        if let Some(n) = next {
            self.nodes[n].prev = Some(sibling);
        } else if let Some(p) = parent {
            self.nodes[p].last_child = Some(sibling);
        }
    }

    /// Detach `node` from the tree. The node stays in the arena but is no
    /// longer reachable from the document root.
    pub(crate) fn unlink(&mut self, node: NodeId) {
        let parent = self.nodes[node].parent;
        let prev = self.nodes[node].prev;
        let next = self.nodes[node].next;
        if let Some(p) = prev {
            self.nodes[p].next = next;
        } else if let Some(par) = parent {
            self.nodes[par].first_child = next;
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        } else if let Some(par) = parent {
            self.nodes[par].last_child = prev;
        }
        self.nodes[node].parent = None;
        self.nodes[node].prev = None;
        self.nodes[node].next = None;
    }

    /// Iterate the direct children of `id`, first to last.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            cur: self.nodes[id].first_child,
        }
    }

    /// Iterate `root` and all of its descendants in preorder. The walk
    /// keeps an explicit stack and never follows parent links.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root,
            stack: vec![root],
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self.nodes[id];
        write!(f, "{:width$}{}", "", node.kind.name(), width = depth * 2)?;
        match &node.kind {
            Kind::Heading(level) => write!(f, " level={}", level)?,
            Kind::List(data) => {
                match data.list_type {
                    ListType::Bullet => {
                        write!(f, " bullet")?;
                        if let Some(ch) = data.bullet_char {
                            write!(f, " char={:?}", ch)?;
                        }
                    }
                    ListType::Ordered => {
                        write!(f, " ordered")?;
                        if let Some(start) = data.start {
                            write!(f, " start={}", start)?;
                        }
                        if let Some(delim) = data.delimiter {
                            let ch = match delim {
                                Delimiter::Period => '.',
                                Delimiter::Paren => ')',
                            };
                            write!(f, " delim={:?}", ch)?;
                        }
                    }
                }
                write!(f, " tight={}", data.tight)?;
            }
            Kind::CodeBlock(data) => {
                if data.is_fenced() {
                    write!(f, " fenced info={:?}", data.info)?;
                } else {
                    write!(f, " indented")?;
                }
            }
            Kind::HtmlBlock(html_type) => write!(f, " type={}", html_type)?,
            _ => {}
        }
        if matches!(
            node.kind,
            Kind::Paragraph | Kind::Heading(_) | Kind::CodeBlock(_) | Kind::HtmlBlock(_)
        ) {
            write!(f, " {:?}", node.literal)?;
        }
        writeln!(f)?;
        for child in self.children(id) {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// The outline format: one line per block, indented by depth, with the
/// kind-specific data and finalized text of each block.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_node(f, self.doc, 0)
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    cur: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.tree.nodes[id].next;
        Some(id)
    }
}

pub struct Descendants<'a> {
    tree: &'a Tree,
    root: NodeId,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if id != self.root {
            if let Some(next) = self.tree.nodes[id].next {
                self.stack.push(next);
            }
        }
        if let Some(child) = self.tree.nodes[id].first_child {
            self.stack.push(child);
        }
        Some(id)
    }
}
