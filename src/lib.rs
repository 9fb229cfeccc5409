#![warn(clippy::all, clippy::pedantic)]

//! Blockmark parses the block structure of CommonMark documents. The
//! result is a tree of typed blocks (block quotes, lists, headings, code
//! blocks, HTML blocks, paragraphs) plus the document's link reference
//! definitions. Leaf blocks keep their raw text in `literal` so a
//! subsequent inline pass can finish the job; this crate does not parse
//! inline content.

mod blocks;
mod common;
mod parser;
mod refs;
mod starts;
mod tree;

#[macro_use]
extern crate lazy_static;

pub use crate::parser::{Options, Parser};
pub use crate::refs::{RefDef, RefMap};
pub use crate::tree::{
    Children, CodeData, Delimiter, Descendants, Fence, Kind, ListData, ListType, Node, NodeId,
    SourcePos, Tree,
};

/// Parse `buf` into a block tree with default options.
#[must_use]
pub fn to_ast(buf: &'_ str) -> Tree {
    let mut p = Parser::new(Options::default());
    p.parse(buf)
}
