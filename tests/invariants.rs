//! Whole-tree invariants checked over a corpus of documents.

use blockmark::{Kind, Tree};
use pretty_assertions::assert_eq;

/// Documents exercising every block kind, container nesting, tabs and
/// lazy continuation.
const CORPUS: &[&str] = &[
    "plain paragraph\n",
    "one\ntwo\n\nthree\n",
    "# heading\n\nbody\n",
    "Setext\n======\n",
    "> quoted\n> more\n\nafter\n",
    "> outer\n> > inner\n",
    "- a\n- b\n\n- c\n",
    "1. one\n2. two\n",
    "- parent\n  - child\n    - grandchild\n",
    "- a\n\n  b\n",
    "    indented code\n    second line\n",
    "```rust\nfn main() {}\n```\n",
    "~~~\nliteral\n~~~\n",
    "***\n",
    "<div>\ncontent\n\nafter\n",
    "<!-- multi\nline -->\n",
    "<script>\nlet x;\n</script>\n",
    "[ref]: /url \"title\"\n\nuse [ref] here\n",
    "foo\n\n\n- a\n\n\nbar\n",
    "- foo\n\tbar\n",
    "\tcode in tab\n",
    "> foo\nlazy\n",
];

fn all_nodes(tree: &Tree) -> Vec<usize> {
    tree.descendants(tree.document()).collect()
}

#[test]
fn every_edge_satisfies_can_contain() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            for child in tree.children(id) {
                assert!(
                    tree.get(id).kind().can_contain(tree.get(child).kind()),
                    "bad edge {} -> {} in {:?}",
                    tree.get(id).kind().name(),
                    tree.get(child).kind().name(),
                    input
                );
            }
        }
    }
}

#[test]
fn content_buffers_are_released_after_parse() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            let node = tree.get(id);
            if node.kind().accepts_lines() {
                assert!(
                    node.string_content().is_none(),
                    "{} kept its buffer in {:?}",
                    node.kind().name(),
                    input
                );
            }
        }
    }
}

#[test]
fn all_blocks_are_closed_after_parse() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            assert!(!tree.get(id).is_open(), "open block in {:?}", input);
        }
    }
}

#[test]
fn source_positions_are_ordered() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            let pos = tree.get(id).source_pos();
            assert!(
                pos.start <= pos.end,
                "{} has positions {:?} in {:?}",
                tree.get(id).kind().name(),
                pos,
                input
            );
        }
    }
}

#[test]
fn parsing_is_deterministic() {
    for input in CORPUS {
        let first = blockmark::to_ast(input).to_string();
        let second = blockmark::to_ast(input).to_string();
        assert_eq!(first, second);
    }
}

#[test]
fn line_terminators_do_not_change_the_tree() {
    for input in CORPUS {
        let lf = blockmark::to_ast(input).to_string();
        let crlf = input.replace('\n', "\r\n");
        assert_eq!(blockmark::to_ast(&crlf).to_string(), lf, "crlf {:?}", input);
        let cr = input.replace('\n', "\r");
        assert_eq!(blockmark::to_ast(&cr).to_string(), lf, "cr {:?}", input);
    }
}

#[test]
fn nul_bytes_never_reach_literals() {
    let input = "a\u{0}b\n\n    c\u{0}d\n\n```\ne\u{0}f\n```\n";
    let tree = blockmark::to_ast(input);
    let mut found = 0;
    for id in all_nodes(&tree) {
        let literal = tree.get(id).literal();
        assert!(!literal.contains('\u{0}'));
        if literal.contains('\u{FFFD}') {
            found += 1;
        }
    }
    assert_eq!(found, 3);
}

#[test]
fn first_definition_wins_across_paragraphs() {
    let tree = blockmark::to_ast("[dup]: /first\n\n[dup]: /second\n");
    assert_eq!(tree.refs().get("dup").unwrap().destination, "/first");
    // Both paragraphs were nothing but definitions.
    assert_eq!(tree.children(tree.document()).count(), 0);
}

#[test]
fn fenced_literal_round_trips_the_inter_fence_source() {
    let body = "ab\ncd\n  ef\n";
    let input = format!("```\n{}```\n", body);
    let tree = blockmark::to_ast(&input);
    let code = tree.children(tree.document()).next().unwrap();
    assert_eq!(tree.get(code).literal(), body);
}

#[test]
fn stripping_definitions_matches_a_bare_reparse() {
    let with_def = blockmark::to_ast("[foo]: /url\nbar\n").to_string();
    let bare = blockmark::to_ast("bar\n").to_string();
    assert_eq!(with_def, bare);
}

#[test]
fn heading_levels_stay_in_range() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            match tree.get(id).kind() {
                Kind::Heading(level) => assert!((1..=6).contains(level)),
                Kind::HtmlBlock(html_type) => assert!((1..=7).contains(html_type)),
                Kind::CodeBlock(data) => {
                    if let Some(fence) = data.fence {
                        assert!(fence.length >= 3);
                        assert!(fence.offset <= 3);
                        assert!(fence.ch == '`' || fence.ch == '~');
                    }
                }
                _ => {}
            }
        }
    }
}

#[test]
fn items_only_live_in_lists() {
    for input in CORPUS {
        let tree = blockmark::to_ast(input);
        for id in all_nodes(&tree) {
            if matches!(tree.get(id).kind(), Kind::Item(_)) {
                let parent = tree.get(id).parent().unwrap();
                assert!(matches!(tree.get(parent).kind(), Kind::List(_)));
            }
        }
    }
}
