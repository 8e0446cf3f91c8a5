//! `tree-sitter` plumbing shared by the JSON and YAML tree builders.
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::ParseError;

/// Parses `text`, failing on the first error or missing node.
pub(crate) fn parse(text: &str, language: Language) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|err| ParseError::at(text, 0, format!("failed to load grammar: {err}")))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ParseError::at(text, 0, "parser produced no tree"))?;
    if let Some(bad) = first_error(tree.root_node()) {
        let message = if bad.is_missing() {
            format!("missing `{}`", bad.kind())
        } else {
            "syntax error".to_owned()
        };
        return Err(ParseError::at(text, bad.start_byte(), message));
    }
    Ok(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Named children, comments left out.
pub(crate) fn content_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// Key and value of a `key: value` pair, split on the `:` token.
pub(crate) fn split_pair(pair: Node<'_>) -> (Option<Node<'_>>, Option<Node<'_>>) {
    let mut cursor = pair.walk();
    let (mut key, mut value) = (None, None);
    let mut seen_colon = false;
    for child in pair.children(&mut cursor) {
        if !child.is_named() {
            seen_colon |= child.kind() == ":";
            continue;
        }
        if child.kind() == "comment" {
            continue;
        }
        if !seen_colon {
            key = Some(child);
        } else if value.is_none() {
            value = Some(child);
        }
    }
    (key, value)
}
