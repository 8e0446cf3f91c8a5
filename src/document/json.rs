//! JSON documents through `tree-sitter-json`.
//!
//! `//` and `/* */` comments are accepted, as hand-edited workflow files
//! carry them. String and number literals are decoded by `serde_json`.
use serde_json::{Number, Value};
use tree_sitter::Node as SyntaxNode;

use super::syntax::{self, content_children, split_pair};
use super::{NodeId, NodeKind, TreeBuilder};
use crate::error::ParseError;

pub(crate) fn build(text: &str) -> Result<(TreeBuilder, Option<NodeId>), ParseError> {
    // a BOM is blanked out so byte offsets stay the same
    let padded;
    let source = match text.strip_prefix('\u{feff}') {
        Some(rest) => {
            padded = format!("{}{rest}", " ".repeat('\u{feff}'.len_utf8()));
            padded.as_str()
        }
        None => text,
    };
    let tree = syntax::parse(source, tree_sitter_json::LANGUAGE.into())?;
    let values = content_children(tree.root_node());
    let Some(&top) = values.first() else {
        return Err(ParseError::at(text, text.len(), "empty JSON document"));
    };
    if let Some(extra) = values.get(1) {
        return Err(ParseError::at(
            text,
            extra.start_byte(),
            "unexpected content after the top-level value",
        ));
    }
    let mut json = JsonTree {
        text: source,
        tree: TreeBuilder::default(),
    };
    let root = json.value(top, None)?;
    Ok((json.tree, Some(root)))
}

struct JsonTree<'a> {
    text: &'a str,
    tree: TreeBuilder,
}

impl JsonTree<'_> {
    fn raw(&self, node: SyntaxNode<'_>) -> &str {
        &self.text[node.start_byte()..node.end_byte()]
    }

    fn error(&self, node: SyntaxNode<'_>, message: impl Into<String>) -> ParseError {
        ParseError::at(self.text, node.start_byte(), message)
    }

    fn value(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let (start, end) = (node.start_byte(), node.end_byte());
        let (kind, value) = match node.kind() {
            "object" => return self.object(node, parent),
            "array" => {
                let id = self.tree.open(NodeKind::Array, start, parent);
                for item in content_children(node) {
                    self.value(item, Some(id))?;
                }
                self.tree.close(id, end);
                return Ok(id);
            }
            "string" => (NodeKind::String, Value::String(self.string(node)?)),
            "number" => {
                let number = serde_json::from_str::<Number>(self.raw(node))
                    .map_err(|e| self.error(node, format!("invalid number: {e}")))?;
                (NodeKind::Number, Value::Number(number))
            }
            "true" => (NodeKind::Boolean, Value::Bool(true)),
            "false" => (NodeKind::Boolean, Value::Bool(false)),
            "null" => (NodeKind::Null, Value::Null),
            other => return Err(self.error(node, format!("unexpected `{other}`"))),
        };
        Ok(self.tree.leaf(kind, start, end, value, parent))
    }

    fn object(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let id = self.tree.open(NodeKind::Object, node.start_byte(), parent);
        for pair in content_children(node) {
            let (Some(key), Some(value)) = split_pair(pair) else {
                return Err(self.error(pair, "expected `\"key\": value`"));
            };
            if key.kind() != "string" {
                return Err(self.error(key, "property names must be strings"));
            }
            let name = self.string(key)?;
            let prop = self.tree.open(NodeKind::Property, key.start_byte(), Some(id));
            self.tree
                .leaf(NodeKind::String, key.start_byte(), key.end_byte(), Value::String(name), Some(prop));
            let value = self.value(value, Some(prop))?;
            let end = self.tree.end_of(value);
            self.tree.close(prop, end);
        }
        self.tree.close(id, node.end_byte());
        Ok(id)
    }

    fn string(&self, node: SyntaxNode<'_>) -> Result<String, ParseError> {
        serde_json::from_str::<String>(self.raw(node))
            .map_err(|e| self.error(node, format!("invalid string literal: {e}")))
    }
}

// ------------------------------- Tests ------------------------------------ //
