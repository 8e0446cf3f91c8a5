//! YAML documents through `tree-sitter-yaml`.
//!
//! The grammar gives the structure and spans. Plain scalars resolve with the
//! YAML 1.2 core schema; quoted and block scalars are decoded by
//! `serde_yaml`. An alias becomes a leaf carrying the anchored value. Tags
//! are ignored, and a stream with more than one document is rejected.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};
use tracing::trace;
use tree_sitter::Node as SyntaxNode;

use super::syntax::{self, content_children, split_pair};
use super::{NodeId, NodeKind, TreeBuilder};
use crate::error::ParseError;

static NULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:~|null|Null|NULL)$").expect("valid regex"));
static BOOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:true|True|TRUE|false|False|FALSE)$").expect("valid regex"));
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").expect("valid regex"));
static HEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").expect("valid regex"));
static OCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0o[0-7]+$").expect("valid regex"));
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?$").expect("valid regex")
});

pub(crate) fn build(text: &str) -> Result<(TreeBuilder, Option<NodeId>), ParseError> {
    let tree = syntax::parse(text, tree_sitter_yaml::LANGUAGE.into())?;
    let mut bodies = content_children(tree.root_node())
        .into_iter()
        .filter(|node| node.kind() == "document")
        .filter_map(document_body);
    let Some(body) = bodies.next() else {
        return Ok((TreeBuilder::default(), None));
    };
    if let Some(extra) = bodies.next() {
        return Err(ParseError::at(text, extra.start_byte(), "multiple documents are not supported"));
    }
    let mut yaml = YamlTree {
        text,
        tree: TreeBuilder::default(),
        anchors: HashMap::new(),
    };
    let root = yaml.node(body, None)?;
    Ok((yaml.tree, Some(root)))
}

fn document_body(document: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    content_children(document)
        .into_iter()
        .find(|node| matches!(node.kind(), "block_node" | "flow_node"))
}

fn is_scalar(kind: &str) -> bool {
    matches!(
        kind,
        "plain_scalar" | "single_quote_scalar" | "double_quote_scalar" | "block_scalar"
    )
}

struct YamlTree<'a> {
    text: &'a str,
    tree: TreeBuilder,
    anchors: HashMap<String, NodeId>,
}

impl YamlTree<'_> {
    fn raw(&self, node: SyntaxNode<'_>) -> &str {
        &self.text[node.start_byte()..node.end_byte()]
    }

    fn error(&self, node: SyntaxNode<'_>, message: impl Into<String>) -> ParseError {
        ParseError::at(self.text, node.start_byte(), message)
    }

    fn node(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        match node.kind() {
            "block_node" | "flow_node" => self.decorated(node, parent),
            "block_mapping" | "flow_mapping" => self.mapping(node, parent),
            "block_sequence" | "flow_sequence" => self.sequence(node, parent),
            "flow_pair" => {
                let id = self.tree.open(NodeKind::Object, node.start_byte(), parent);
                self.pair(node, id)?;
                self.tree.close(id, node.end_byte());
                Ok(id)
            }
            "alias" => self.alias(node, parent),
            kind if is_scalar(kind) => {
                let (kind, value) = self.scalar(node);
                Ok(self.tree.leaf(kind, node.start_byte(), node.end_byte(), value, parent))
            }
            other => Err(self.error(node, format!("unexpected `{other}`"))),
        }
    }

    /// A node with its optional anchor and tag.
    fn decorated(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let mut anchor = None;
        let mut content = None;
        for child in content_children(node) {
            match child.kind() {
                "anchor" => anchor = Some(self.raw(child).trim_start_matches('&').to_owned()),
                "tag" => trace!(tag = self.raw(child), "ignoring tag"),
                _ if content.is_none() => content = Some(child),
                _ => {}
            }
        }
        let id = match content {
            Some(content) => self.node(content, parent)?,
            None => {
                let end = node.end_byte();
                self.tree.leaf(NodeKind::Null, end, end, Value::Null, parent)
            }
        };
        if let Some(name) = anchor {
            self.anchors.insert(name, id);
        }
        Ok(id)
    }

    fn mapping(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let id = self.tree.open(NodeKind::Object, node.start_byte(), parent);
        for item in content_children(node) {
            match item.kind() {
                "block_mapping_pair" | "flow_pair" => self.pair(item, id)?,
                // `{ key }` shorthand
                _ => {
                    let (start, end, name) = self.key(item)?;
                    let prop = self.tree.open(NodeKind::Property, start, Some(id));
                    self.tree.leaf(NodeKind::String, start, end, Value::String(name), Some(prop));
                    self.tree.leaf(NodeKind::Null, end, end, Value::Null, Some(prop));
                    self.tree.close(prop, end);
                }
            }
        }
        self.tree.close(id, node.end_byte());
        Ok(id)
    }

    fn pair(&mut self, pair: SyntaxNode<'_>, map: NodeId) -> Result<(), ParseError> {
        let (key, value) = split_pair(pair);
        let Some(key) = key else {
            return Err(self.error(pair, "mapping entry without a key"));
        };
        let (start, key_end, name) = self.key(key)?;
        let prop = self.tree.open(NodeKind::Property, start, Some(map));
        self.tree.leaf(NodeKind::String, start, key_end, Value::String(name), Some(prop));
        let end = match value {
            Some(value) => {
                let value = self.node(value, Some(prop))?;
                self.tree.end_of(value)
            }
            // empty value: a zero-length null right after the colon
            None => {
                let at = pair.end_byte();
                self.tree.leaf(NodeKind::Null, at, at, Value::Null, Some(prop));
                at
            }
        };
        self.tree.close(prop, end);
        Ok(())
    }

    /// Span and string form of a scalar mapping key.
    fn key(&self, key: SyntaxNode<'_>) -> Result<(usize, usize, String), ParseError> {
        let mut node = key;
        while matches!(node.kind(), "block_node" | "flow_node") {
            let inner = content_children(node)
                .into_iter()
                .find(|child| !matches!(child.kind(), "anchor" | "tag"));
            match inner {
                Some(inner) => node = inner,
                None => break,
            }
        }
        if !is_scalar(node.kind()) {
            return Err(self.error(key, "complex mapping keys are not supported"));
        }
        let name = match self.scalar(node).1 {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok((node.start_byte(), node.end_byte(), name))
    }

    fn sequence(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let id = self.tree.open(NodeKind::Array, node.start_byte(), parent);
        for item in content_children(node) {
            if item.kind() != "block_sequence_item" {
                self.node(item, Some(id))?;
                continue;
            }
            match content_children(item).into_iter().next() {
                Some(value) => {
                    self.node(value, Some(id))?;
                }
                // bare `-`
                None => {
                    let at = item.start_byte() + 1;
                    self.tree.leaf(NodeKind::Null, at, at, Value::Null, Some(id));
                }
            }
        }
        self.tree.close(id, node.end_byte());
        Ok(id)
    }

    fn alias(&mut self, node: SyntaxNode<'_>, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let name = self.raw(node).trim_start_matches('*');
        let Some(&target) = self.anchors.get(name) else {
            return Err(self.error(node, format!("unknown alias `*{name}`")));
        };
        let kind = self.tree.kind_of(target);
        let value = self.tree.value_of(target);
        Ok(self.tree.leaf(kind, node.start_byte(), node.end_byte(), value, parent))
    }

    fn scalar(&self, node: SyntaxNode<'_>) -> (NodeKind, Value) {
        let raw = self.raw(node);
        match node.kind() {
            "plain_scalar" => resolve_plain(&fold_plain(raw)),
            "block_scalar" if !raw.ends_with('\n') => decode(&format!("{raw}\n"), raw),
            _ => decode(raw, raw),
        }
    }
}

/// Quoted and block scalars, falling back to the raw text.
fn decode(source: &str, raw: &str) -> (NodeKind, Value) {
    let value = serde_yaml::from_str::<String>(source).unwrap_or_else(|err| {
        trace!(%err, raw, "keeping scalar text as written");
        raw.to_owned()
    });
    (NodeKind::String, Value::String(value))
}

/// Line folding of a multi-line plain scalar.
fn fold_plain(raw: &str) -> String {
    let mut lines = raw.lines().map(str::trim);
    let mut out = lines.next().unwrap_or_default().to_owned();
    let mut breaks = 0;
    for line in lines {
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        match breaks {
            0 => out.push(' '),
            n => out.extend(std::iter::repeat_n('\n', n)),
        }
        breaks = 0;
        out.push_str(line);
    }
    out
}

fn resolve_plain(s: &str) -> (NodeKind, Value) {
    if s.is_empty() || NULL_RE.is_match(s) {
        return (NodeKind::Null, Value::Null);
    }
    if BOOL_RE.is_match(s) {
        return (NodeKind::Boolean, Value::Bool(s.starts_with(['t', 'T'])));
    }
    let int = if INT_RE.is_match(s) {
        s.parse::<i64>().ok()
    } else if HEX_RE.is_match(s) {
        i64::from_str_radix(&s[2..], 16).ok()
    } else if OCT_RE.is_match(s) {
        i64::from_str_radix(&s[2..], 8).ok()
    } else {
        None
    };
    if let Some(i) = int {
        return (NodeKind::Number, Value::from(i));
    }
    if FLOAT_RE.is_match(s) {
        if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
            return (NodeKind::Number, Value::Number(n));
        }
    }
    (NodeKind::String, Value::String(s.to_owned()))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentIndex, FileLanguage, Position};
    use crate::navigator::last_descendant;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(text: &str) -> DocumentIndex {
        DocumentIndex::parse(text, FileLanguage::Yaml).unwrap()
    }

    fn value(text: &str) -> Value {
        let doc = parse(text);
        doc.value_of(doc.root().unwrap())
    }

    const WORKFLOW: &str = "\
---
id: greeting # inline comment
functions:
  - name: greet
    operation: specs/greet.yaml#greet
states:
  - name: Start
    actions:
      - functionRef:
          refName: greet
          arguments:
            name: \"John #1\"
            count: 2
    end: true
";

    #[test]
    fn workflow_shape() {
        assert_eq!(
            value(WORKFLOW),
            json!({
                "id": "greeting",
                "functions": [{"name": "greet", "operation": "specs/greet.yaml#greet"}],
                "states": [{
                    "name": "Start",
                    "actions": [{"functionRef": {
                        "refName": "greet",
                        "arguments": {"name": "John #1", "count": 2}
                    }}],
                    "end": true
                }]
            })
        );
    }

    #[test]
    fn block_mapping_starts_at_first_key() {
        let doc = parse(WORKFLOW);
        let offset = WORKFLOW.find("name: \"John").unwrap();
        let args = doc
            .ids()
            .find(|&id| doc.node(id).kind == NodeKind::Object && doc.node(id).offset == offset)
            .expect("arguments mapping");
        assert_eq!(doc.position_at(offset), Position::new(11, 12));
        assert_eq!(doc.children(args).len(), 2);
        assert_eq!(doc.node(args).end(), WORKFLOW.find("2\n    end").unwrap() + 1);
    }

    #[test]
    fn compact_items_keep_their_column() {
        assert_eq!(
            value("- a: 1\n  b: 2\n- - x\n  - y\n-\n"),
            json!([{"a": 1, "b": 2}, ["x", "y"], null])
        );
    }

    #[test]
    fn empty_values_are_null_nodes() {
        let doc = parse("arguments:\nnext: 1\n");
        let root = doc.root().unwrap();
        let prop = doc.children(root)[0];
        let value = doc.children(prop)[1];
        assert_eq!(doc.node(value).kind, NodeKind::Null);
        assert_eq!(doc.node(value).length, 0);
        assert_eq!(doc.node(value).offset, "arguments:".len());
        assert_eq!(doc.value_of(root), json!({"arguments": null, "next": 1}));
    }

    #[test]
    fn sequence_may_sit_at_key_indent() {
        assert_eq!(
            value("items:\n- a\n- b\nnext: c\n"),
            json!({"items": ["a", "b"], "next": "c"})
        );
    }

    #[test]
    fn flow_collections_and_quotes() {
        assert_eq!(
            value("a: {}\nb: [1, 'it''s', \"x, y\", {k: v, f}]\nc: it's # note\n"),
            json!({"a": {}, "b": [1, "it's", "x, y", {"k": "v", "f": null}], "c": "it's"})
        );
    }

    #[test]
    fn flow_mapping_may_span_lines() {
        let text = "functionRef:\n  arguments: {\n    name: John,\n    count: 2\n    }\n";
        let doc = parse(text);
        assert_eq!(
            doc.value_of(doc.root().unwrap()),
            json!({"functionRef": {"arguments": {"name": "John", "count": 2}}})
        );
        let args = doc
            .ids()
            .find(|&id| doc.node(id).kind == NodeKind::Object && doc.node_text(id).starts_with('{'))
            .expect("flow mapping");
        assert_eq!(doc.node(args).end(), text.rfind('}').unwrap() + 1);
    }

    #[test]
    fn plain_scalars_fold_across_lines() {
        assert_eq!(
            value("description: a long\n  description continued\nnext: 1\n"),
            json!({"description": "a long description continued", "next": 1})
        );
        assert_eq!(fold_plain("a\n\n  b\n  c"), "a\nb c");
    }

    #[test]
    fn json_is_valid_yaml() {
        assert_eq!(value("{\n  \"states\": []\n}\n"), json!({"states": []}));
        assert_eq!(
            value("{\"a\": {\"b\": [1, \"x\"]}}"),
            json!({"a": {"b": [1, "x"]}})
        );
    }

    #[test]
    fn aliases_take_the_anchored_value() {
        let text = "common: &c\n  name: John\narguments: *c\nflag: &f true\nagain: *f\n";
        let doc = parse(text);
        let root = doc.root().unwrap();
        assert_eq!(
            doc.value_of(root),
            json!({
                "common": {"name": "John"},
                "arguments": {"name": "John"},
                "flag": true,
                "again": true
            })
        );
        let alias = doc.children(doc.children(root)[1])[1];
        assert_eq!(doc.node(alias).kind, NodeKind::Object);
        assert_eq!(doc.node_text(alias), "*c");
        assert!(doc.children(alias).is_empty());
    }

    #[test]
    fn core_schema_resolution() {
        let cases = [
            ("~", json!(null)),
            ("True", json!(true)),
            ("-12", json!(-12)),
            ("0x1F", json!(31)),
            ("0o17", json!(15)),
            ("1.5", json!(1.5)),
            ("yes", json!("yes")),
            ("1.2.3", json!("1.2.3")),
            ("http://x:8080/p", json!("http://x:8080/p")),
        ];
        for (raw, expected) in cases {
            assert_eq!(resolve_plain(raw).1, expected, "resolving {raw:?}");
        }
    }

    #[test]
    fn block_scalars() {
        assert_eq!(
            value("lit: |\n  one\n  two\nfold: >-\n  a\n  b\nafter: 1\n"),
            json!({"lit": "one\ntwo\n", "fold": "a b", "after": 1})
        );
    }

    #[test]
    fn block_scalar_keeps_hash_lines() {
        let text = "arguments:\n  script: |\n    # header\n    echo hi\n";
        let doc = parse(text);
        let root = doc.root().unwrap();
        assert_eq!(doc.value_of(root), json!({"arguments": {"script": "# header\necho hi\n"}}));

        let args = doc.children(doc.children(root)[0])[1];
        let last = last_descendant(&doc, args);
        assert!(doc.node_text(last).starts_with('|'));
        assert!(doc.node_text(last).contains("# header\n    echo hi"));
    }

    #[test]
    fn empty_document_has_no_root() {
        let doc = parse("# nothing here\n---\n");
        assert!(doc.root().is_none());
    }

    #[test]
    fn rejects_what_it_cannot_represent() {
        let err = DocumentIndex::parse("a: 1\n---\nb: 2\n", FileLanguage::Yaml).unwrap_err();
        assert_eq!(err.message, "multiple documents are not supported");
        assert_eq!(err.position.line, 2);

        let err = DocumentIndex::parse("a: *missing\n", FileLanguage::Yaml).unwrap_err();
        assert_eq!(err.message, "unknown alias `*missing`");

        assert!(DocumentIndex::parse("a: [1, 2\n", FileLanguage::Yaml).is_err());
        assert!(DocumentIndex::parse("? [a, b]\n: c\n", FileLanguage::Yaml).is_err());
    }
}
