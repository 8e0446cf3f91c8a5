//! Parsed workflow documents.
//!
//! A [`DocumentIndex`] owns the raw text, a flat arena of [`Node`]s built by
//! the JSON or YAML tree builder, and a line-start table for offset ↔
//! line/character conversion. Nodes are immutable once built.
//!
//! Shape of the tree (same for both languages):
//! - `object` → `property`* ; each `property` → key `string`, then the value
//! - `array`  → value*
//! - scalars (`string`, `number`, `boolean`, `null`) carry their decoded value
//! - a YAML alias is a childless node carrying the anchored value
pub mod json;
mod syntax;
pub mod yaml;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;

// ------------------------------- Language --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileLanguage {
    Json,
    Yaml,
}

impl FileLanguage {
    /// `.json` → JSON, `.yaml`/`.yml` → YAML (so `greet.sw.json` is JSON).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ext.parse().ok()
    }
}

impl FromStr for FileLanguage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unsupported document language `{other}` (expected json or yaml)")),
        }
    }
}

impl fmt::Display for FileLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

// -------------------------------- Nodes ----------------------------------- //

/// Index of a node inside its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Object,
    Array,
    Property,
    String,
    Number,
    Boolean,
    Null,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Property => "property",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Self::String | Self::Number | Self::Boolean | Self::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte offset of the first character of the node.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// Non-owning back reference; `None` for the root.
    pub parent: Option<NodeId>,
    /// Owned children, in document order.
    pub children: Vec<NodeId>,
    /// Decoded value, scalars only.
    pub value: Option<Value>,
}

impl Node {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Arena under construction. Both tree builders go through this so the
/// parent/child invariants live in one place.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    pub(crate) fn open(&mut self, kind: NodeKind, offset: usize, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            offset,
            length: 0,
            parent,
            children: Vec::new(),
            value: None,
        });
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(id);
        }
        id
    }

    pub(crate) fn close(&mut self, id: NodeId, end: usize) {
        let node = &mut self.nodes[id.index()];
        node.length = end.saturating_sub(node.offset);
    }

    pub(crate) fn leaf(
        &mut self,
        kind: NodeKind,
        start: usize,
        end: usize,
        value: Value,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = self.open(kind, start, parent);
        self.close(id, end);
        self.nodes[id.index()].value = Some(value);
        id
    }

    pub(crate) fn end_of(&self, id: NodeId) -> usize {
        self.nodes[id.index()].end()
    }

    pub(crate) fn kind_of(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub(crate) fn value_of(&self, id: NodeId) -> Value {
        subtree_value(&self.nodes, id)
    }
}

// ------------------------------ Line index -------------------------------- //

/// 0-based line/character pair. `character` counts Unicode scalar values
/// from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Byte offsets where each line starts; built once per text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line containing `offset` (binary search over line starts).
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    /// Byte span of `line` without its line terminator.
    pub fn line_span(&self, text: &str, line: usize) -> (usize, usize) {
        let Some(&start) = self.line_starts.get(line) else {
            return (text.len(), text.len());
        };
        let mut end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        if end > start && text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        (start, end)
    }

    /// Full text of the line containing `offset`.
    pub fn line_content<'t>(&self, text: &'t str, offset: usize) -> &'t str {
        let (start, end) = self.line_span(text, self.line_of(offset));
        &text[start..end]
    }

    pub fn position_at(&self, text: &str, offset: usize) -> Position {
        let offset = floor_char_boundary(text, offset.min(text.len()));
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        Position {
            line: line as u32,
            character: text[start..offset].chars().count() as u32,
        }
    }

    /// Inverse of [`LineIndex::position_at`]. Lines past the end map to the
    /// end of the text; characters past a line's end clamp to that end.
    pub fn offset_at(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_count() {
            return text.len();
        }
        let (start, end) = self.line_span(text, line);
        text[start..end]
            .char_indices()
            .nth(position.character as usize)
            .map(|(i, _)| start + i)
            .unwrap_or(end)
    }
}

fn floor_char_boundary(text: &str, mut offset: usize) -> usize {
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

// ------------------------------- Document --------------------------------- //

#[derive(Debug, Clone)]
pub struct DocumentIndex {
    text: String,
    language: FileLanguage,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    lines: LineIndex,
}

impl DocumentIndex {
    pub fn parse(text: impl Into<String>, language: FileLanguage) -> Result<Self, ParseError> {
        let text = text.into();
        let (builder, root) = match language {
            FileLanguage::Json => json::build(&text)?,
            FileLanguage::Yaml => yaml::build(&text)?,
        };
        let lines = LineIndex::new(&text);
        debug!(
            %language,
            nodes = builder.nodes.len(),
            lines = lines.line_count(),
            "parsed document"
        );
        Ok(Self {
            text,
            language,
            nodes: builder.nodes,
            root,
            lines,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> FileLanguage {
        self.language
    }

    /// `None` for an empty YAML document.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn node_text(&self, id: NodeId) -> &str {
        let node = self.node(id);
        &self.text[node.offset..node.end()]
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.lines.position_at(&self.text, offset)
    }

    pub fn offset_at(&self, position: Position) -> usize {
        self.lines.offset_at(&self.text, position)
    }

    /// Rebuilds the JSON value a subtree denotes.
    pub fn value_of(&self, id: NodeId) -> Value {
        subtree_value(&self.nodes, id)
    }
}

/// Value of the subtree at `id`. A container carrying its own value (a
/// resolved YAML alias) yields that value.
fn subtree_value(nodes: &[Node], id: NodeId) -> Value {
    let node = &nodes[id.index()];
    if let Some(value) = &node.value {
        return value.clone();
    }
    let value_of = |child: Option<&NodeId>| child.map(|&c| subtree_value(nodes, c)).unwrap_or(Value::Null);
    match node.kind {
        NodeKind::Object => {
            let mut map = Map::new();
            for &prop in &node.children {
                let children = &nodes[prop.index()].children;
                let Some(key) = children.first().and_then(|&k| nodes[k.index()].value.as_ref()) else {
                    continue;
                };
                let key = match key {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                map.insert(key, value_of(children.get(1)));
            }
            Value::Object(map)
        }
        NodeKind::Array => Value::Array(node.children.iter().map(|&c| subtree_value(nodes, c)).collect()),
        NodeKind::Property => value_of(node.children.get(1)),
        _ => Value::Null,
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn line_index_maps_offsets_both_ways() {
        let text = "ab\ncde\n\nf";
        let lines = LineIndex::new(text);
        assert_eq!(lines.line_count(), 4);
        assert_eq!(lines.line_of(0), 0);
        assert_eq!(lines.line_of(2), 0); // the '\n' belongs to its line
        assert_eq!(lines.line_of(3), 1);
        assert_eq!(lines.line_of(7), 2);
        assert_eq!(lines.line_of(8), 3);
        assert_eq!(lines.position_at(text, 5), Position::new(1, 2));
        assert_eq!(lines.offset_at(text, Position::new(1, 2)), 5);
        assert_eq!(lines.line_content(text, 4), "cde");
        assert_eq!(lines.line_content(text, 7), "");
    }

    #[test]
    fn offset_at_clamps_like_an_editor() {
        let text = "ab\ncde";
        let lines = LineIndex::new(text);
        assert_eq!(lines.offset_at(text, Position::new(0, 99)), 2);
        assert_eq!(lines.offset_at(text, Position::new(9, 0)), text.len());
    }

    #[test]
    fn crlf_lines_exclude_carriage_return() {
        let text = "{\r\n  \"a\": 1\r\n}";
        let lines = LineIndex::new(text);
        assert_eq!(lines.line_content(text, 5), "  \"a\": 1");
    }

    #[test]
    fn characters_count_scalar_values() {
        let text = "é: ü\n";
        let lines = LineIndex::new(text);
        let offset = text.find('ü').unwrap();
        assert_eq!(lines.position_at(text, offset), Position::new(0, 3));
        assert_eq!(lines.offset_at(text, Position::new(0, 3)), offset);
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(FileLanguage::from_path(Path::new("greet.sw.json")), Some(FileLanguage::Json));
        assert_eq!(FileLanguage::from_path(Path::new("flow.YML")), Some(FileLanguage::Yaml));
        assert_eq!(FileLanguage::from_path(Path::new("flow.txt")), None);
    }

    #[test]
    fn value_of_matches_for_both_languages() {
        let json_doc = DocumentIndex::parse(r#"{"a": [1, true, null], "b": {"c": "x"}}"#, FileLanguage::Json).unwrap();
        let yaml_doc = DocumentIndex::parse("a:\n  - 1\n  - true\n  - ~\nb:\n  c: x\n", FileLanguage::Yaml).unwrap();
        let expected = json!({"a": [1, true, null], "b": {"c": "x"}});
        assert_eq!(json_doc.value_of(json_doc.root().unwrap()), expected);
        assert_eq!(yaml_doc.value_of(yaml_doc.root().unwrap()), expected);
    }

    #[test]
    fn children_are_contained_and_ordered() {
        let doc = DocumentIndex::parse("a: 1\nb:\n  - x\n  - {c: 2}\n", FileLanguage::Yaml).unwrap();
        for id in doc.ids() {
            let node = doc.node(id);
            let mut last = node.offset;
            for &child in &node.children {
                let c = doc.node(child);
                assert!(c.offset >= last, "siblings out of order under {:?}", node.kind);
                assert!(c.end() <= node.end(), "{:?} escapes {:?}", c.kind, node.kind);
                assert_eq!(c.parent, Some(id));
                last = c.end();
            }
        }
    }
}
