//! Structural queries over a [`DocumentIndex`] tree.
use std::fmt;

use crate::document::{DocumentIndex, NodeId, NodeKind};

// -------------------------------- Paths ----------------------------------- //

/// One step of a node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property by literal name.
    Key(String),
    /// n-th element of an array.
    Index(usize),
    /// Any property of an object or any element of an array.
    Wildcard,
}

impl PathSegment {
    /// Parses `states/*/actions/0/functionRef` style paths.
    pub fn parse_path(path: &str) -> Vec<PathSegment> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .map(PathSegment::from)
            .collect()
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        if s == "*" {
            Self::Wildcard
        } else if let Ok(i) = s.parse::<usize>() {
            Self::Index(i)
        } else {
            Self::Key(s.to_owned())
        }
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{i}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

// ------------------------------- Queries ---------------------------------- //

/// Deepest, rightmost leaf under `node`: at each level descend into the
/// child with the greatest offset (first seen wins a tie).
pub fn last_descendant(doc: &DocumentIndex, node: NodeId) -> NodeId {
    let mut current = node;
    loop {
        let children = doc.children(current);
        let Some(&first) = children.first() else {
            return current;
        };
        current = children.iter().fold(first, |best, &child| {
            if doc.node(child).offset > doc.node(best).offset { child } else { best }
        });
    }
}

/// `node` itself or its nearest ancestor of `kind`.
pub fn ancestor_of_type(doc: &DocumentIndex, node: Option<NodeId>, kind: NodeKind) -> Option<NodeId> {
    let mut current = node;
    while let Some(id) = current {
        if doc.node(id).kind == kind {
            return Some(id);
        }
        current = doc.parent(id);
    }
    None
}

/// Value node of the property `key` in `object`.
pub fn property_value(doc: &DocumentIndex, object: NodeId, key: &str) -> Option<NodeId> {
    if doc.node(object).kind != NodeKind::Object {
        return None;
    }
    doc.children(object).iter().find_map(|&prop| {
        let children = doc.children(prop);
        let key_node = doc.node(*children.first()?);
        match key_node.value.as_ref()?.as_str() {
            Some(name) if name == key => children.get(1).copied(),
            _ => None,
        }
    })
}

/// String value of a scalar node.
pub fn string_value(doc: &DocumentIndex, node: NodeId) -> Option<&str> {
    doc.node(node).value.as_ref()?.as_str()
}

/// Resolves a path of key/index steps from `root`. With wildcards, the
/// first match in document order.
pub fn find_by_path(doc: &DocumentIndex, root: NodeId, path: &[PathSegment]) -> Option<NodeId> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        current = match segment {
            PathSegment::Key(key) => property_value(doc, current, key)?,
            PathSegment::Index(i) => {
                if doc.node(current).kind != NodeKind::Array {
                    return None;
                }
                *doc.children(current).get(*i)?
            }
            PathSegment::Wildcard => {
                return find_all_by_path(doc, current, &path[depth..]).into_iter().next();
            }
        };
    }
    Some(current)
}

/// Every node matched by `path`, in document order.
pub fn find_all_by_path(doc: &DocumentIndex, root: NodeId, path: &[PathSegment]) -> Vec<NodeId> {
    let mut frontier = vec![root];
    for segment in path {
        frontier = frontier
            .into_iter()
            .flat_map(|node| step(doc, node, segment))
            .collect();
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}

fn step(doc: &DocumentIndex, node: NodeId, segment: &PathSegment) -> Vec<NodeId> {
    let kind = doc.node(node).kind;
    match segment {
        PathSegment::Key(key) => property_value(doc, node, key).into_iter().collect(),
        PathSegment::Index(i) if kind == NodeKind::Array => doc.children(node).get(*i).copied().into_iter().collect(),
        PathSegment::Index(_) => Vec::new(),
        PathSegment::Wildcard => match kind {
            NodeKind::Array => doc.children(node).to_vec(),
            NodeKind::Object => doc
                .children(node)
                .iter()
                .filter_map(|&prop| doc.children(prop).get(1).copied())
                .collect(),
            _ => Vec::new(),
        },
    }
}

// -------------------------------- Lines ----------------------------------- //

/// 0-based line containing `offset`.
pub fn line_of(doc: &DocumentIndex, offset: usize) -> u32 {
    doc.lines().line_of(offset) as u32
}

/// Full text of the line containing `offset`, without its terminator.
pub fn line_content(doc: &DocumentIndex, offset: usize) -> &str {
    doc.lines().line_content(doc.text(), offset)
}

// ------------------------------- Tests ------------------------------------ //
