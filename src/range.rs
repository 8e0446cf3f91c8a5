//! Where form output gets written back.
//!
//! Given the `arguments` object of a function reference, compute the span a
//! host must replace with the serialized form value. Lines in an
//! [`EditRange`] are 1-based (the host boundary); characters are 0-based.
//!
//! Branches that matter:
//! - JSON, non-empty object: start right after the opening line's text
//! - JSON, empty object: start at the object's own column
//! - JSON, last line not ending in `}`: also consume the closing-brace line
//! - YAML: start at column 1 of the line after the key
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::document::{DocumentIndex, FileLanguage, NodeId, Position};
use crate::navigator::{last_descendant, line_content, line_of};

/// Column the closing-brace line is consumed up to when the last descendant
/// does not close the object on its own line.
const CLOSING_BRACE_COLUMN: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRange {
    pub start: Position,
    pub end: Position,
}

/// Range to replace for the arguments object `arguments`.
pub fn resolve_edit_range(doc: &DocumentIndex, arguments: NodeId) -> EditRange {
    let node = doc.node(arguments);
    let anchor = doc.position_at(node.offset);

    let last = last_descendant(doc, arguments);
    let last_offset = doc.node(last).offset;
    let last_line = line_content(doc, last_offset);
    let last_line_len = last_line.chars().count() as u32;

    let mut start = Position::new(anchor.line + 1, anchor.character);
    let mut end = Position::new(line_of(doc, last_offset) + 1, last_line_len + 1);

    match doc.language() {
        FileLanguage::Json => {
            start.character = line_content(doc, node.offset).chars().count() as u32;
            if node.offset == last_offset {
                // empty object: nothing to measure past
                start.character = anchor.character;
            }
            if !last_line.ends_with('}') {
                end.line += 1;
                end.character = CLOSING_BRACE_COLUMN;
            }
        }
        FileLanguage::Yaml => {
            start.character = 1;
        }
    }

    trace!(?start, ?end, language = %doc.language(), "resolved edit range");
    EditRange { start, end }
}

// ------------------------------- Tests ------------------------------------ //
