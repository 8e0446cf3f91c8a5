//! Writing a submitted form value back into the source document.
//!
//! The value is serialized in the document's own syntax and spliced over an
//! [`EditRange`] in one contiguous replacement. [`EditSession`] snapshots the
//! covered text when the form opens so a document edited in the meantime is
//! rejected instead of corrupted.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{DocumentIndex, FileLanguage, LineIndex, Position};
use crate::error::PatchError;
use crate::range::EditRange;

/// YAML output starts on a fresh line at column 0, one before the
/// resolved start column.
pub const YAML_START_LINE_PAD: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOptions {
    /// Spaces every serialized YAML line is indented by.
    pub yaml_indent: usize,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self { yaml_indent: 12 }
    }
}

// ---------------------------- Serialization ------------------------------- //

/// `value` in source syntax: an indented YAML block, or compact JSON.
pub fn serialize(value: &Value, language: FileLanguage, base_indent: usize) -> Result<String, PatchError> {
    match language {
        FileLanguage::Yaml => {
            let block = serde_yaml::to_string(value)?;
            Ok(indent_text(block.trim_end_matches('\n'), base_indent))
        }
        FileLanguage::Json => Ok(serde_json::to_string(value)?),
    }
}

/// Prefixes every non-empty line with `indent` spaces; relative
/// indentation is kept.
pub fn indent_text(text: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_owned()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// -------------------------------- Apply ----------------------------------- //

/// Byte span in `text` an [`EditRange`] covers once converted back to
/// 0-based lines (and, for YAML, pulled back by [`YAML_START_LINE_PAD`]).
fn byte_span(
    text: &str,
    lines: &LineIndex,
    range: EditRange,
    language: FileLanguage,
) -> Result<(usize, usize), PatchError> {
    let pad = match language {
        FileLanguage::Yaml => YAML_START_LINE_PAD,
        FileLanguage::Json => 0,
    };
    let start = Position::new(
        range.start.line.saturating_sub(1),
        range.start.character.saturating_sub(pad),
    );
    let end = Position::new(range.end.line.saturating_sub(1), range.end.character);
    let (start_offset, end_offset) = (lines.offset_at(text, start), lines.offset_at(text, end));
    if start_offset > end_offset {
        return Err(PatchError::InvalidRange { start: range.start, end: range.end });
    }
    Ok((start_offset, end_offset))
}

/// Replaces the text `range` covers with `replacement`.
pub fn apply(text: &str, range: EditRange, replacement: &str, language: FileLanguage) -> Result<String, PatchError> {
    let lines = LineIndex::new(text);
    let (start, end) = byte_span(text, &lines, range, language)?;
    let mut patched = String::with_capacity(text.len() - (end - start) + replacement.len());
    patched.push_str(&text[..start]);
    patched.push_str(replacement);
    patched.push_str(&text[end..]);
    debug!(start, end, replaced = end - start, inserted = replacement.len(), "applied patch");
    Ok(patched)
}

// ------------------------------- Session ---------------------------------- //

/// One "open form, submit" cycle over a single arguments node.
#[derive(Debug, Clone)]
pub struct EditSession {
    range: EditRange,
    language: FileLanguage,
    covered: String,
}

impl EditSession {
    pub fn open(doc: &DocumentIndex, range: EditRange) -> Result<Self, PatchError> {
        let (start, end) = byte_span(doc.text(), doc.lines(), range, doc.language())?;
        Ok(Self {
            range,
            language: doc.language(),
            covered: doc.text()[start..end].to_owned(),
        })
    }

    pub fn range(&self) -> EditRange {
        self.range
    }

    pub fn language(&self) -> FileLanguage {
        self.language
    }

    /// Serializes `value` and splices it into `current_text`, failing with
    /// [`PatchError::StaleRange`] if the covered text changed since
    /// [`EditSession::open`].
    pub fn submit(self, current_text: &str, value: &Value, options: PatchOptions) -> Result<String, PatchError> {
        let lines = LineIndex::new(current_text);
        let (start, end) = byte_span(current_text, &lines, self.range, self.language)?;
        if current_text[start..end] != self.covered {
            warn!(range = ?self.range, "edit range is stale, refusing to patch");
            return Err(PatchError::StaleRange);
        }
        let replacement = serialize(value, self.language, options.yaml_indent)?;
        apply(current_text, self.range, &replacement, self.language)
    }
}

// ------------------------------- Tests ------------------------------------ //
