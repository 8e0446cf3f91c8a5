//! Error taxonomy.
//!
//! "Not found" states (unknown operation, missing arguments node) are never
//! errors here: they surface as `None` or an empty list at the call site.
use std::path::PathBuf;
use thiserror::Error;

use crate::document::Position;

/// The source text could not be turned into a node tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {}, column {})", .position.line + 1, .position.character + 1)]
pub struct ParseError {
    pub message: String,
    /// Byte offset where the problem was detected.
    pub offset: usize,
    pub position: Position,
}

impl ParseError {
    pub(crate) fn at(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(text.len());
        let position = crate::document::LineIndex::new(text).position_at(text, offset);
        Self { message: message.into(), offset, position }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog file {}: at JSON path {json_path} → {source}", .path.display())]
    Json {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PatchError {
    /// The covered text no longer matches what it was when the range was computed.
    #[error("document changed since the edit range was computed, please retry")]
    StaleRange,
    #[error("edit range is inverted: start {start:?} is after end {end:?}")]
    InvalidRange { start: Position, end: Position },
    #[error("failed to serialize value as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to serialize value as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
