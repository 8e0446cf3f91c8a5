//! Structural editing support for workflow documents in "argument form":
//! locate the `arguments` object of a function reference, synthesize a form
//! schema for it from a service catalog, and write the submitted value back
//! as JSON or YAML over a precisely computed range.
pub mod catalog;
pub mod cli;
pub mod document;
pub mod error;
pub mod lens;
pub mod navigator;
pub mod patch;
pub mod range;
pub mod schema;

pub use catalog::{ArgumentDescriptor, ArgumentMap, Catalog, OperationRef};
pub use document::{DocumentIndex, FileLanguage, NodeId, NodeKind, Position};
pub use error::{CatalogError, ParseError, PatchError};
pub use lens::{ArgumentsLens, arguments_lenses};
pub use patch::{EditSession, PatchOptions};
pub use range::{EditRange, resolve_edit_range};
pub use schema::{FormGenerator, GeneratedForm, SynthesizedSchema, synthesize};
