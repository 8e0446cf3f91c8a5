//! Argument schema synthesis.
//!
//! Turns a catalog operation's [`ArgumentMap`] into the JSON-Schema-shaped
//! structure a form renderer consumes. Rules, per named argument:
//! - bare `"array"` marker → dropped (no element type to offer)
//! - any other type name → `{ type: name }`
//! - sequence → `{ type: "array", items: ... }` from the first element only;
//!   a sequence element is read as an object keyed `"0"`, `"1"`, ...
//! - mapping → `{ type: "object", properties: ... }`
//!
//! The top level is always an object carrying the caller's `required` list
//! verbatim; nothing here infers required-ness.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{ArgumentDescriptor, ArgumentMap, Catalog};

/// Marker the catalog uses for an array whose element type it could not express.
const BARE_ARRAY_MARKER: &str = "array";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SynthesizedSchema {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SynthesizedSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SynthesizedSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl SynthesizedSchema {
    pub fn primitive(ty: impl Into<String>) -> Self {
        Self { ty: ty.into(), ..Self::default() }
    }

    pub fn object(properties: IndexMap<String, SynthesizedSchema>) -> Self {
        Self {
            ty: "object".into(),
            properties: Some(properties),
            ..Self::default()
        }
    }

    pub fn array(items: SynthesizedSchema) -> Self {
        Self {
            ty: "array".into(),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }
}

// ----------------------------- Diagnostics -------------------------------- //

/// Descriptor shapes the synthesizer tolerates but cannot represent faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaDiagnostic {
    /// A bare `"array"` marker was dropped.
    DroppedArrayMarker { path: String },
    /// An empty sequence gives no element shape; the argument was dropped.
    EmptySequence { path: String },
    /// Sequence elements disagree in shape; only the first was used.
    NonHomogeneousSequence { path: String },
    /// A sequence nested as element type became an object keyed by index.
    NestedSequence { path: String },
}

impl fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DroppedArrayMarker { path } => {
                write!(f, "`{path}`: bare \"array\" marker has no element type, argument dropped")
            }
            Self::EmptySequence { path } => write!(f, "`{path}`: empty sequence, argument dropped"),
            Self::NonHomogeneousSequence { path } => {
                write!(f, "`{path}`: sequence elements differ in shape, only the first is used")
            }
            Self::NestedSequence { path } => {
                write!(f, "`{path}`: nested sequence treated as an object keyed by index")
            }
        }
    }
}

// ------------------------------ Synthesis --------------------------------- //

/// Schema for an operation's arguments.
pub fn synthesize(arguments: &ArgumentMap, required: &[String]) -> SynthesizedSchema {
    synthesize_with_diagnostics(arguments, required).0
}

/// [`synthesize`], also reporting every descriptor it had to drop or sample.
pub fn synthesize_with_diagnostics(
    arguments: &ArgumentMap,
    required: &[String],
) -> (SynthesizedSchema, Vec<SchemaDiagnostic>) {
    let mut synth = Synthesizer::default();
    let mut schema = SynthesizedSchema::object(synth.properties(arguments, ""));
    schema.required = Some(required.to_vec());
    for diagnostic in &synth.diagnostics {
        warn!(%diagnostic, "argument schema synthesis");
    }
    (schema, synth.diagnostics)
}

#[derive(Default)]
struct Synthesizer {
    diagnostics: Vec<SchemaDiagnostic>,
}

impl Synthesizer {
    fn properties(&mut self, arguments: &ArgumentMap, prefix: &str) -> IndexMap<String, SynthesizedSchema> {
        let mut properties = IndexMap::new();
        for (name, descriptor) in arguments {
            let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
            if let Some(schema) = self.argument(descriptor, &path) {
                properties.insert(name.clone(), schema);
            }
        }
        properties
    }

    fn argument(&mut self, descriptor: &ArgumentDescriptor, path: &str) -> Option<SynthesizedSchema> {
        match descriptor {
            ArgumentDescriptor::Primitive(name) if name == BARE_ARRAY_MARKER => {
                self.diagnostics
                    .push(SchemaDiagnostic::DroppedArrayMarker { path: path.to_owned() });
                None
            }
            ArgumentDescriptor::Primitive(name) => Some(SynthesizedSchema::primitive(name.clone())),
            ArgumentDescriptor::Sequence(elements) => {
                let Some(first) = elements.first() else {
                    self.diagnostics
                        .push(SchemaDiagnostic::EmptySequence { path: path.to_owned() });
                    return None;
                };
                if elements.iter().skip(1).any(|other| !same_shape(first, other)) {
                    self.diagnostics
                        .push(SchemaDiagnostic::NonHomogeneousSequence { path: path.to_owned() });
                }
                let item_path = format!("{path}[]");
                let items = match first {
                    ArgumentDescriptor::Primitive(name) => SynthesizedSchema::primitive(name.clone()),
                    ArgumentDescriptor::Mapping(fields) => {
                        SynthesizedSchema::object(self.properties(fields, &item_path))
                    }
                    // read as a mapping keyed by element index
                    ArgumentDescriptor::Sequence(inner) => {
                        self.diagnostics
                            .push(SchemaDiagnostic::NestedSequence { path: item_path.clone() });
                        let fields: ArgumentMap = inner
                            .iter()
                            .enumerate()
                            .map(|(index, element)| (index.to_string(), element.clone()))
                            .collect();
                        SynthesizedSchema::object(self.properties(&fields, &item_path))
                    }
                };
                Some(SynthesizedSchema::array(items))
            }
            ArgumentDescriptor::Mapping(fields) => Some(SynthesizedSchema::object(self.properties(fields, path))),
        }
    }
}

fn same_shape(a: &ArgumentDescriptor, b: &ArgumentDescriptor) -> bool {
    match (a, b) {
        (ArgumentDescriptor::Primitive(x), ArgumentDescriptor::Primitive(y)) => x == y,
        (ArgumentDescriptor::Sequence(_), ArgumentDescriptor::Sequence(_)) => true,
        (ArgumentDescriptor::Mapping(x), ArgumentDescriptor::Mapping(y)) => {
            x.len() == y.len() && x.keys().all(|k| y.contains_key(k))
        }
        _ => false,
    }
}

// ---------------------------- Form generator ------------------------------ //

/// Schema plus the default-value model handed to the form renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedForm {
    /// The catalog's argument map, passed through unchanged.
    pub model: ArgumentMap,
    pub schema: SynthesizedSchema,
}

pub struct FormGenerator<'a> {
    catalog: &'a Catalog,
}

impl<'a> FormGenerator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// `None` when the location or operation is not in the catalog.
    pub fn generate(&self, schema_location: &str, operation_id: &str) -> Option<GeneratedForm> {
        let Some(function) = self.catalog.find_function(schema_location, operation_id) else {
            debug!(schema_location, operation_id, "no schema: operation not in catalog");
            return None;
        };
        Some(GeneratedForm {
            model: function.arguments.clone(),
            schema: synthesize(&function.arguments, &function.required_arguments),
        })
    }
}

// ------------------------------- Tests ------------------------------------ //
