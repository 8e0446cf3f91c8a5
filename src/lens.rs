//! "+ Add arguments..." code lenses for workflow documents.
//!
//! A lens sits on every `arguments` object under
//! `states/*/actions/*/functionRef`, provided the function reference names a
//! workflow function whose `operation` points into a schema
//! (`<location>#<operationId>`). The lens carries everything the host needs
//! to open the form and later write the result back.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::OperationRef;
use crate::document::{DocumentIndex, NodeId, NodeKind, Position};
use crate::navigator::{
    PathSegment, ancestor_of_type, find_all_by_path, find_by_path, property_value, string_value,
};
use crate::range::{EditRange, resolve_edit_range};

pub const ADD_ARGUMENTS_TITLE: &str = "+ Add arguments...";
pub const OPEN_ARGUMENTS_FORM_COMMAND: &str = "swf.ls.commands.OpenArgumentsForm";

/// `states/*/actions/*/functionRef/arguments`
pub fn arguments_path() -> Vec<PathSegment> {
    ["states", "*", "actions", "*", "functionRef", "arguments"]
        .into_iter()
        .map(PathSegment::from)
        .collect()
}

// --------------------------- Workflow queries ----------------------------- //

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFunction {
    pub name: String,
    pub operation: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Root-level `functions` entries that have both a name and an operation.
pub fn workflow_functions(doc: &DocumentIndex) -> Vec<WorkflowFunction> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    let Some(functions) = find_by_path(doc, root, &[PathSegment::from("functions")]) else {
        return Vec::new();
    };
    if doc.node(functions).kind != NodeKind::Array {
        return Vec::new();
    }
    doc.children(functions)
        .iter()
        .filter_map(|&function| {
            let field = |key: &str| {
                property_value(doc, function, key)
                    .and_then(|v| string_value(doc, v))
                    .map(str::to_owned)
            };
            Some(WorkflowFunction {
                name: field("name")?,
                operation: field("operation")?,
                kind: field("type"),
            })
        })
        .collect()
}

// -------------------------------- Lenses ---------------------------------- //

/// Arguments of the `swf.ls.commands.OpenArgumentsForm` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenArgumentsForm {
    #[serde(flatten)]
    pub operation: OperationRef,
    pub start_position: Position,
    pub end_position: Position,
}

impl OpenArgumentsForm {
    pub fn edit_range(&self) -> EditRange {
        EditRange {
            start: self.start_position,
            end: self.end_position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentsLens {
    /// 0-based anchor: the start of the arguments object.
    pub position: Position,
    pub title: &'static str,
    pub command: &'static str,
    pub arguments: OpenArgumentsForm,
    #[serde(skip)]
    pub node: NodeId,
}

pub fn arguments_lenses(doc: &DocumentIndex) -> Vec<ArgumentsLens> {
    let Some(root) = doc.root() else {
        return Vec::new();
    };
    let functions = workflow_functions(doc);
    let lenses: Vec<_> = find_all_by_path(doc, root, &arguments_path())
        .into_iter()
        .filter_map(|node| arguments_lens(doc, node, &functions))
        .collect();
    debug!(lenses = lenses.len(), functions = functions.len(), "computed arguments lenses");
    lenses
}

fn arguments_lens(doc: &DocumentIndex, node: NodeId, functions: &[WorkflowFunction]) -> Option<ArgumentsLens> {
    if doc.node(node).kind != NodeKind::Object {
        return None;
    }
    let function_ref = ancestor_of_type(doc, doc.parent(node), NodeKind::Object)?;
    let ref_name = string_value(doc, property_value(doc, function_ref, "refName")?)?;
    let function = functions.iter().find(|f| f.name == ref_name)?;
    let Some(operation) = OperationRef::parse(&function.operation) else {
        debug!(ref_name, operation = %function.operation, "function operation has no `#operationId`");
        return None;
    };
    let range = resolve_edit_range(doc, node);
    Some(ArgumentsLens {
        position: doc.position_at(doc.node(node).offset),
        title: ADD_ARGUMENTS_TITLE,
        command: OPEN_ARGUMENTS_FORM_COMMAND,
        arguments: OpenArgumentsForm {
            operation,
            start_position: range.start,
            end_position: range.end,
        },
        node,
    })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FileLanguage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const YAML_FLOW: &str = "\
id: greeting
functions:
  - name: greet
    operation: specs/greet.yaml#greet
  - name: noop
    operation: specs/greet.yaml
    type: custom
states:
  - name: Start
    actions:
      - functionRef:
          refName: greet
          arguments:
            name: John
      - functionRef:
          refName: noop
          arguments:
            x: 1
      - functionRef:
          refName: missing
          arguments:
            x: 1
      - functionRef:
          refName: greet
          arguments: []
";

    #[test]
    fn functions_are_read_from_the_root() {
        let doc = DocumentIndex::parse(YAML_FLOW, FileLanguage::Yaml).unwrap();
        assert_eq!(
            workflow_functions(&doc),
            vec![
                WorkflowFunction {
                    name: "greet".into(),
                    operation: "specs/greet.yaml#greet".into(),
                    kind: None,
                },
                WorkflowFunction {
                    name: "noop".into(),
                    operation: "specs/greet.yaml".into(),
                    kind: Some("custom".into()),
                },
            ]
        );
    }

    #[test]
    fn only_resolvable_object_arguments_get_a_lens() {
        let doc = DocumentIndex::parse(YAML_FLOW, FileLanguage::Yaml).unwrap();
        let lenses = arguments_lenses(&doc);
        assert_eq!(lenses.len(), 1);

        let lens = &lenses[0];
        assert_eq!(lens.position, Position::new(13, 12));
        assert_eq!(lens.arguments.operation.operation_id, "greet");
        assert_eq!(lens.arguments.operation.open_api_schema_location, "specs/greet.yaml");
        assert_eq!(lens.arguments.start_position, Position::new(14, 1));
        assert_eq!(lens.arguments.end_position, Position::new(14, "            name: John".len() as u32 + 1));
    }

    #[test]
    fn lens_serializes_like_the_command_payload() {
        let doc = DocumentIndex::parse(YAML_FLOW, FileLanguage::Yaml).unwrap();
        let lens = &arguments_lenses(&doc)[0];
        assert_eq!(
            serde_json::to_value(&lens.arguments).unwrap(),
            json!({
                "openApiSchemaLocation": "specs/greet.yaml",
                "operationId": "greet",
                "startPosition": { "line": 14, "character": 1 },
                "endPosition": { "line": 14, "character": 23 }
            })
        );
    }

    #[test]
    fn documents_without_workflow_shape_have_no_lenses() {
        for (text, language) in [
            ("[]", FileLanguage::Json),
            (r#"{"states": "nope"}"#, FileLanguage::Json),
            ("", FileLanguage::Yaml),
        ] {
            let doc = DocumentIndex::parse(text, language).unwrap();
            assert!(arguments_lenses(&doc).is_empty());
        }
    }
}
