//! Service catalog: the per-operation argument descriptors the form schema
//! is synthesized from.
//!
//! Catalog files are produced elsewhere (OpenAPI parsing, registry fetch);
//! here they are only loaded, looked up by (schema location, operation id)
//! and resolved against a local specs directory.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::CatalogError;

// ------------------------------- Model ------------------------------------ //

/// Raw shape of one argument as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentDescriptor {
    /// A type name such as `"string"`, `"integer"` or the bare `"array"` marker.
    Primitive(String),
    /// Homogeneous list; the first element stands for all of them.
    Sequence(Vec<ArgumentDescriptor>),
    /// Nested object, name → descriptor.
    Mapping(IndexMap<String, ArgumentDescriptor>),
}

/// Arguments of one operation, in catalog order.
pub type ArgumentMap = IndexMap<String, ArgumentDescriptor>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogSource {
    #[serde(rename = "SERVICE_REGISTRY")]
    ServiceRegistry { url: String },
    #[serde(rename = "LOCAL_FS", rename_all = "camelCase")]
    LocalFs { absolute_file_path: String },
}

impl CatalogSource {
    /// URL or absolute path the service's schema was read from.
    pub fn location(&self) -> &str {
        match self {
            Self::ServiceRegistry { url } => url,
            Self::LocalFs { absolute_file_path } => absolute_file_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: ArgumentMap,
    #[serde(default)]
    pub required_arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub source: CatalogSource,
    #[serde(default)]
    pub functions: Vec<CatalogFunction>,
}

// ------------------------------- Catalog ---------------------------------- //

/// Read-only set of services. Lookups are linear; catalogs hold tens of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    services: Vec<CatalogService>,
}

impl Catalog {
    pub fn new(services: Vec<CatalogService>) -> Self {
        Self { services }
    }

    /// Each file holds one service object or an array of them.
    pub fn load<I>(paths: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let mut services = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let loaded = parse_services(&source).map_err(|(json_path, source)| CatalogError::Json {
                path: path.to_path_buf(),
                json_path,
                source,
            })?;
            debug!(path = %path.display(), services = loaded.len(), "loaded catalog file");
            services.extend(loaded);
        }
        Ok(Self { services })
    }

    pub fn services(&self) -> &[CatalogService] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn find_service(&self, schema_location: &str) -> Option<&CatalogService> {
        self.services
            .iter()
            .find(|service| service.source.location() == schema_location)
    }

    pub fn find_function(&self, schema_location: &str, operation_id: &str) -> Option<&CatalogFunction> {
        let found = self
            .find_service(schema_location)?
            .functions
            .iter()
            .find(|function| function.name == operation_id);
        trace!(schema_location, operation_id, found = found.is_some(), "catalog lookup");
        found
    }
}

fn parse_services(src: &str) -> Result<Vec<CatalogService>, (String, serde_json::Error)> {
    if src.trim_start().starts_with('[') {
        from_str_with_path(src)
    } else {
        from_str_with_path::<CatalogService>(src).map(|service| vec![service])
    }
}

/// Deserialize with JSON-path context for error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, (String, serde_json::Error)> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        (path, err.into_inner())
    })
}

// ----------------------------- Locations ---------------------------------- //

static REMOTE_LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").expect("valid regex"));

pub fn is_remote_location(location: &str) -> bool {
    REMOTE_LOCATION.is_match(location)
}

/// Remote locations pass through. Local ones are looked up by file name in
/// `specs_dir` when one is configured.
pub fn resolve_schema_location(location: &str, specs_dir: Option<&Path>) -> String {
    if is_remote_location(location) {
        return location.to_owned();
    }
    let Some(dir) = specs_dir else {
        return location.to_owned();
    };
    let file_name = Path::new(location)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(location));
    dir.join(file_name).to_string_lossy().into_owned()
}

/// A workflow function's `operation`, `<schema location>#<operation id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRef {
    pub open_api_schema_location: String,
    pub operation_id: String,
}

impl OperationRef {
    pub fn parse(operation: &str) -> Option<Self> {
        let mut parts = operation.split('#');
        let location = parts.next()?;
        let operation_id = parts.next().filter(|id| !id.is_empty())?;
        Some(Self {
            open_api_schema_location: location.to_owned(),
            operation_id: operation_id.to_owned(),
        })
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn petstore() -> CatalogService {
        serde_json::from_value(json!({
            "name": "petstore",
            "source": { "type": "SERVICE_REGISTRY", "url": "http://registry/petstore" },
            "functions": [
                {
                    "name": "addPet",
                    "arguments": { "name": "string", "tags": ["string"], "owner": { "id": "integer" } },
                    "requiredArguments": ["name"]
                },
                { "name": "listPets" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn descriptors_deserialize_into_the_union() {
        let service = petstore();
        let add = &service.functions[0];
        assert_eq!(add.arguments["name"], ArgumentDescriptor::Primitive("string".into()));
        assert_eq!(
            add.arguments["tags"],
            ArgumentDescriptor::Sequence(vec![ArgumentDescriptor::Primitive("string".into())])
        );
        assert!(matches!(add.arguments["owner"], ArgumentDescriptor::Mapping(_)));
        assert_eq!(add.required_arguments, vec!["name".to_string()]);
        assert!(service.functions[1].arguments.is_empty());
    }

    #[test]
    fn argument_order_survives_a_round_trip() {
        let service = petstore();
        let keys: Vec<_> = service.functions[0].arguments.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "tags", "owner"]);
        let back = serde_json::to_value(&service.functions[0].arguments).unwrap();
        assert_eq!(back, json!({ "name": "string", "tags": ["string"], "owner": { "id": "integer" } }));
    }

    #[test]
    fn lookup_by_location_and_operation() {
        let local: CatalogService = serde_json::from_value(json!({
            "source": { "type": "LOCAL_FS", "absoluteFilePath": "/specs/greet.yaml" },
            "functions": [{ "name": "greet", "arguments": {} }]
        }))
        .unwrap();
        let catalog = Catalog::new(vec![petstore(), local]);

        assert!(catalog.find_function("http://registry/petstore", "addPet").is_some());
        assert!(catalog.find_function("/specs/greet.yaml", "greet").is_some());
        assert!(catalog.find_function("http://registry/petstore", "greet").is_none());
        assert!(catalog.find_function("http://elsewhere", "addPet").is_none());
    }

    #[test]
    fn parse_errors_name_the_json_path() {
        let src = r#"[{ "source": { "type": "LOCAL_FS", "absoluteFilePath": "/x" }, "functions": [{ "name": 5 }] }]"#;
        let (path, _) = parse_services(src).unwrap_err();
        assert_eq!(path, "[0].functions[0].name");
    }

    #[test]
    fn schema_locations() {
        let dir = Path::new("/work/specs");
        assert_eq!(
            resolve_schema_location("https://host/api.yaml", Some(dir)),
            "https://host/api.yaml"
        );
        assert_eq!(
            resolve_schema_location("specs/nested/greet.yaml", Some(dir)),
            "/work/specs/greet.yaml"
        );
        assert_eq!(resolve_schema_location("greet.yaml", None), "greet.yaml");
    }

    #[test]
    fn operation_refs() {
        assert_eq!(
            OperationRef::parse("specs/greet.yaml#greet"),
            Some(OperationRef {
                open_api_schema_location: "specs/greet.yaml".into(),
                operation_id: "greet".into(),
            })
        );
        assert_eq!(OperationRef::parse("specs/greet.yaml"), None);
        assert_eq!(OperationRef::parse("specs/greet.yaml#"), None);
    }
}
