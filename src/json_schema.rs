//! The JSON-Schema representation of resource types.
//!
//! Kept apart from the CSDL model: the same constraint (required, nullable,
//! read-only, additional properties) can be stated differently in the two
//! representations, and callers must know which one they are checking.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LoadError;
use crate::identifier::SchemaVersion;
use crate::loader::load_json_schema;
use crate::model::SchemaUri;

/// Per-property flags of a JSON-Schema definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonSchemaProperty {
    pub name: String,
    /// Listed in the definition's `required` array.
    pub required: bool,
    pub nullable: bool,
    pub readonly: bool,
}

/// One entry of a schema file's `definitions` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonSchemaDefinition {
    /// Unversioned type name (the `definitions` key).
    pub type_name: String,
    pub properties: Vec<JsonSchemaProperty>,
    /// The `required` array as written, including names with no property entry.
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl JsonSchemaDefinition {
    pub fn property(&self, name: &str) -> Option<&JsonSchemaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn read_only_properties(&self) -> impl Iterator<Item = &JsonSchemaProperty> {
        self.properties.iter().filter(|p| p.readonly)
    }
}

/// All definitions parsed from one JSON-Schema file.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaSet {
    pub source: SchemaUri,
    pub definitions: Vec<JsonSchemaDefinition>,
}

impl JsonSchemaSet {
    /// Look up a definition.
    ///
    /// Accepts a bare type name or a namespace-qualified one, versioned or
    /// not (`Drive`, `Drive.Drive`, `#Drive.v1_0_0.Drive`); the namespace and
    /// version segments are stripped first since definitions are keyed by
    /// unversioned type name.
    pub fn definition(&self, type_name: &str) -> Option<&JsonSchemaDefinition> {
        let bare = type_name
            .trim_start_matches('#')
            .rsplit('.')
            .next()
            .unwrap_or(type_name);
        self.definitions.iter().find(|d| d.type_name == bare)
    }

    pub fn contains_type(&self, type_name: &str) -> bool {
        self.definition(type_name).is_some()
    }
}

/// A namespace's JSON-Schema counterpart and the file it came from.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMetadata {
    pub schema: JsonSchemaSet,
    pub file_name: PathBuf,
}

#[derive(Deserialize)]
struct RawSchemaFile {
    #[serde(default)]
    definitions: Map<String, Value>,
}

/// Parse an already-decoded JSON-Schema document.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the top level is not an object with
/// an object-valued `definitions` member (when present), and
/// `LoadError::InvalidDocument` if a definition is not an object.
pub fn parse_json_schema(value: Value, uri: SchemaUri) -> Result<JsonSchemaSet, LoadError> {
    let raw: RawSchemaFile = serde_json::from_value(value).map_err(|source| {
        LoadError::InvalidJson {
            uri: uri.to_string(),
            source,
        }
    })?;

    let definitions = raw
        .definitions
        .iter()
        .map(|(name, def)| parse_definition(name, def, &uri))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JsonSchemaSet {
        source: uri,
        definitions,
    })
}

fn parse_definition(
    name: &str,
    def: &Value,
    uri: &SchemaUri,
) -> Result<JsonSchemaDefinition, LoadError> {
    let Some(obj) = def.as_object() else {
        return Err(LoadError::invalid_document(
            uri.as_str(),
            format!("definition {} is not an object", name),
        ));
    };

    let required: Vec<String> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(prop_name, prop)| JsonSchemaProperty {
                    name: prop_name.clone(),
                    required: required.contains(prop_name),
                    nullable: is_nullable(prop),
                    readonly: prop.get("readonly").and_then(Value::as_bool).unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default();

    // Missing or schema-valued additionalProperties admits extra members
    let additional_properties = obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    Ok(JsonSchemaDefinition {
        type_name: name.to_string(),
        properties,
        required,
        additional_properties,
    })
}

/// Explicit `nullable` wins; otherwise a `"null"` entry in a `type` array or
/// a `{"type": "null"}` branch of `anyOf`/`oneOf`.
fn is_nullable(prop: &Value) -> bool {
    if let Some(explicit) = prop.get("nullable").and_then(Value::as_bool) {
        return explicit;
    }

    let type_allows_null = match prop.get("type") {
        Some(Value::String(t)) => t == "null",
        Some(Value::Array(types)) => types.iter().any(|t| t == "null"),
        _ => false,
    };

    type_allows_null
        || ["anyOf", "oneOf"].iter().any(|key| {
            prop.get(*key)
                .and_then(Value::as_array)
                .is_some_and(|branches| branches.iter().any(|b| b.get("type") == Some(&Value::from("null"))))
        })
}

/// Locate the JSON-Schema file for a namespace.
///
/// Picks the highest-versioned `<dir>/<namespace>.vMAJ_MIN_ERR.json`, and
/// falls back to `<dir>/<namespace>.json` only when no versioned file exists.
/// The unversioned file of a published bundle is an `anyOf` of references to
/// the versioned definitions and carries no properties of its own. Returns
/// `Ok(None)` when the directory holds no file for the namespace.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if `dir` does not exist and
/// `LoadError::ReadError` if it cannot be listed.
pub fn find_json_schema_file(namespace: &str, dir: &Path) -> Result<Option<PathBuf>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = format!("{}.", namespace);
    let mut best: Option<(SchemaVersion, PathBuf)> = None;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(version) = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(SchemaVersion::parse)
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(v, _)| version > *v) {
            best = Some((version, entry.path()));
        }
    }

    if let Some((_, path)) = best {
        return Ok(Some(path));
    }

    let unversioned = dir.join(format!("{}.json", namespace));
    Ok(unversioned.is_file().then_some(unversioned))
}

/// Locate and parse the JSON-Schema counterpart of a namespace.
///
/// This is the only bridge from the CSDL model to the JSON-Schema model;
/// checks on `required`, `readonly` or `additionalProperties` as stated in
/// JSON Schema go through here.
///
/// # Errors
///
/// Fetch errors for a missing or unreadable directory, parse errors for a
/// malformed schema file. A namespace without a file is `Ok(None)`.
pub fn get_resource_json_metadata(
    namespace: &str,
    dir: &Path,
) -> Result<Option<JsonMetadata>, LoadError> {
    let Some(path) = find_json_schema_file(namespace, dir)? else {
        tracing::debug!(namespace, dir = %dir.display(), "no JSON schema file for namespace");
        return Ok(None);
    };

    let schema = load_json_schema(&path)?;
    Ok(Some(JsonMetadata {
        schema,
        file_name: path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn drive_schema() -> Value {
        json!({
            "$schema": "http://redfish.dmtf.org/schemas/v1/redfish-schema.v1_0_0.json",
            "definitions": {
                "Drive": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["Id", "Name", "Missing"],
                    "properties": {
                        "Id": { "type": "string", "readonly": true },
                        "Name": { "type": "string", "readonly": true },
                        "Model": { "type": ["string", "null"], "readonly": true },
                        "AssetTag": { "type": "string", "nullable": true },
                        "Status": { "anyOf": [{ "$ref": "#/definitions/Status" }, { "type": "null" }] }
                    }
                },
                "Status": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                }
            }
        })
    }

    #[test]
    fn parses_definitions_in_order_with_flags() {
        let set = parse_json_schema(drive_schema(), SchemaUri::from("Drive.v1_0_0.json")).unwrap();
        assert_eq!(set.definitions.len(), 2);

        let drive = set.definition("Drive").unwrap();
        let names: Vec<_> = drive.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Id", "Name", "Model", "AssetTag", "Status"]);
        assert!(!drive.additional_properties);
        assert!(drive.property("Id").unwrap().required);
        assert!(drive.property("Id").unwrap().readonly);
        assert!(!drive.property("Id").unwrap().nullable);
        assert!(drive.property("Model").unwrap().nullable);
        assert!(drive.property("AssetTag").unwrap().nullable);
        assert!(!drive.property("AssetTag").unwrap().readonly);
        assert!(drive.property("Status").unwrap().nullable);
        assert_eq!(drive.required, ["Id", "Name", "Missing"]);
        assert_eq!(drive.read_only_properties().count(), 3);

        // Schema-valued additionalProperties admits extra members
        assert!(set.definition("Status").unwrap().additional_properties);
    }

    #[test]
    fn definition_lookup_strips_namespace_and_version() {
        let set = parse_json_schema(drive_schema(), SchemaUri::from("Drive.json")).unwrap();
        assert!(set.contains_type("Drive"));
        assert!(set.contains_type("Drive.Drive"));
        assert!(set.contains_type("#Drive.v1_0_0.Drive"));
        assert!(!set.contains_type("Volume"));
    }

    #[test]
    fn missing_definitions_is_empty_set() {
        let set = parse_json_schema(json!({ "title": "x" }), SchemaUri::from("x.json")).unwrap();
        assert!(set.definitions.is_empty());
    }

    #[test]
    fn non_object_definitions_is_parse_error() {
        let result = parse_json_schema(json!({ "definitions": [] }), SchemaUri::from("x.json"));
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));

        let result = parse_json_schema(json!({ "definitions": { "A": 1 } }), SchemaUri::from("x.json"));
        assert!(matches!(result, Err(LoadError::InvalidDocument { .. })));
    }

    #[test]
    fn find_file_prefers_highest_version_over_unversioned() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Drive.json"), "{}").unwrap();
        let found = find_json_schema_file("Drive", dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "Drive.json");

        std::fs::write(dir.path().join("Drive.v1_0_0.json"), "{}").unwrap();
        std::fs::write(dir.path().join("Drive.v1_10_0.json"), "{}").unwrap();
        std::fs::write(dir.path().join("Drive.v1_2_0.json"), "{}").unwrap();
        std::fs::write(dir.path().join("DriveCollection.json"), "{}").unwrap();

        let found = find_json_schema_file("Drive", dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "Drive.v1_10_0.json");

        assert!(find_json_schema_file("Volume", dir.path()).unwrap().is_none());
    }

    #[test]
    fn metadata_skips_unversioned_stub() {
        let dir = TempDir::new().unwrap();
        let stub = json!({
            "definitions": {
                "Drive": {
                    "anyOf": [
                        { "$ref": "http://redfish.dmtf.org/schemas/v1/Drive.v1_0_0.json#/definitions/Drive" }
                    ]
                }
            }
        });
        std::fs::write(dir.path().join("Drive.json"), stub.to_string()).unwrap();
        std::fs::write(dir.path().join("Drive.v1_0_0.json"), drive_schema().to_string()).unwrap();

        let metadata = get_resource_json_metadata("Drive", dir.path()).unwrap().unwrap();
        assert_eq!(metadata.file_name.file_name().unwrap(), "Drive.v1_0_0.json");

        let drive = metadata.schema.definition("Drive").unwrap();
        assert!(!drive.additional_properties);
        assert!(drive.property("Id").unwrap().required);
        assert!(drive.property("Id").unwrap().readonly);
    }

    #[test]
    fn find_file_missing_directory_is_fetch_error() {
        let result = find_json_schema_file("Drive", Path::new("/nonexistent/json-schema"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn get_resource_json_metadata_loads_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Drive.v1_0_0.json"),
            serde_json::to_string(&drive_schema()).unwrap(),
        )
        .unwrap();

        let meta = get_resource_json_metadata("Drive", dir.path()).unwrap().unwrap();
        assert!(meta.file_name.ends_with("Drive.v1_0_0.json"));
        assert!(meta.schema.contains_type("Drive"));

        assert!(get_resource_json_metadata("Volume", dir.path()).unwrap().is_none());
    }

    #[test]
    fn get_resource_json_metadata_malformed_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Drive.json"), "not json").unwrap();
        let result = get_resource_json_metadata("Drive", dir.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }
}
