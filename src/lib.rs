//! CSDL Schema Resolver
//!
//! Loads Redfish/OData schema documents (EDMX/CSDL XML and their JSON-Schema
//! counterparts) into a merged namespace registry and answers typed queries
//! against it: inheritance-aware annotation lookups, property and action
//! membership, `@odata.type` resolution, and `$metadata` reference checks.
//!
//! # Example
//!
//! ```
//! use csdl_resolver::{load_csdl_str, parse_odata_type, NamespaceRegistry};
//!
//! let xml = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
//!   <edmx:DataServices>
//!     <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Resource">
//!       <EntityType Name="Resource" Abstract="true">
//!         <Annotation Term="OData.Description" String="Base type."/>
//!       </EntityType>
//!     </Schema>
//!     <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Drive.v1_0_0">
//!       <EntityType Name="Drive" BaseType="Resource.Resource">
//!         <Property Name="CapacityBytes" Type="Edm.Int64"/>
//!       </EntityType>
//!     </Schema>
//!   </edmx:DataServices>
//! </edmx:Edmx>"#;
//!
//! let mut registry = NamespaceRegistry::new();
//! registry.load(load_csdl_str(xml, "Drive_v1.xml").unwrap());
//! let resolver = registry.resolver();
//!
//! let drive = resolver.resolve_odata_type("#Drive.v1_0_0.Drive").unwrap();
//! assert_eq!(drive.ty.qualified_name(), "Drive.v1_0_0.Drive");
//!
//! // The description is inherited from Resource.Resource
//! let description = resolver
//!     .get_annotation_recursive(drive.ty, "OData.Description")
//!     .unwrap();
//! assert_eq!(description.attr_value.as_deref(), Some("Base type."));
//!
//! assert_eq!(
//!     parse_odata_type("#Drive.v1_0_0.Drive"),
//!     Some(("Drive".to_string(), "Drive".to_string()))
//! );
//! ```
//!
//! # Query families
//!
//! | Question | XML (CSDL) model | JSON-Schema model |
//! |----------|------------------|-------------------|
//! | Does the type carry term T? | [`Resolver::get_annotation_recursive`] | - |
//! | Is the property declared? | [`Resolver::verify_property_in_resource_recursive`] | [`JsonSchemaDefinition::property`] |
//! | Are extra properties allowed? | [`Resolver::additional_properties_allowed`] | [`JsonSchemaDefinition::additional_properties`](JsonSchemaDefinition) |
//! | Is the action bound here? | [`Resolver::verify_action_name_recursive`] | - |
//!
//! The two models are never merged; use [`get_resource_json_metadata`] to
//! reach the JSON-Schema side.

mod csdl;
mod error;
mod identifier;
mod json_schema;
mod loader;
mod model;
mod registry;
mod resolver;
mod types;

pub use csdl::parse_csdl;
pub use error::{LoadError, LoadErrorKind, LoadFailure};
pub use identifier::{
    is_version_segment, namespace_version, parse_action_name, parse_odata_type,
    parse_unversioned_odata_type, unversioned_namespace, BaseTypeStatus, ODataType, ResolvedType,
    SchemaVersion,
};
pub use json_schema::{
    find_json_schema_file, get_resource_json_metadata, parse_json_schema, JsonMetadata,
    JsonSchemaDefinition, JsonSchemaProperty, JsonSchemaSet,
};
pub use loader::{
    is_url, load_csdl, load_csdl_str, load_document, load_document_from,
    load_json_schema, load_json_schema_str, map_url_to_path, resolve_reference_uri,
    DefaultSource, DocumentSource, LoadedDocument,
};
pub use model::{
    Action, ActionParameter, Annotated, Annotation, EnumMember, EnumType, Include, Namespace,
    NavigationProperty, Property, Reference, SchemaDocument, SchemaUri, StructuredType,
};
pub use registry::{Inconsistency, LoadOutcome, NamespaceRegistry};
pub use resolver::{strip_collection, BaseTypeChain, ChainEnd, Resolver};
pub use types::{
    DocumentKind, LoadOptions, Nullable, TypeKind, ADDITIONAL_PROPERTIES_TERM,
    COMMON_RESOURCE_PROPERTIES, DEFAULT_FETCH_TIMEOUT, DESCRIPTION_TERM, LONG_DESCRIPTION_TERM,
    REQUIRED_TERM,
};

#[cfg(feature = "remote")]
pub use loader::load_csdl_url;
