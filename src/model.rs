//! The type graph: schema documents, namespaces and the elements they declare.
//!
//! Everything here is plain data, populated by the CSDL parser and never
//! mutated once a document is handed to the registry. Collections are
//! `Vec`s so iteration follows declaration order.

use serde::Serialize;

use crate::types::{Nullable, TypeKind};

/// Location a schema document was loaded from, recorded on every entity it
/// produces so diagnostics can cite the offending file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SchemaUri(String);

impl SchemaUri {
    pub fn new(uri: impl Into<String>) -> Self {
        SchemaUri(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaUri {
    fn from(s: &str) -> Self {
        SchemaUri(s.to_string())
    }
}

impl From<String> for SchemaUri {
    fn from(s: String) -> Self {
        SchemaUri(s)
    }
}

impl AsRef<str> for SchemaUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SchemaUri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A metadata term attached to a schema element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Qualified term, e.g. `OData.Description`.
    pub term: String,
    /// Attribute carrying a simple value (`String`, `Bool`, `EnumMember`...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_value: Option<String>,
}

impl Annotation {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            attr_key: None,
            attr_value: None,
        }
    }

    pub fn with_value(
        term: impl Into<String>,
        attr_key: impl Into<String>,
        attr_value: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            attr_key: Some(attr_key.into()),
            attr_value: Some(attr_value.into()),
        }
    }

    /// Boolean reading of the value, case-insensitive.
    pub fn as_bool(&self) -> Option<bool> {
        match self.attr_value.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => Some(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

/// Anything that carries annotations.
///
/// Structured types additionally expose themselves through `as_structured`
/// so inheritance-aware queries can continue up the `BaseType` chain.
pub trait Annotated {
    fn annotations(&self) -> &[Annotation];

    fn as_structured(&self) -> Option<&StructuredType> {
        None
    }
}

/// Structural property of an entity or complex type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    /// Qualified type name, e.g. `Edm.String` or `Resource.v1_0_0.Status`.
    pub type_name: String,
    pub nullable: Nullable,
    pub annotations: Vec<Annotation>,
}

/// Navigation (reference) property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationProperty {
    pub name: String,
    pub type_name: String,
    pub nullable: Nullable,
    pub annotations: Vec<Annotation>,
}

/// Shared shape of `EntityType` and `ComplexType`.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredType {
    pub kind: TypeKind,
    pub name: String,
    /// Name of the declaring namespace.
    pub namespace: String,
    /// Unresolved qualified name of the parent type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    pub is_abstract: bool,
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub annotations: Vec<Annotation>,
    pub schema_uri: SchemaUri,
}

impl StructuredType {
    /// `Namespace.Name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|p| p.name == name)
    }

    /// True if `name` is declared directly on this type (not on ancestors).
    pub fn declares_property(&self, name: &str) -> bool {
        self.property(name).is_some() || self.navigation_property(name).is_some()
    }

    fn same_definition(&self, other: &StructuredType) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.base_type == other.base_type
            && self.is_abstract == other.is_abstract
            && self.properties == other.properties
            && self.navigation_properties == other.navigation_properties
            && self.annotations == other.annotations
    }
}

/// Member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumType {
    pub name: String,
    pub namespace: String,
    pub members: Vec<EnumMember>,
    pub annotations: Vec<Annotation>,
    pub schema_uri: SchemaUri,
}

impl EnumType {
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionParameter {
    pub name: String,
    pub type_name: String,
    pub nullable: Nullable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub name: String,
    pub namespace: String,
    pub is_bound: bool,
    pub parameters: Vec<ActionParameter>,
    pub annotations: Vec<Annotation>,
    pub schema_uri: SchemaUri,
}

impl Action {
    /// The first parameter, which names the type a bound action operates on.
    pub fn binding_parameter(&self) -> Option<&ActionParameter> {
        self.parameters.first()
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// A `Schema` element: one named grouping of types and actions.
#[derive(Debug, Clone, Serialize)]
pub struct Namespace {
    pub name: String,
    /// The schema's own `Alias` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Back-reference to the declaring document.
    pub schema_uri: SchemaUri,
    pub entity_types: Vec<StructuredType>,
    pub complex_types: Vec<StructuredType>,
    pub enum_types: Vec<EnumType>,
    pub actions: Vec<Action>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, schema_uri: SchemaUri) -> Self {
        Self {
            name: name.into(),
            alias: None,
            schema_uri,
            entity_types: Vec::new(),
            complex_types: Vec::new(),
            enum_types: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn entity_types(&self) -> &[StructuredType] {
        &self.entity_types
    }

    pub fn complex_types(&self) -> &[StructuredType] {
        &self.complex_types
    }

    pub fn enum_types(&self) -> &[EnumType] {
        &self.enum_types
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn entity_type(&self, name: &str) -> Option<&StructuredType> {
        self.entity_types.iter().find(|t| t.name == name)
    }

    pub fn complex_type(&self, name: &str) -> Option<&StructuredType> {
        self.complex_types.iter().find(|t| t.name == name)
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enum_types.iter().find(|t| t.name == name)
    }

    /// Entity type first, then complex type.
    pub fn structured_type(&self, name: &str) -> Option<&StructuredType> {
        self.entity_type(name).or_else(|| self.complex_type(name))
    }

    /// Whether any kind of type named `name` is defined here.
    pub fn defines_type(&self, name: &str) -> bool {
        self.structured_type(name).is_some() || self.enum_type(name).is_some()
    }

    /// All overloads of an action.
    pub fn actions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Action> + 'a {
        self.actions.iter().filter(move |a| a.name == name)
    }

    /// Structural equality ignoring where the namespace was loaded from.
    pub fn content_eq(&self, other: &Namespace) -> bool {
        fn same<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(x, y))
        }

        self.name == other.name
            && self.alias == other.alias
            && same(&self.entity_types, &other.entity_types, |a, b| {
                a.same_definition(b)
            })
            && same(&self.complex_types, &other.complex_types, |a, b| {
                a.same_definition(b)
            })
            && same(&self.enum_types, &other.enum_types, |a, b| {
                a.name == b.name && a.members == b.members && a.annotations == b.annotations
            })
            && same(&self.actions, &other.actions, |a, b| {
                a.name == b.name
                    && a.is_bound == b.is_bound
                    && a.parameters == b.parameters
                    && a.annotations == b.annotations
            })
    }
}

/// `edmx:Include` inside a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Include {
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// `edmx:Reference` to another document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Target as written in the document (may be relative).
    pub uri: String,
    pub includes: Vec<Include>,
}

/// One parsed CSDL document.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDocument {
    pub uri: SchemaUri,
    /// Local name of the outermost element; `Edmx` for a conforming document.
    pub edmx_element: String,
    /// `Version` attribute of the outermost element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edmx_version: Option<String>,
    pub namespaces: Vec<Namespace>,
    pub references: Vec<Reference>,
}

impl SchemaDocument {
    /// Whether the outermost element is `Edmx`.
    pub fn is_edmx(&self) -> bool {
        self.edmx_element == "Edmx"
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Every include across all references, in document order.
    pub fn includes(&self) -> impl Iterator<Item = (&Reference, &Include)> {
        self.references
            .iter()
            .flat_map(|r| r.includes.iter().map(move |i| (r, i)))
    }

    /// Namespace an alias stands for within this document.
    ///
    /// Checks `Include` aliases first, then the aliases of the document's
    /// own `Schema` elements.
    pub fn alias_target(&self, alias: &str) -> Option<&str> {
        self.includes()
            .find(|(_, inc)| inc.alias.as_deref() == Some(alias))
            .map(|(_, inc)| inc.namespace.as_str())
            .or_else(|| {
                self.namespaces
                    .iter()
                    .find(|ns| ns.alias.as_deref() == Some(alias))
                    .map(|ns| ns.name.as_str())
            })
    }

    /// The reference whose includes list `namespace`.
    pub fn reference_for_namespace(&self, namespace: &str) -> Option<&Reference> {
        self.includes()
            .find(|(_, inc)| inc.namespace == namespace)
            .map(|(r, _)| r)
    }
}

impl Annotated for StructuredType {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn as_structured(&self) -> Option<&StructuredType> {
        Some(self)
    }
}

impl Annotated for Property {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for NavigationProperty {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for EnumType {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for EnumMember {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for Action {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}
