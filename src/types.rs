//! Core types shared by the loader, registry and resolvers.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for HTTP document fetches (10 seconds).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Well-known annotation terms.
pub const DESCRIPTION_TERM: &str = "OData.Description";
pub const LONG_DESCRIPTION_TERM: &str = "OData.LongDescription";
pub const ADDITIONAL_PROPERTIES_TERM: &str = "OData.AdditionalProperties";
pub const REQUIRED_TERM: &str = "Redfish.Required";

/// Properties every resource inherits from the common resource definition.
///
/// These never count as undeclared when classifying payload keys.
pub const COMMON_RESOURCE_PROPERTIES: &[&str] = &["Id", "Name", "Description", "Oem"];

/// Declared content kind of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// EDMX/CSDL XML metadata.
    XmlCsdl,
    /// JSON-Schema file with a top-level `definitions` map.
    JsonSchema,
}

impl DocumentKind {
    /// Guess the kind from a location's extension. Anything that is not
    /// `.json` is treated as CSDL, since `$metadata` has no extension.
    pub fn from_location(location: &str) -> Self {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        if path.to_ascii_lowercase().ends_with(".json") {
            DocumentKind::JsonSchema
        } else {
            DocumentKind::XmlCsdl
        }
    }
}

/// Tri-state `Nullable` facet of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullable {
    True,
    False,
    /// Attribute absent from the document.
    #[default]
    Unspecified,
}

impl Nullable {
    /// Parse the attribute value. Unknown spellings count as unspecified.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") => Nullable::True,
            Some(v) if v.eq_ignore_ascii_case("false") => Nullable::False,
            _ => Nullable::Unspecified,
        }
    }

    /// True only when the document explicitly says `Nullable="false"`.
    pub fn is_non_nullable(&self) -> bool {
        *self == Nullable::False
    }
}

/// Discriminator for the two structured type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    EntityType,
    ComplexType,
}

impl TypeKind {
    /// Element name used in CSDL.
    pub fn element_name(&self) -> &'static str {
        match self {
            TypeKind::EntityType => "EntityType",
            TypeKind::ComplexType => "ComplexType",
        }
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element_name())
    }
}

/// Options for fetching and loading schema documents.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Timeout applied to each HTTP fetch.
    pub timeout: Duration,
    /// Local directory that mirrors `remote_base`.
    pub local_base: Option<PathBuf>,
    /// URL prefix served from `local_base` instead of the network.
    pub remote_base: Option<String>,
    /// Load every document reachable through `Reference` elements.
    pub follow_references: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            local_base: None,
            remote_base: None,
            follow_references: false,
        }
    }
}

impl LoadOptions {
    /// Create options with the default timeout and no URL mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP fetch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serve URLs starting with `remote_base` from files under `local_base`.
    ///
    /// `https://redfish.dmtf.org/schemas/v1` + `Resource_v1.xml` maps to
    /// `<local_base>/Resource_v1.xml`.
    pub fn url_mapping(mut self, local_base: impl Into<PathBuf>, remote_base: impl Into<String>) -> Self {
        self.local_base = Some(local_base.into());
        self.remote_base = Some(remote_base.into());
        self
    }

    /// Enable or disable transitive loading of referenced documents.
    pub fn follow_references(mut self, follow: bool) -> Self {
        self.follow_references = follow;
        self
    }
}
