//! Parsing of `@odata.type` strings and qualified action names, and the
//! queries that check them against the loaded type graph.
//!
//! Redfish namespaces carry a version segment (`Drive.v1_0_2`). Payloads
//! name types as `#Drive.v1_0_2.Drive`, actions as `#Drive.SecureErase`;
//! both forms are reduced to an unversioned `(namespace, name)` pair here.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{Namespace, SchemaDocument, StructuredType};
use crate::resolver::Resolver;

static VERSION_SEGMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^v(\d+)(?:_(\d+))?(?:_(\d+))?$").ok());

/// A schema version token such as `v1_0_2`.
///
/// Missing minor/errata components read as zero, so `v1` < `v1_0_1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub errata: u32,
}

impl SchemaVersion {
    /// Parse a `v\d+(_\d+){0,2}` token.
    pub fn parse(token: &str) -> Option<Self> {
        let caps = VERSION_SEGMENT.as_ref()?.captures(token)?;
        let component = |i: usize| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        Some(SchemaVersion {
            major: component(1)?,
            minor: component(2)?,
            errata: component(3)?,
        })
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}_{}_{}", self.major, self.minor, self.errata)
    }
}

/// True if `token` is a version segment.
pub fn is_version_segment(token: &str) -> bool {
    VERSION_SEGMENT
        .as_ref()
        .is_some_and(|re| re.is_match(token))
}

/// Namespace name with a trailing version segment removed.
///
/// `Drive.v1_0_2` -> `Drive`; `Resource` -> `Resource`.
pub fn unversioned_namespace(namespace: &str) -> &str {
    match namespace.rsplit_once('.') {
        Some((head, tail)) if is_version_segment(tail) => head,
        _ => namespace,
    }
}

/// Version of a namespace name, if it carries one.
pub fn namespace_version(namespace: &str) -> Option<SchemaVersion> {
    namespace
        .rsplit_once('.')
        .and_then(|(_, tail)| SchemaVersion::parse(tail))
}

/// A parsed `@odata.type` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ODataType {
    /// Namespace without the version segment.
    pub namespace: String,
    /// Version segment as written, e.g. `v1_0_2`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub type_name: String,
}

impl ODataType {
    /// Parse `#Namespace.vMAJ_MIN_ERR.TypeName` or `#Namespace.TypeName`.
    ///
    /// Returns `None` when the leading `#` or the `.` separator is missing.
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.trim().strip_prefix('#')?;
        split_qualified(body)
    }

    /// `Namespace.vX_Y_Z` when versioned, else the bare namespace.
    pub fn versioned_namespace(&self) -> String {
        match &self.version {
            Some(v) => format!("{}.{}", self.namespace, v),
            None => self.namespace.clone(),
        }
    }

    /// `Namespace.TypeName` with the version removed.
    pub fn unversioned(&self) -> String {
        format!("{}.{}", self.namespace, self.type_name)
    }
}

fn split_qualified(body: &str) -> Option<ODataType> {
    let (head, type_name) = body.rsplit_once('.')?;
    let (namespace, version) = match head.rsplit_once('.') {
        Some((ns, tail)) if is_version_segment(tail) => (ns, Some(tail.to_string())),
        _ => (head, None),
    };
    if type_name.is_empty()
        || is_version_segment(type_name)
        || is_version_segment(namespace)
        || namespace.split('.').any(str::is_empty)
    {
        return None;
    }
    Some(ODataType {
        namespace: namespace.to_string(),
        version,
        type_name: type_name.to_string(),
    })
}

/// Split an `@odata.type` value into unversioned namespace and type name.
///
/// `#Resource.v1_0_2.Drive` and `#Resource.Drive` both give
/// `("Resource", "Drive")`; anything without `#` or a `.` gives `None`.
pub fn parse_odata_type(s: &str) -> Option<(String, String)> {
    ODataType::parse(s).map(|t| (t.namespace, t.type_name))
}

/// `#Resource.v1_0_2.Drive` -> `Resource.Drive`.
pub fn parse_unversioned_odata_type(s: &str) -> Option<String> {
    ODataType::parse(s).map(|t| t.unversioned())
}

/// Split a qualified action name (`#ComputerSystem.Reset`) into namespace
/// and action name. The `#` is optional and a version segment is dropped.
pub fn parse_action_name(s: &str) -> Option<(String, String)> {
    let s = s.trim();
    let body = s.strip_prefix('#').unwrap_or(s);
    split_qualified(body).map(|t| (t.namespace, t.type_name))
}

/// Outcome of [`Resolver::resolve_odata_type`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedType<'r> {
    pub namespace: &'r Namespace,
    pub ty: &'r StructuredType,
}

/// Independent flags from [`Resolver::verify_resource_basetype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BaseTypeStatus {
    pub namespace_found: bool,
    pub type_found: bool,
}

impl<'r> Resolver<'r> {
    /// Resolve an `@odata.type` value to the type it names.
    ///
    /// Lookup order: the exact versioned namespace, then the newest
    /// versioned namespace with the same base name that defines the type,
    /// then the unversioned namespace.
    pub fn resolve_odata_type(&self, odata_type: &str) -> Option<ResolvedType<'r>> {
        let parsed = ODataType::parse(odata_type)?;
        let registry = self.registry();
        let in_namespace = |ns: &'r Namespace| {
            ns.structured_type(&parsed.type_name)
                .map(|ty| ResolvedType { namespace: ns, ty })
        };

        if parsed.version.is_some() {
            let exact = parsed.versioned_namespace();
            if let Some(found) = registry.find_namespaces(&exact).find_map(in_namespace) {
                return Some(found);
            }
        }

        let newest = registry
            .namespaces()
            .filter(|ns| unversioned_namespace(&ns.name) == parsed.namespace)
            .filter_map(|ns| namespace_version(&ns.name).map(|v| (v, ns)))
            .filter_map(|(v, ns)| in_namespace(ns).map(|found| (v, found)))
            .max_by_key(|(v, _)| *v)
            .map(|(_, found)| found);
        if newest.is_some() {
            return newest;
        }

        let found = registry
            .find_namespaces(&parsed.namespace)
            .find_map(in_namespace);
        if found.is_none() {
            tracing::debug!(odata_type, "@odata.type does not resolve");
        }
        found
    }

    /// Check a qualified base type string against the registry.
    ///
    /// The namespace part is matched exactly (or as a schema alias); the type
    /// part is looked up among that namespace's entity types only.
    pub fn verify_resource_basetype(&self, base_type: &str) -> BaseTypeStatus {
        let base_type = base_type.trim().trim_start_matches('#');
        let Some((ns_name, type_name)) = base_type.rsplit_once('.') else {
            return BaseTypeStatus::default();
        };

        let registry = self.registry();
        let mut candidates: Vec<&Namespace> = registry.find_namespaces(ns_name).collect();
        if candidates.is_empty() {
            candidates = registry
                .namespaces()
                .filter(|ns| ns.alias.as_deref() == Some(ns_name))
                .collect();
        }

        BaseTypeStatus {
            namespace_found: !candidates.is_empty(),
            type_found: candidates.iter().any(|ns| ns.entity_type(type_name).is_some()),
        }
    }

    /// Whether a type is defined in, or referenced from, a `$metadata`
    /// document.
    ///
    /// `namespace` is unversioned, as returned by [`parse_odata_type`].
    /// Direct definitions are checked first. Otherwise an `Include` of the
    /// namespace (any version) qualifies; when the included namespace is
    /// loaded in the registry it must also define the type.
    pub fn verify_resource_metadata_reference(
        &self,
        namespace: &str,
        type_name: &str,
        metadata: &SchemaDocument,
    ) -> bool {
        let defined = metadata
            .namespaces
            .iter()
            .filter(|ns| ns.name == namespace || unversioned_namespace(&ns.name) == namespace)
            .any(|ns| ns.defines_type(type_name));
        if defined {
            return true;
        }

        let registry = self.registry();
        metadata
            .includes()
            .filter(|(_, inc)| {
                inc.namespace == namespace || unversioned_namespace(&inc.namespace) == namespace
            })
            .any(|(_, inc)| {
                let mut loaded = registry.find_namespaces(&inc.namespace).peekable();
                if loaded.peek().is_none() {
                    return true;
                }
                loaded.any(|ns| ns.defines_type(type_name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_odata_type_versioned_and_bare() {
        assert_eq!(
            parse_odata_type("#Resource.v1_0_2.Drive"),
            Some(("Resource".into(), "Drive".into()))
        );
        assert_eq!(
            parse_odata_type("#Resource.Drive"),
            Some(("Resource".into(), "Drive".into()))
        );
        assert_eq!(parse_odata_type("NotAType"), None);
        assert_eq!(parse_odata_type("Resource.Drive"), None);
        assert_eq!(parse_odata_type("#Drive"), None);
        assert_eq!(parse_odata_type("#.Drive"), None);
        assert_eq!(parse_odata_type("#v1_0_0.Drive"), None);
    }

    #[test]
    fn parse_odata_type_rejects_missing_type_name() {
        assert_eq!(parse_odata_type("#Resource.v1_0_2"), None);
        assert_eq!(parse_odata_type("#Resource..Drive"), None);
        assert_eq!(parse_odata_type("#Resource.v1_0_2."), None);
        assert_eq!(parse_unversioned_odata_type("#Resource.v1_0_2"), None);
        assert_eq!(parse_action_name("ComputerSystem..Reset"), None);
    }

    #[test]
    fn parse_odata_type_dotted_namespace() {
        let parsed = ODataType::parse("#Org.OData.Core.V1.Permission").unwrap();
        assert_eq!(parsed.namespace, "Org.OData.Core.V1");
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.type_name, "Permission");
    }

    #[test]
    fn versioned_namespace_and_unversioned_name() {
        let parsed = ODataType::parse("#ComputerSystem.v1_1_0.ComputerSystem").unwrap();
        assert_eq!(parsed.versioned_namespace(), "ComputerSystem.v1_1_0");
        assert_eq!(
            parse_unversioned_odata_type("#ComputerSystem.v1_1_0.ComputerSystem").as_deref(),
            Some("ComputerSystem.ComputerSystem")
        );
    }

    #[test]
    fn parse_action_name_forms() {
        assert_eq!(
            parse_action_name("#ComputerSystem.Reset"),
            Some(("ComputerSystem".into(), "Reset".into()))
        );
        assert_eq!(
            parse_action_name("ComputerSystem.v1_0_0.Reset"),
            Some(("ComputerSystem".into(), "Reset".into()))
        );
        assert_eq!(parse_action_name("#Reset"), None);
    }

    #[test]
    fn schema_version_ordering() {
        let v = |s| SchemaVersion::parse(s).unwrap();
        assert!(v("v1_10_0") > v("v1_9_3"));
        assert!(v("v1_0_1") > v("v1"));
        assert_eq!(v("v2").to_string(), "v2_0_0");
        assert_eq!(SchemaVersion::parse("V1_0_0"), None);
        assert_eq!(SchemaVersion::parse("v1_0_0_0"), None);
        assert_eq!(SchemaVersion::parse("v"), None);
    }

    #[test]
    fn unversioned_namespace_strips_only_version() {
        assert_eq!(unversioned_namespace("Drive.v1_0_2"), "Drive");
        assert_eq!(unversioned_namespace("Drive"), "Drive");
        assert_eq!(unversioned_namespace("Org.OData.Core.V1"), "Org.OData.Core.V1");
        assert_eq!(namespace_version("Drive.v1_2_0"), SchemaVersion::parse("v1_2_0"));
        assert_eq!(namespace_version("Drive"), None);
    }
}
