//! Schema document loading from files, strings, and HTTP URLs.
//!
//! Raw bytes come from a [`DocumentSource`]; the default source reads local
//! files and, with the `remote` feature, fetches HTTP/HTTPS URLs with a
//! timeout. URLs under a configured remote base are served from a local
//! mirror directory instead of the network.

use std::path::{Path, PathBuf};

use crate::csdl::parse_csdl;
use crate::error::LoadError;
use crate::json_schema::{parse_json_schema, JsonSchemaSet};
use crate::model::{SchemaDocument, SchemaUri};
use crate::types::{DocumentKind, LoadOptions};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Supplies raw document text for a location.
///
/// This is the seam to the transport layer: the registry and loader
/// functions only ever see text, so tests and callers with their own HTTP
/// client can plug in here.
pub trait DocumentSource {
    /// Fetch the document at `location` (path or URL).
    ///
    /// # Errors
    ///
    /// Returns a fetch-kind `LoadError` when the document is unreachable.
    fn fetch(&self, location: &str, options: &LoadOptions) -> Result<String, LoadError>;
}

/// Reads local files and fetches HTTP(S) URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

impl DocumentSource for DefaultSource {
    fn fetch(&self, location: &str, options: &LoadOptions) -> Result<String, LoadError> {
        if let Some(local) = map_url_to_path(location, options) {
            return read_file(&local);
        }

        if is_url(location) {
            #[cfg(feature = "remote")]
            {
                fetch_url(location, options.timeout)
            }
            #[cfg(not(feature = "remote"))]
            {
                Err(LoadError::UnsupportedSource {
                    location: location.to_string(),
                })
            }
        } else {
            read_file(Path::new(location))
        }
    }
}

/// A parsed document of either kind.
#[derive(Debug, Clone)]
pub enum LoadedDocument {
    Csdl(SchemaDocument),
    JsonSchema(JsonSchemaSet),
}

/// Load and parse a document with the default source.
///
/// # Errors
///
/// Fetch errors when the location is unreachable, parse errors when the
/// content does not match `kind`.
pub fn load_document(
    location: &str,
    kind: DocumentKind,
    options: &LoadOptions,
) -> Result<LoadedDocument, LoadError> {
    load_document_from(&DefaultSource, location, kind, options)
}

/// Load and parse a document through a caller-supplied source.
pub fn load_document_from(
    source: &dyn DocumentSource,
    location: &str,
    kind: DocumentKind,
    options: &LoadOptions,
) -> Result<LoadedDocument, LoadError> {
    let content = source.fetch(location, options)?;
    match kind {
        DocumentKind::XmlCsdl => load_csdl_str(&content, location).map(LoadedDocument::Csdl),
        DocumentKind::JsonSchema => {
            load_json_schema_str(&content, location).map(LoadedDocument::JsonSchema)
        }
    }
}

/// Load a CSDL document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidXml` if the file isn't well-formed XML.
pub fn load_csdl(path: &Path) -> Result<SchemaDocument, LoadError> {
    let content = read_file(path)?;
    parse_csdl(&content, SchemaUri::new(path.display().to_string()))
}

/// Load a CSDL document from a string, recording `uri` as its origin.
pub fn load_csdl_str(content: &str, uri: impl Into<SchemaUri>) -> Result<SchemaDocument, LoadError> {
    parse_csdl(content, uri.into())
}

/// Load a CSDL document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
pub fn load_csdl_url(url: &str, options: &LoadOptions) -> Result<SchemaDocument, LoadError> {
    let content = fetch_url(url, options.timeout)?;
    parse_csdl(&content, SchemaUri::from(url))
}

/// Load a JSON-Schema file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json_schema(path: &Path) -> Result<JsonSchemaSet, LoadError> {
    let content = read_file(path)?;
    load_json_schema_str(&content, path.display().to_string())
}

/// Load a JSON-Schema document from a string.
pub fn load_json_schema_str(
    content: &str,
    uri: impl Into<SchemaUri>,
) -> Result<JsonSchemaSet, LoadError> {
    let uri = uri.into();
    let value = serde_json::from_str(content).map_err(|source| LoadError::InvalidJson {
        uri: uri.to_string(),
        source,
    })?;
    parse_json_schema(value, uri)
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str, timeout: Duration) -> Result<String, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(network_error)?;

    tracing::debug!(url, "fetching schema document");
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/xml, application/json")
        .send()
        .map_err(network_error)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network_error)?;

    response.text().map_err(network_error)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Map a URL under the configured remote base to a local file.
///
/// Returns `None` when no mapping is configured or the URL is outside it.
pub fn map_url_to_path(location: &str, options: &LoadOptions) -> Option<PathBuf> {
    let (Some(local_base), Some(remote_base)) = (&options.local_base, &options.remote_base) else {
        return None;
    };
    let remainder = location.strip_prefix(remote_base.trim_end_matches('/'))?;
    if !remainder.is_empty() && !remainder.starts_with('/') {
        return None;
    }
    Some(local_base.join(remainder.trim_start_matches('/')))
}

/// Resolve a `Reference` URI against the location of the referencing document.
///
/// Absolute URLs are returned unchanged. Against a URL base, a rooted
/// reference (`/redfish/v1/Schemas/Drive_v1.xml`) keeps the base's origin
/// and a relative one replaces the last path segment. Against a file base,
/// relative references are joined to the base's directory.
pub fn resolve_reference_uri(base: &str, reference: &str) -> String {
    if is_url(reference) {
        return reference.to_string();
    }

    if is_url(base) {
        let scheme_end = base.find("://").map_or(0, |i| i + 3);
        let origin_end = base[scheme_end..]
            .find('/')
            .map_or(base.len(), |i| scheme_end + i);
        if reference.starts_with('/') {
            return format!("{}{}", &base[..origin_end], reference);
        }
        let dir_end = base[origin_end..]
            .rfind('/')
            .map_or(origin_end, |i| origin_end + i);
        return format!("{}/{}", &base[..dir_end], reference);
    }

    let reference_path = Path::new(reference);
    if reference_path.is_absolute() {
        return reference.to_string();
    }
    Path::new(base)
        .parent()
        .unwrap_or(Path::new(""))
        .join(reference_path)
        .display()
        .to_string()
}
