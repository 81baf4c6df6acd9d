//! Error types for schema document loading.
//!
//! Only loading can fail hard. Queries against a loaded registry answer with
//! `Option`/`bool` values, because "not found" is a conformance fact rather
//! than an operational fault.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadErrorKind {
    /// The document could not be reached (missing file, network failure).
    Fetch,
    /// The document was reached but its content is malformed.
    Parse,
}

/// Errors while fetching or parsing a schema document.
#[derive(Debug, Error)]
pub enum LoadError {
    // Fetch errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot fetch {location}: remote loading is disabled")]
    UnsupportedSource { location: String },

    // Parse errors (exit code 2)
    #[error("invalid XML in {uri}: {message}")]
    InvalidXml { uri: String, message: String },

    #[error("invalid JSON in {uri}: {source}")]
    InvalidJson {
        uri: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema document {uri}: {message}")]
    InvalidDocument { uri: String, message: String },
}

impl LoadError {
    /// Whether the document was unreachable or malformed.
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::UnsupportedSource { .. } => LoadErrorKind::Fetch,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => LoadErrorKind::Fetch,
            LoadError::InvalidXml { .. }
            | LoadError::InvalidJson { .. }
            | LoadError::InvalidDocument { .. } => LoadErrorKind::Parse,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            LoadErrorKind::Fetch => 3,
            LoadErrorKind::Parse => 2,
        }
    }

    pub(crate) fn invalid_document(uri: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::InvalidDocument {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

/// A document that failed to load, kept so the run can report it later.
#[derive(Debug)]
pub struct LoadFailure {
    /// Location as requested (path or URL).
    pub location: String,
    /// Namespaces the referencing document expected from this location.
    /// Empty for a root source.
    pub namespaces: Vec<String>,
    pub error: LoadError,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.error)?;
        if !self.namespaces.is_empty() {
            write!(f, " (unavailable: {})", self.namespaces.join(", "))?;
        }
        Ok(())
    }
}
