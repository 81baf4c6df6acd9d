//! The merged namespace registry.
//!
//! Documents are added with [`NamespaceRegistry::load`] (or fetched and added
//! with [`NamespaceRegistry::load_from`]) during a single-threaded build
//! phase. Afterwards the registry is only read, so a shared `&NamespaceRegistry`
//! can be queried from any number of threads without locking.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::csdl::parse_csdl;
use crate::error::{LoadError, LoadFailure};
use crate::loader::{resolve_reference_uri, DocumentSource};
use crate::model::{Namespace, SchemaDocument, SchemaUri};
use crate::resolver::Resolver;
use crate::types::LoadOptions;

/// Result of [`NamespaceRegistry::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// A document with the same URI was already present; nothing changed.
    AlreadyLoaded,
}

/// Two documents declare the same namespace with different content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub namespace: String,
    /// Document that declared the namespace first.
    pub first: SchemaUri,
    pub second: SchemaUri,
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "namespace {} declared differently in {} and {}",
            self.namespace, self.first, self.second
        )
    }
}

/// Position of a namespace: (document index, namespace index).
type Slot = (usize, usize);

/// Every namespace from every loaded document, indexed by name.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    documents: Vec<SchemaDocument>,
    by_uri: HashMap<SchemaUri, usize>,
    by_name: HashMap<String, Vec<Slot>>,
    inconsistencies: Vec<Inconsistency>,
    failures: Vec<LoadFailure>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed document into the registry.
    ///
    /// Loading a URI that is already present is a no-op. A namespace whose
    /// name is already taken by different content is kept alongside the
    /// earlier one and recorded as an [`Inconsistency`].
    pub fn load(&mut self, document: SchemaDocument) -> LoadOutcome {
        if self.by_uri.contains_key(&document.uri) {
            debug!(uri = %document.uri, "document already loaded");
            return LoadOutcome::AlreadyLoaded;
        }

        let doc_index = self.documents.len();
        for (ns_index, ns) in document.namespaces.iter().enumerate() {
            let slots = self.by_name.entry(ns.name.clone()).or_default();
            for &(d, n) in slots.iter() {
                let existing = &self.documents[d].namespaces[n];
                if !existing.content_eq(ns) {
                    warn!(
                        namespace = %ns.name,
                        first = %existing.schema_uri,
                        second = %document.uri,
                        "namespace redeclared with different content"
                    );
                    self.inconsistencies.push(Inconsistency {
                        namespace: ns.name.clone(),
                        first: existing.schema_uri.clone(),
                        second: document.uri.clone(),
                    });
                    break;
                }
            }
            slots.push((doc_index, ns_index));
        }

        info!(
            uri = %document.uri,
            namespaces = document.namespaces.len(),
            references = document.references.len(),
            "loaded schema document"
        );
        self.by_uri.insert(document.uri.clone(), doc_index);
        self.documents.push(document);
        LoadOutcome::Loaded
    }

    /// Fetch, parse and load a CSDL document, and with
    /// `options.follow_references` every document reachable through its
    /// `Reference` elements.
    ///
    /// Failures do not stop the walk; they are logged and kept in
    /// [`failures`](Self::failures). Returns the number of documents newly
    /// loaded.
    pub fn load_from(
        &mut self,
        source: &dyn DocumentSource,
        root: &str,
        options: &LoadOptions,
    ) -> usize {
        // Each queued location carries the namespaces its referrer includes.
        let mut queue = VecDeque::from([(root.to_string(), Vec::new())]);
        let mut seen = HashSet::from([root.to_string()]);
        let mut loaded = 0;

        while let Some((location, expected)) = queue.pop_front() {
            let document = match source
                .fetch(&location, options)
                .and_then(|content| parse_csdl(&content, SchemaUri::from(location.as_str())))
            {
                Ok(document) => document,
                Err(error) => {
                    self.record_failure(location, expected, error);
                    continue;
                }
            };

            if options.follow_references {
                for reference in &document.references {
                    let target = resolve_reference_uri(&location, &reference.uri);
                    if !self.by_uri.contains_key(target.as_str()) && seen.insert(target.clone()) {
                        let namespaces = reference
                            .includes
                            .iter()
                            .map(|include| include.namespace.clone())
                            .collect();
                        queue.push_back((target, namespaces));
                    }
                }
            }

            if self.load(document) == LoadOutcome::Loaded {
                loaded += 1;
            }
        }

        loaded
    }

    /// Remember a document that could not be loaded, with the namespaces
    /// that are unavailable as a result.
    pub fn record_failure(
        &mut self,
        location: impl Into<String>,
        namespaces: Vec<String>,
        error: LoadError,
    ) {
        let location = location.into();
        warn!(
            %location,
            kind = ?error.kind(),
            unavailable = ?namespaces,
            "schema document not loaded: {}",
            error
        );
        self.failures.push(LoadFailure {
            location,
            namespaces,
            error,
        });
    }

    /// Namespace that `alias` stands for inside the document at `document`.
    ///
    /// A namespace declared by that same document wins over same-named
    /// namespaces from elsewhere.
    pub fn resolve_alias(&self, document: &SchemaUri, alias: &str) -> Option<&Namespace> {
        let doc = self.document(document)?;
        let target = doc.alias_target(alias)?;
        doc.namespace(target)
            .or_else(|| self.find_namespace(target))
    }

    /// First loaded namespace with this exact name.
    pub fn find_namespace(&self, name: &str) -> Option<&Namespace> {
        self.find_namespaces(name).next()
    }

    /// Every loaded namespace with this exact name, in load order.
    pub fn find_namespaces<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Namespace> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&(d, n)| &self.documents[d].namespaces[n])
    }

    /// All namespaces in load order.
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.documents.iter().flat_map(|d| d.namespaces.iter())
    }

    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    pub fn document(&self, uri: &SchemaUri) -> Option<&SchemaDocument> {
        self.by_uri.get(uri).map(|&i| &self.documents[i])
    }

    pub fn inconsistencies(&self) -> &[Inconsistency] {
        &self.inconsistencies
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Query handle over this registry.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }
}
