//! Inheritance-aware queries over a loaded registry.
//!
//! Redfish schemas model inheritance at the type level but annotate every
//! level independently, so most questions ("does this type carry
//! `OData.AdditionalProperties`?", "is `CapacityBytes` declared here?")
//! have to walk the `BaseType` chain. The walk is done by
//! [`BaseTypeChain`], which resolves each `BaseType` string lazily and
//! stops on the first revisited type.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::identifier::{parse_action_name, unversioned_namespace};
use crate::model::{Annotated, Annotation, Namespace, SchemaUri, StructuredType};
use crate::registry::NamespaceRegistry;
use crate::types::{ADDITIONAL_PROPERTIES_TERM, COMMON_RESOURCE_PROPERTIES};

/// Name of the property Redfish resources use to bind their actions.
const ACTIONS_PROPERTY: &str = "Actions";

/// Read-only query handle over a [`NamespaceRegistry`].
///
/// Cheap to copy; every query is independent and side-effect free apart
/// from diagnostics emitted through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r NamespaceRegistry,
}

/// Why a [`BaseTypeChain`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// The last type has no `BaseType`.
    Root,
    /// This `BaseType` string did not resolve to a loaded type.
    Unresolved(String),
    /// This type was reached a second time.
    Cycle(String),
}

/// Iterator over a type and its ancestors, nearest first.
///
/// Visiting a type twice ends the walk with [`ChainEnd::Cycle`] instead of
/// looping.
#[derive(Debug)]
pub struct BaseTypeChain<'a> {
    resolver: Resolver<'a>,
    next: Option<&'a StructuredType>,
    fallback: Option<&'a SchemaUri>,
    visited: HashSet<String>,
    end: Option<ChainEnd>,
}

impl<'a> BaseTypeChain<'a> {
    /// Reason the walk stopped, once the iterator is exhausted.
    pub fn end(&self) -> Option<&ChainEnd> {
        self.end.as_ref()
    }
}

impl<'a> Iterator for BaseTypeChain<'a> {
    type Item = &'a StructuredType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let name = current.qualified_name();
        if !self.visited.insert(name.clone()) {
            warn!(
                type_name = %name,
                uri = %current.schema_uri,
                "BaseType cycle detected, stopping inheritance walk"
            );
            self.end = Some(ChainEnd::Cycle(name));
            return None;
        }

        match &current.base_type {
            None => self.end = Some(ChainEnd::Root),
            Some(base) => {
                let mut contexts = vec![&current.schema_uri];
                contexts.extend(self.fallback);
                match self.resolver.resolve_type_in(base, &contexts) {
                    Some(parent) => self.next = Some(parent),
                    None => {
                        debug!(type_name = %name, base_type = %base, "BaseType does not resolve");
                        self.end = Some(ChainEnd::Unresolved(base.clone()));
                    }
                }
            }
        }

        Some(current)
    }
}

/// `Collection(Ns.Type)` -> `Ns.Type`.
pub fn strip_collection(type_name: &str) -> &str {
    type_name
        .strip_prefix("Collection(")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(type_name)
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r NamespaceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r NamespaceRegistry {
        self.registry
    }

    /// Resolve a qualified structured-type name as written inside the
    /// document at `context`.
    ///
    /// The namespace part may be a full namespace name or an alias declared
    /// by that document. When several loaded namespaces share the name, the
    /// one from `context` is preferred.
    pub fn resolve_type(&self, qualified: &str, context: &SchemaUri) -> Option<&'r StructuredType> {
        self.resolve_type_in(qualified, &[context])
    }

    fn resolve_type_in(&self, qualified: &str, contexts: &[&SchemaUri]) -> Option<&'r StructuredType> {
        let qualified = strip_collection(qualified.trim());
        let (ns_name, type_name) = qualified.rsplit_once('.')?;
        let registry = self.registry;

        let lookup = |name: &str| -> Option<&'r StructuredType> {
            let mut fallback = None;
            for ns in registry.find_namespaces(name) {
                if let Some(ty) = ns.structured_type(type_name) {
                    if contexts.contains(&&ns.schema_uri) {
                        return Some(ty);
                    }
                    fallback.get_or_insert(ty);
                }
            }
            fallback
        };

        lookup(ns_name).or_else(|| {
            contexts
                .iter()
                .filter_map(|ctx| registry.document(ctx)?.alias_target(ns_name))
                .find_map(lookup)
        })
    }

    /// Walk `ty` and its ancestors.
    pub fn base_type_chain<'a>(&self, ty: &'a StructuredType) -> BaseTypeChain<'a>
    where
        'r: 'a,
    {
        self.chain(ty, None)
    }

    fn chain<'a>(&self, ty: &'a StructuredType, fallback: Option<&'a SchemaUri>) -> BaseTypeChain<'a>
    where
        'r: 'a,
    {
        BaseTypeChain {
            resolver: Resolver {
                registry: self.registry,
            },
            next: Some(ty),
            fallback,
            visited: HashSet::new(),
            end: None,
        }
    }

    /// Annotation with `term` on the element itself.
    pub fn get_annotation<'a, E>(&self, element: &'a E, term: &str) -> Option<&'a Annotation>
    where
        E: Annotated + ?Sized,
    {
        element.annotations().iter().find(|a| a.term == term)
    }

    /// Annotation with `term` on the element or, for structured types, the
    /// nearest ancestor that declares it.
    ///
    /// A cyclic or dangling `BaseType` ends the search as not found; use
    /// [`base_type_chain`](Self::base_type_chain) to learn which.
    pub fn get_annotation_recursive<'a, E>(&self, element: &'a E, term: &str) -> Option<&'a Annotation>
    where
        E: Annotated + ?Sized,
        'r: 'a,
    {
        if let Some(found) = self.get_annotation(element, term) {
            return Some(found);
        }
        let ty = element.as_structured()?;
        self.base_type_chain(ty)
            .skip(1)
            .find_map(|ancestor| self.get_annotation(ancestor, term))
    }

    pub fn verify_annotation<E>(&self, element: &E, term: &str) -> bool
    where
        E: Annotated + ?Sized,
    {
        self.get_annotation(element, term).is_some()
    }

    pub fn verify_annotation_recursive<E>(&self, element: &E, term: &str) -> bool
    where
        E: Annotated + ?Sized,
    {
        self.get_annotation_recursive(element, term).is_some()
    }

    /// Whether `property` is a structural or navigation property of `ty` or
    /// any ancestor.
    ///
    /// `namespace` is the namespace the caller found `ty` in; its document
    /// is consulted for aliases when a `BaseType` does not resolve from the
    /// declaring document alone.
    pub fn verify_property_in_resource_recursive(
        &self,
        ty: &StructuredType,
        property: &str,
        namespace: &Namespace,
    ) -> bool {
        self.chain(ty, Some(&namespace.schema_uri))
            .any(|t| t.declares_property(property))
    }

    /// Whether the qualified action name (`#ComputerSystem.Reset`) names a
    /// bound action applicable to `ty`.
    ///
    /// An action applies when its binding parameter resolves to `ty` or an
    /// ancestor, or to the type of an `Actions` property declared on `ty` or
    /// an ancestor. Unbound actions never apply.
    pub fn verify_action_name_recursive(
        &self,
        namespace: &Namespace,
        ty: &StructuredType,
        qualified_action: &str,
    ) -> bool {
        let Some((action_ns, action_name)) = parse_action_name(qualified_action) else {
            return false;
        };

        let mut targets = HashSet::new();
        for t in self.chain(ty, Some(&namespace.schema_uri)) {
            targets.insert(t.qualified_name());
            if let Some(actions) = t.property(ACTIONS_PROPERTY) {
                let contexts = [&t.schema_uri, &namespace.schema_uri];
                if let Some(holder) = self.resolve_type_in(&actions.type_name, &contexts) {
                    targets.insert(holder.qualified_name());
                }
            }
        }

        let alias_target = self
            .registry
            .document(&namespace.schema_uri)
            .and_then(|doc| doc.alias_target(&action_ns));

        let found = self
            .registry
            .namespaces()
            .filter(|ns| {
                ns.name == action_ns
                    || unversioned_namespace(&ns.name) == action_ns
                    || Some(ns.name.as_str()) == alias_target
            })
            .flat_map(|ns| ns.actions_named(&action_name))
            .filter(|action| action.is_bound)
            .filter_map(|action| {
                let binding = action.binding_parameter()?;
                self.resolve_type_in(&binding.type_name, &[&action.schema_uri])
            })
            .any(|bound| targets.contains(&bound.qualified_name()));

        if !found {
            debug!(
                action = qualified_action,
                type_name = %ty.qualified_name(),
                "action is not bound to type or its ancestors"
            );
        }
        found
    }

    /// Whether instances of `ty` may carry undeclared properties.
    ///
    /// Only an explicit `OData.AdditionalProperties` of `false` on the type
    /// itself forbids them.
    pub fn additional_properties_allowed(&self, ty: &StructuredType) -> bool {
        self.get_annotation(ty, ADDITIONAL_PROPERTIES_TERM)
            .and_then(Annotation::as_bool)
            != Some(false)
    }

    /// First payload key that is neither an `@odata` control key, a common
    /// resource property, nor declared on `ty` or an ancestor.
    pub fn find_additional_property<'p>(
        &self,
        payload: &'p Map<String, Value>,
        ty: &StructuredType,
        namespace: &Namespace,
    ) -> Option<&'p str> {
        payload.keys().map(String::as_str).find(|key| {
            !key.contains("@odata")
                && !COMMON_RESOURCE_PROPERTIES.contains(key)
                && !self.verify_property_in_resource_recursive(ty, key, namespace)
        })
    }
}
