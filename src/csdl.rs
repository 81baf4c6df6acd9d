//! CSDL (EDMX XML) parsing.
//!
//! The document is read with `quick-xml`'s pull reader into a small element
//! tree, which is then mapped onto the typed model. Element and attribute
//! names are compared by local name, so `edmx:Reference` and `Reference`
//! are the same thing.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::LoadError;
use crate::model::{
    Action, ActionParameter, Annotation, EnumMember, EnumType, Include, NavigationProperty,
    Namespace, Property, Reference, SchemaDocument, SchemaUri, StructuredType,
};
use crate::types::{Nullable, TypeKind};

/// Attributes of `Annotation` that never hold the annotation's value.
const ANNOTATION_META_ATTRIBUTES: &[&str] = &["Term", "Qualifier"];

#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, key: &str, uri: &SchemaUri) -> Result<&str, LoadError> {
        self.attr(key).ok_or_else(|| {
            LoadError::invalid_document(
                uri.as_str(),
                format!("<{}> is missing the {} attribute", self.name, key),
            )
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse a CSDL document.
///
/// `uri` is recorded on the document and on every namespace, type and
/// action it declares.
///
/// # Errors
///
/// Returns `LoadError::InvalidXml` for malformed markup and
/// `LoadError::InvalidDocument` when well-formed markup breaks a model
/// invariant (missing `Name`, duplicate type names within a kind, an alias
/// bound to two namespaces).
pub fn parse_csdl(content: &str, uri: SchemaUri) -> Result<SchemaDocument, LoadError> {
    let root = read_tree(content, &uri)?;

    let mut aliases: HashMap<String, String> = HashMap::new();

    let mut references = Vec::new();
    for reference in root.children_named("Reference") {
        let target = reference.required_attr("Uri", &uri)?;
        let mut includes = Vec::new();
        for include in reference.children_named("Include") {
            let namespace = include.required_attr("Namespace", &uri)?;
            let alias = include.attr("Alias");
            if let Some(alias) = alias {
                bind_alias(&mut aliases, alias, namespace, &uri)?;
            }
            includes.push(Include {
                namespace: namespace.to_string(),
                alias: alias.map(String::from),
            });
        }
        references.push(Reference {
            uri: target.to_string(),
            includes,
        });
    }

    let mut namespaces = Vec::new();
    for data_services in root.children_named("DataServices") {
        for schema in data_services.children_named("Schema") {
            let namespace = parse_schema(schema, &uri)?;
            if let Some(alias) = &namespace.alias {
                bind_alias(&mut aliases, alias, &namespace.name, &uri)?;
            }
            namespaces.push(namespace);
        }
    }

    Ok(SchemaDocument {
        edmx_element: root.name.clone(),
        edmx_version: root.attr("Version").map(String::from),
        uri,
        namespaces,
        references,
    })
}

fn bind_alias(
    aliases: &mut HashMap<String, String>,
    alias: &str,
    namespace: &str,
    uri: &SchemaUri,
) -> Result<(), LoadError> {
    match aliases.get(alias) {
        Some(existing) if existing != namespace => Err(LoadError::invalid_document(
            uri.as_str(),
            format!(
                "alias {} is bound to both {} and {}",
                alias, existing, namespace
            ),
        )),
        Some(_) => Ok(()),
        None => {
            aliases.insert(alias.to_string(), namespace.to_string());
            Ok(())
        }
    }
}

fn parse_schema(schema: &Element, uri: &SchemaUri) -> Result<Namespace, LoadError> {
    let name = schema.required_attr("Namespace", uri)?;
    let mut namespace = Namespace::new(name, uri.clone());
    namespace.alias = schema.attr("Alias").map(String::from);

    for child in &schema.children {
        match child.name.as_str() {
            "EntityType" => {
                let ty = parse_structured(child, TypeKind::EntityType, name, uri)?;
                ensure_unique(namespace.entity_type(&ty.name).is_some(), &ty.name, child, name, uri)?;
                namespace.entity_types.push(ty);
            }
            "ComplexType" => {
                let ty = parse_structured(child, TypeKind::ComplexType, name, uri)?;
                ensure_unique(namespace.complex_type(&ty.name).is_some(), &ty.name, child, name, uri)?;
                namespace.complex_types.push(ty);
            }
            "EnumType" => {
                let ty = parse_enum(child, name, uri)?;
                ensure_unique(namespace.enum_type(&ty.name).is_some(), &ty.name, child, name, uri)?;
                namespace.enum_types.push(ty);
            }
            "Action" => namespace.actions.push(parse_action(child, name, uri)?),
            // TypeDefinition, Term, EntityContainer, Function, Annotations...
            _ => {}
        }
    }

    Ok(namespace)
}

fn ensure_unique(
    duplicate: bool,
    type_name: &str,
    element: &Element,
    namespace: &str,
    uri: &SchemaUri,
) -> Result<(), LoadError> {
    if duplicate {
        return Err(LoadError::invalid_document(
            uri.as_str(),
            format!(
                "duplicate {} {} in namespace {}",
                element.name, type_name, namespace
            ),
        ));
    }
    Ok(())
}

fn parse_structured(
    element: &Element,
    kind: TypeKind,
    namespace: &str,
    uri: &SchemaUri,
) -> Result<StructuredType, LoadError> {
    let mut properties = Vec::new();
    let mut navigation_properties = Vec::new();

    for child in &element.children {
        match child.name.as_str() {
            "Property" => properties.push(Property {
                name: child.required_attr("Name", uri)?.to_string(),
                type_name: child.required_attr("Type", uri)?.to_string(),
                nullable: Nullable::parse(child.attr("Nullable")),
                annotations: parse_annotations(child, uri)?,
            }),
            "NavigationProperty" => navigation_properties.push(NavigationProperty {
                name: child.required_attr("Name", uri)?.to_string(),
                type_name: child.required_attr("Type", uri)?.to_string(),
                nullable: Nullable::parse(child.attr("Nullable")),
                annotations: parse_annotations(child, uri)?,
            }),
            _ => {}
        }
    }

    Ok(StructuredType {
        kind,
        name: element.required_attr("Name", uri)?.to_string(),
        namespace: namespace.to_string(),
        base_type: element.attr("BaseType").map(String::from),
        is_abstract: is_true(element.attr("Abstract")),
        properties,
        navigation_properties,
        annotations: parse_annotations(element, uri)?,
        schema_uri: uri.clone(),
    })
}

fn parse_enum(element: &Element, namespace: &str, uri: &SchemaUri) -> Result<EnumType, LoadError> {
    let members = element
        .children_named("Member")
        .map(|member| {
            Ok(EnumMember {
                name: member.required_attr("Name", uri)?.to_string(),
                value: member.attr("Value").map(String::from),
                annotations: parse_annotations(member, uri)?,
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(EnumType {
        name: element.required_attr("Name", uri)?.to_string(),
        namespace: namespace.to_string(),
        members,
        annotations: parse_annotations(element, uri)?,
        schema_uri: uri.clone(),
    })
}

fn parse_action(element: &Element, namespace: &str, uri: &SchemaUri) -> Result<Action, LoadError> {
    let parameters = element
        .children_named("Parameter")
        .map(|param| {
            Ok(ActionParameter {
                name: param.required_attr("Name", uri)?.to_string(),
                type_name: param.required_attr("Type", uri)?.to_string(),
                nullable: Nullable::parse(param.attr("Nullable")),
            })
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(Action {
        name: element.required_attr("Name", uri)?.to_string(),
        namespace: namespace.to_string(),
        is_bound: is_true(element.attr("IsBound")),
        parameters,
        annotations: parse_annotations(element, uri)?,
        schema_uri: uri.clone(),
    })
}

fn parse_annotations(element: &Element, uri: &SchemaUri) -> Result<Vec<Annotation>, LoadError> {
    element
        .children_named("Annotation")
        .map(|ann| {
            let term = ann.required_attr("Term", uri)?;
            let value = ann
                .attributes
                .iter()
                .find(|(k, _)| !ANNOTATION_META_ATTRIBUTES.contains(&k.as_str()));
            Ok(match value {
                Some((key, value)) => Annotation::with_value(term, key.as_str(), value.as_str()),
                None => Annotation::new(term),
            })
        })
        .collect()
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

// --- XML tree construction ---

fn read_tree(content: &str, uri: &SchemaUri) -> Result<Element, LoadError> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from(&start, uri)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start, uri)?;
                attach(&mut stack, &mut root, element, uri)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error(uri, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, element, uri)?;
            }
            Ok(Event::Eof) => break,
            // Text, comments, declarations and processing instructions
            Ok(_) => {}
            Err(e) => return Err(xml_error(uri, e.to_string())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(
            uri,
            format!("unexpected end of document inside <{}>", open.name),
        ));
    }

    root.ok_or_else(|| xml_error(uri, "document has no root element"))
}

fn element_from(start: &BytesStart<'_>, uri: &SchemaUri) -> Result<Element, LoadError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(uri, e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(uri, e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    uri: &SchemaUri,
) -> Result<(), LoadError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(xml_error(uri, "multiple root elements"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn xml_error(uri: &SchemaUri, message: impl Into<String>) -> LoadError {
    LoadError::InvalidXml {
        uri: uri.to_string(),
        message: message.into(),
    }
}
