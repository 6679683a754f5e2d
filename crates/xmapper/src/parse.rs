//! Parse XML documents into model instances.
//!
//! The parser walks a schema's descriptor list in declaration order,
//! resolves each field's query against the context node, converts the
//! matched nodes into values, and assembles instances bottom-up. Zero
//! matches is never an error: scalar fields fall back to their default
//! (else null), repeated and keyed fields to an empty container.

use std::sync::Arc;

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use tracing::{debug, trace, warn};

use crate::coerce;
use crate::error::{Error, Result};
use crate::path::{self, Match};
use crate::schema::{Encoding, FieldDescriptor, FieldKind, ModelSchema};
use crate::value::{Instance, Value, default_value};

/// Parses an XML document into an instance of `schema`.
///
/// Tokenization failures surface as [`Error::MalformedDocument`]. The
/// document's root element is checked against the schema's root path; a
/// document whose root does not match parses to an all-defaults
/// instance, the absent-field rule applied at the top.
pub fn from_xml_str(schema: &Arc<ModelSchema>, xml: &str) -> Result<Instance> {
    let document = Document::parse(xml)?;
    let root = document.root_element();
    debug!(root = schema.root(), "parsing document");

    let root_query = path::resolve_root(schema.root(), schema.namespaces());
    if !path::node_matches(&root_query, schema.namespaces(), root)? {
        return Instance::with_defaults(schema);
    }
    parse_node(schema, root)
}

/// Parses an already-selected context element into an instance of
/// `schema`; the entry point for nested models and for callers that
/// hold a document of their own.
pub fn parse_node(schema: &Arc<ModelSchema>, node: Node<'_, '_>) -> Result<Instance> {
    let mut values = IndexMap::with_capacity(schema.fields().len());
    for descriptor in schema.fields() {
        let query = path::resolve(descriptor, schema.namespaces());
        let matches = path::eval(&query, schema.namespaces(), node)?;
        trace!(
            field = descriptor.name.as_str(),
            query = query.as_str(),
            matches = matches.len(),
            "field resolved"
        );
        values.insert(descriptor.name.clone(), aggregate(descriptor, matches)?);
    }
    Ok(Instance::from_parts(Arc::clone(schema), values))
}

/// Folds a field's matches into its final value per kind.
fn aggregate(descriptor: &FieldDescriptor, matches: Vec<Match<'_, '_>>) -> Result<Value> {
    match descriptor.kind {
        FieldKind::List => {
            let mut items = Vec::with_capacity(matches.len());
            for matched in matches {
                items.push(single_value(descriptor, matched)?);
            }
            Ok(Value::List(items))
        }
        FieldKind::Map => {
            let nested = descriptor
                .nested
                .as_ref()
                .expect("map field has a nested schema");
            let key_field = descriptor
                .key_field
                .as_ref()
                .expect("map field has a key field");
            let mut entries = IndexMap::new();
            for matched in matches {
                let Match::Element(element) = matched else {
                    continue;
                };
                let instance = parse_node(nested, element)?;
                match instance.get(key_field) {
                    Some(Value::Text(key)) if !key.is_empty() => {
                        // Later entries for a duplicate key overwrite
                        // earlier ones, in document order.
                        entries.insert(key.clone(), instance);
                    }
                    _ => {
                        // Feeds routinely carry unkeyed siblings (an
                        // Atom <link> without rel); they cannot be
                        // indexed and are dropped.
                        warn!(
                            field = descriptor.name.as_str(),
                            "dropping map entry without a key value"
                        );
                    }
                }
            }
            Ok(Value::Map(entries))
        }
        _ => match matches.into_iter().next() {
            Some(matched) => single_value(descriptor, matched),
            None => default_value(descriptor),
        },
    }
}

/// Converts one matched node into a raw, coerced value.
fn single_value(descriptor: &FieldDescriptor, matched: Match<'_, '_>) -> Result<Value> {
    match (&descriptor.nested, matched) {
        (Some(nested), Match::Element(element)) => {
            Ok(Value::Model(parse_node(nested, element)?))
        }
        (_, Match::Element(element)) => leaf_value(descriptor, path::element_text(element)),
        (_, Match::Text(text)) => leaf_value(descriptor, text),
    }
}

/// Applies per-kind coercion to a matched node's text.
fn leaf_value(descriptor: &FieldDescriptor, text: String) -> Result<Value> {
    match descriptor.kind {
        FieldKind::DateTime => {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            match coerce::parse_datetime(&text) {
                Some(dt) => Ok(Value::DateTime(dt)),
                None => Err(Error::InvalidTemporalValue {
                    field: descriptor.name.clone(),
                    value: text,
                }),
            }
        }
        _ if descriptor.encoding == Some(Encoding::Base64) => coerce::base64_decode(&text)
            .map(Value::Bytes)
            .map_err(|source| Error::Base64 {
                field: descriptor.name.clone(),
                source,
            }),
        _ => Ok(Value::Text(text)),
    }
}
