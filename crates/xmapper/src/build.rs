//! Build XML documents from model instances.
//!
//! The builder walks the same descriptor list as the parser, in the
//! same declaration order, reading field values and emitting quick-xml
//! events. Null values and empty text are skipped; map entries emit as
//! repeated sibling elements with the map key stamped over the nested
//! instance's key field for the duration of that emission.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::coerce;
use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, FieldKind};
use crate::value::{Instance, Value};

/// Renders an instance as a complete XML document string.
pub fn to_xml_string(instance: &Instance) -> Result<String> {
    let mut buffer = Vec::new();
    to_xml_writer(instance, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Renders an instance as an XML document into `writer`.
pub fn to_xml_writer<W: Write>(instance: &Instance, writer: W) -> Result<()> {
    let mut writer = Writer::new(writer);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    debug!(root = instance.schema().root(), "building document");
    build_root(instance, &mut writer, true, None)?;
    Ok(())
}

/// Key stamped over a nested instance while a map entry is emitted:
/// `(key field name, map key)`.
type KeyOverride<'a> = Option<(&'a str, &'a str)>;

/// Emits one model element: root tag, attribute set, then children in
/// declaration order. Namespace declarations are emitted on the
/// document root only; nested model elements do not repeat them.
fn build_root<W: Write>(
    instance: &Instance,
    writer: &mut Writer<W>,
    is_document_root: bool,
    key: KeyOverride<'_>,
) -> Result<()> {
    let schema = instance.schema();
    let tag = strip_default_alias(schema.root());

    let mut element = BytesStart::new(tag);
    if is_document_root {
        for (alias, uri) in schema.namespaces().iter() {
            element.push_attribute((alias, uri));
        }
    }
    for descriptor in schema.fields() {
        if descriptor.kind != FieldKind::Attribute {
            continue;
        }
        if let Some(text) = attribute_text(instance, descriptor, key) {
            let name = descriptor
                .path
                .as_deref()
                .unwrap_or(&descriptor.name)
                .trim_start_matches('@');
            element.push_attribute((name, text.as_str()));
        }
    }

    writer.write_event(Event::Start(element))?;
    build_children(instance, writer, key)?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// An attribute's emitted text: the live value, else the declared
/// default; `None` (omit the attribute) when both are null or empty.
fn attribute_text(
    instance: &Instance,
    descriptor: &FieldDescriptor,
    key: KeyOverride<'_>,
) -> Option<String> {
    if let Some((key_field, key)) = key {
        if descriptor.name == key_field {
            return Some(key.to_string());
        }
    }
    let live = instance.get(&descriptor.name).and_then(scalar_text);
    live.filter(|text| !text.is_empty())
        .or_else(|| descriptor.default.clone())
        .filter(|text| !text.is_empty())
}

fn build_children<W: Write>(
    instance: &Instance,
    writer: &mut Writer<W>,
    key: KeyOverride<'_>,
) -> Result<()> {
    let schema = instance.schema();
    for descriptor in schema.fields() {
        if descriptor.kind == FieldKind::Attribute {
            continue;
        }

        let stamped;
        let value = match key {
            Some((key_field, key)) if descriptor.name == key_field => {
                stamped = Value::Text(key.to_string());
                &stamped
            }
            _ => instance.get(&descriptor.name).unwrap_or(&Value::Null),
        };
        match value {
            Value::Null => continue,
            Value::Text(text) if text.is_empty() => continue,
            _ => {}
        }

        let tag = strip_default_alias(descriptor.path.as_deref().unwrap_or(&descriptor.name));
        match (descriptor.kind, value) {
            (FieldKind::Body, value) => {
                if let Some(text) = scalar_text(value) {
                    writer.write_event(Event::Text(BytesText::new(&text)))?;
                }
            }
            (FieldKind::Map, Value::Map(entries)) => {
                let key_field = descriptor
                    .key_field
                    .as_deref()
                    .expect("map field has a key field");
                for (entry_key, nested) in entries {
                    build_root(nested, writer, false, Some((key_field, entry_key.as_str())))?;
                }
            }
            (FieldKind::List, Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Model(nested) => build_root(nested, writer, false, None)?,
                        leaf => write_leaf(writer, tag, leaf)?,
                    }
                }
            }
            (_, Value::Model(nested)) => build_root(nested, writer, false, None)?,
            (_, leaf) => write_leaf(writer, tag, leaf)?,
        }
    }
    Ok(())
}

/// Emits `<tag>text</tag>` for a scalar value; non-scalars emit
/// nothing.
fn write_leaf<W: Write>(writer: &mut Writer<W>, tag: &str, value: &Value) -> Result<()> {
    let Some(text) = scalar_text(value) else {
        return Ok(());
    };
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(&text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// The wire text of a scalar value: date-times render as RFC 3339 with
/// offset, byte payloads re-encode as URL-safe unpadded base64.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text.clone()),
        Value::DateTime(dt) => Some(coerce::format_datetime(dt)),
        Value::Bytes(payload) => Some(coerce::base64_encode(payload)),
        _ => None,
    }
}

/// Strips a leading default-namespace alias from a declared name; other
/// alias prefixes stay, they are part of the emitted qualified name.
fn strip_default_alias(name: &str) -> &str {
    name.strip_prefix("xmlns:").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOpts, ModelSchema};
    use crate::value::Instance;
    use serde_json::json;

    #[test]
    fn namespace_declarations_go_on_the_root_only() {
        let schema = ModelSchema::builder("feed")
            .namespaces([("xmlns", "http://www.w3.org/2005/Atom")])
            .child_with("author", FieldOpts::new(), |b| b.text("name", FieldOpts::new()))
            .build();
        let instance =
            Instance::new(&schema, &json!({"author": {"name": "John"}})).unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains("<author><name>John</name></author>"));
    }

    #[test]
    fn null_and_empty_fields_are_skipped() {
        let schema = ModelSchema::builder("feed")
            .text("title", FieldOpts::new())
            .text("subtitle", FieldOpts::new())
            .build();
        let instance =
            Instance::new(&schema, &json!({"title": "kept", "subtitle": ""})).unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains("<title>kept</title>"));
        assert!(!xml.contains("subtitle"));
    }

    #[test]
    fn attribute_defaults_fill_in_for_null_values() {
        let schema = ModelSchema::builder("title")
            .attribute("type", FieldOpts::new().default("text"))
            .body("value", FieldOpts::new())
            .build();
        let instance = Instance::new(&schema, &json!({"value": "Example"})).unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains(r#"<title type="text">Example</title>"#));
    }

    #[test]
    fn map_entries_emit_with_the_key_stamped() {
        let schema = ModelSchema::builder("feed")
            .map_with("link", "rel", FieldOpts::new(), |b| {
                b.attribute("rel", FieldOpts::new())
                    .attribute("href", FieldOpts::new())
            })
            .build();
        let instance = Instance::new(
            &schema,
            &json!({"link": {"self": {"href": "http://no.com/index.atom"}}}),
        )
        .unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains(r#"<link rel="self" href="http://no.com/index.atom">"#));
    }

    #[test]
    fn prefixed_paths_emit_qualified_names() {
        let schema = ModelSchema::builder("entry")
            .text("total", FieldOpts::new().path("thr:total"))
            .text("title", FieldOpts::new())
            .build();
        let instance =
            Instance::new(&schema, &json!({"total": "10", "title": "test"})).unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains("<thr:total>10</thr:total>"));
    }

    #[test]
    fn text_content_is_escaped() {
        let schema = ModelSchema::builder("entry")
            .text("title", FieldOpts::new())
            .build();
        let instance =
            Instance::new(&schema, &json!({"title": "Fish & <Chips>"})).unwrap();
        let xml = to_xml_string(&instance).unwrap();
        assert!(xml.contains("<title>Fish &amp; &lt;Chips&gt;</title>"));
    }
}
