//! Model instances and the tagged value type their fields hold.
//!
//! An [`Instance`] is an insertion-ordered mapping from field name to
//! [`Value`], covering exactly the declared fields of its schema.
//! Instances form trees: nested instances, list entries, and map values
//! are exclusively owned by their container. Construction takes a
//! `serde_json::Value` configuration mapping and recursively builds
//! children before assigning them.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::coerce;
use crate::error::{Error, Result};
use crate::schema::{Encoding, FieldDescriptor, FieldKind, ModelSchema};

/// A field value: the tagged union behind every declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    DateTime(DateTime<FixedOffset>),
    /// Decoded payload of a base64-encoded field.
    Bytes(Vec<u8>),
    Model(Instance),
    List(Vec<Value>),
    Map(IndexMap<String, Instance>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Instance> {
        match self {
            Value::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Instance>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

/// One populated model: a schema reference plus a value per declared
/// field.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    schema: Arc<ModelSchema>,
    values: IndexMap<String, Value>,
}

impl Instance {
    /// Constructs an instance from a configuration mapping.
    ///
    /// The mapping is a JSON object keyed by field name: scalars for
    /// leaf fields (numbers and booleans stringify), a nested object for
    /// `child`, an array of objects for `list` (a single value is taken
    /// as a one-element list), and a key → object mapping for `map`
    /// (the key is merged into the nested mapping under the map's key
    /// field before recursive construction). Absent fields take the
    /// descriptor's default; `list`/`map` fields always get a container.
    pub fn new(schema: &Arc<ModelSchema>, config: &Json) -> Result<Instance> {
        let supplied = match config {
            Json::Object(map) => Some(map),
            Json::Null => None,
            _ => {
                return Err(Error::Config {
                    field: schema.root().to_string(),
                    message: "configuration must be a JSON object".to_string(),
                });
            }
        };

        let mut values = IndexMap::with_capacity(schema.fields().len());
        for descriptor in schema.fields() {
            let value = match supplied.and_then(|map| map.get(&descriptor.name)) {
                Some(given) if !given.is_null() => configured_value(descriptor, given)?,
                _ => default_value(descriptor)?,
            };
            values.insert(descriptor.name.clone(), value);
        }
        Ok(Instance {
            schema: Arc::clone(schema),
            values,
        })
    }

    /// An instance with every field at its default.
    pub fn with_defaults(schema: &Arc<ModelSchema>) -> Result<Instance> {
        Instance::new(schema, &Json::Null)
    }

    pub(crate) fn from_parts(schema: Arc<ModelSchema>, values: IndexMap<String, Value>) -> Instance {
        Instance { schema, values }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// The value of a declared field; `None` for undeclared names.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Scalar text of a field, if it currently holds text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    pub fn datetime(&self, field: &str) -> Option<&DateTime<FixedOffset>> {
        self.get(field).and_then(Value::as_datetime)
    }

    pub fn bytes(&self, field: &str) -> Option<&[u8]> {
        self.get(field).and_then(Value::as_bytes)
    }

    /// A nested single model, if populated.
    pub fn child(&self, field: &str) -> Option<&Instance> {
        self.get(field).and_then(Value::as_model)
    }

    /// A repeated field's entries; empty for anything else.
    pub fn list(&self, field: &str) -> &[Value] {
        self.get(field).and_then(Value::as_list).unwrap_or(&[])
    }

    /// A keyed field's entries, if the field is a map.
    pub fn map(&self, field: &str) -> Option<&IndexMap<String, Instance>> {
        self.get(field).and_then(Value::as_map)
    }

    /// Field name/value pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders this instance as an XML document.
    pub fn to_xml(&self) -> Result<String> {
        crate::build::to_xml_string(self)
    }
}

/// A descriptor's resting value when nothing is supplied: an empty
/// container for `list`/`map`, the declared default otherwise, else
/// null. Defaults are raw field values: date-time defaults parse like
/// wire text, base64 defaults are the raw payload.
pub(crate) fn default_value(descriptor: &FieldDescriptor) -> Result<Value> {
    match descriptor.kind {
        FieldKind::List => Ok(Value::List(Vec::new())),
        FieldKind::Map => Ok(Value::Map(IndexMap::new())),
        _ => match &descriptor.default {
            None => Ok(Value::Null),
            Some(default) => raw_value(descriptor, default),
        },
    }
}

/// Interprets raw text as a field value according to kind and encoding.
fn raw_value(descriptor: &FieldDescriptor, text: &str) -> Result<Value> {
    if descriptor.kind == FieldKind::DateTime {
        return match coerce::parse_datetime(text) {
            Some(dt) => Ok(Value::DateTime(dt)),
            None => Err(Error::InvalidTemporalValue {
                field: descriptor.name.clone(),
                value: text.to_string(),
            }),
        };
    }
    if descriptor.encoding == Some(Encoding::Base64) {
        return Ok(Value::Bytes(text.as_bytes().to_vec()));
    }
    Ok(Value::Text(text.to_string()))
}

fn configured_value(descriptor: &FieldDescriptor, given: &Json) -> Result<Value> {
    match descriptor.kind {
        FieldKind::Child => match &descriptor.nested {
            Some(nested) => match given {
                Json::Object(_) => Ok(Value::Model(Instance::new(nested, given)?)),
                _ => Err(shape_error(descriptor, "expected a nested mapping")),
            },
            None => scalar_value(descriptor, given),
        },
        FieldKind::List => {
            let items: Vec<&Json> = match given {
                Json::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match &descriptor.nested {
                    Some(nested) => out.push(Value::Model(Instance::new(nested, item)?)),
                    None => out.push(scalar_value(descriptor, item)?),
                }
            }
            Ok(Value::List(out))
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
            let entries = match given {
                Json::Object(entries) => entries,
                _ => return Err(shape_error(descriptor, "expected a key-to-mapping object")),
            };
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, entry) in entries {
                let mut merged = match entry {
                    Json::Object(map) => map.clone(),
                    _ => return Err(shape_error(descriptor, "expected a nested mapping per key")),
                };
                // The entry's own key field wins over the outer key,
                // matching construction-from-mapping in the original.
                merged
                    .entry(key_field.clone())
                    .or_insert_with(|| Json::String(key.clone()));
                out.insert(
                    key.clone(),
                    Instance::new(nested, &Json::Object(merged))?,
                );
            }
            Ok(Value::Map(out))
        }
        _ => scalar_value(descriptor, given),
    }
}

fn scalar_value(descriptor: &FieldDescriptor, given: &Json) -> Result<Value> {
    match given {
        Json::String(text) => raw_value(descriptor, text),
        Json::Number(n) => raw_value(descriptor, &n.to_string()),
        Json::Bool(b) => raw_value(descriptor, if *b { "true" } else { "false" }),
        Json::Null => Ok(Value::Null),
        _ => Err(shape_error(descriptor, "expected a scalar value")),
    }
}

fn shape_error(descriptor: &FieldDescriptor, message: &str) -> Error {
    Error::Config {
        field: descriptor.name.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOpts, ModelSchema};
    use serde_json::json;

    fn entry_schema() -> Arc<ModelSchema> {
        ModelSchema::builder("feed")
            .text("id", FieldOpts::new())
            .child_with("title", FieldOpts::new(), |b| {
                b.attribute("type", FieldOpts::new().default("text"))
                    .body("value", FieldOpts::new())
            })
            .list_with("entry", FieldOpts::new(), |b| b.text("title", FieldOpts::new()))
            .map_with("link", "rel", FieldOpts::new(), |b| {
                b.attribute("rel", FieldOpts::new())
                    .attribute("href", FieldOpts::new())
            })
            .build()
    }

    #[test]
    fn absent_fields_take_defaults_and_containers() {
        let schema = entry_schema();
        let instance = Instance::new(&schema, &json!({})).unwrap();
        assert_eq!(instance.get("id"), Some(&Value::Null));
        assert!(instance.list("entry").is_empty());
        assert!(instance.map("link").unwrap().is_empty());
    }

    #[test]
    fn nested_construction_applies_defaults() {
        let schema = entry_schema();
        let instance =
            Instance::new(&schema, &json!({"title": {"value": "Example Feed"}})).unwrap();
        let title = instance.child("title").unwrap();
        assert_eq!(title.text("type"), Some("text"));
        assert_eq!(title.text("value"), Some("Example Feed"));
    }

    #[test]
    fn single_value_becomes_one_element_list() {
        let schema = entry_schema();
        let instance = Instance::new(&schema, &json!({"entry": {"title": "only"}})).unwrap();
        assert_eq!(instance.list("entry").len(), 1);
    }

    #[test]
    fn map_keys_merge_into_the_key_field() {
        let schema = entry_schema();
        let instance = Instance::new(
            &schema,
            &json!({"link": {"self": {"href": "http://no.com/index.atom"}}}),
        )
        .unwrap();
        let link = &instance.map("link").unwrap()["self"];
        assert_eq!(link.text("rel"), Some("self"));
        assert_eq!(link.text("href"), Some("http://no.com/index.atom"));
    }

    #[test]
    fn scalars_stringify() {
        let schema = ModelSchema::builder("entry")
            .text("total", FieldOpts::new())
            .text("draft", FieldOpts::new())
            .build();
        let instance = Instance::new(&schema, &json!({"total": 10, "draft": false})).unwrap();
        assert_eq!(instance.text("total"), Some("10"));
        assert_eq!(instance.text("draft"), Some("false"));
    }

    #[test]
    fn wrong_shapes_are_config_errors() {
        let schema = entry_schema();
        let err = Instance::new(&schema, &json!({"title": ["not", "a", "mapping"]})).unwrap_err();
        assert!(matches!(err, Error::Config { field, .. } if field == "title"));
        let err = Instance::new(&schema, &json!({"link": ["nope"]})).unwrap_err();
        assert!(matches!(err, Error::Config { field, .. } if field == "link"));
    }
}
