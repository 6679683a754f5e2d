//! Schema declaration: field descriptors, namespace tables, and the
//! builder that freezes them into immutable model schemas.
//!
//! A schema is built once, at model-declaration time, and never mutated
//! afterwards. Declared schemas are shared as `Arc<ModelSchema>`, which
//! is what lets one shape (an author, a link) be reused across several
//! fields and several parent schemas without copying definitions.

use std::sync::Arc;

use indexmap::IndexMap;

/// The W3C XML namespace, bound to the `xml` prefix in every document.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The seven field shapes a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// An attribute on the model's root element.
    Attribute,
    /// The text content of the model's root element itself.
    Body,
    /// A child element holding scalar text.
    Text,
    /// A child element holding a timestamp.
    DateTime,
    /// A single nested model (or, without a nested schema, a scalar).
    Child,
    /// A repeated nested model, kept in document order.
    List,
    /// Repeated nested models keyed by one of their own fields.
    Map,
}

/// Wire encodings applicable to text-shaped leaf values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// URL-safe base64: `-`/`_` alphabet, unpadded, single-line.
    Base64,
}

/// Immutable description of one named field of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name, unique within the owning schema.
    pub name: String,
    pub kind: FieldKind,
    /// Explicit query override; when absent the path resolver derives
    /// the address from `name` and `kind`.
    pub path: Option<String>,
    /// Nested schema for `Child`/`List`/`Map` fields whose values are
    /// themselves models.
    pub nested: Option<Arc<ModelSchema>>,
    /// Field on the nested model whose value becomes the map key.
    pub key_field: Option<String>,
    pub encoding: Option<Encoding>,
    /// Fallback used when the field is absent during parse and
    /// construction, and when building an attribute whose live value is
    /// null.
    pub default: Option<String>,
}

/// Insertion-ordered alias → URI table.
///
/// Aliases are stored exactly as the model author writes them: `xmlns`
/// for the default namespace, `xmlns:thr` for prefixed ones. Lookup by
/// query prefix accepts both the `xmlns:p` spelling and bare `p`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespaces {
    table: IndexMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, uri: impl Into<String>) {
        self.table.insert(alias.into(), uri.into());
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Whether a default namespace (`xmlns` alias) is declared.
    pub fn has_default(&self) -> bool {
        self.table.contains_key("xmlns")
    }

    /// URI bound to the default namespace alias.
    pub fn default_uri(&self) -> Option<&str> {
        self.table.get("xmlns").map(String::as_str)
    }

    /// Resolves a query prefix to its URI. The `xml` prefix is built in;
    /// the `xmlns` prefix names the default namespace.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        if prefix == "xmlns" {
            return self.default_uri();
        }
        self.table
            .get(&format!("xmlns:{prefix}"))
            .or_else(|| self.table.get(prefix))
            .map(String::as_str)
    }

    /// Alias/URI pairs in declaration order, exactly as written.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Namespaces {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ns = Namespaces::new();
        for (k, v) in iter {
            ns.insert(k, v);
        }
        ns
    }
}

/// An ordered field descriptor list plus a root tag name and a namespace
/// table, associated with one model type.
///
/// Declaration order is both parse-iteration order and build-emission
/// order. Schemas are created through [`SchemaBuilder`] and read-only
/// afterwards; sharing an `Arc<ModelSchema>` across threads is safe.
#[derive(Debug, PartialEq)]
pub struct ModelSchema {
    root: String,
    namespaces: Namespaces,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    pub fn builder(root: &str) -> SchemaBuilder {
        SchemaBuilder::new(root)
    }

    /// Root tag name as declared; may carry a namespace-alias prefix.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Per-field declaration options: `{path, default, encoding, model}`.
#[derive(Debug, Clone, Default)]
pub struct FieldOpts {
    path: Option<String>,
    default: Option<String>,
    encoding: Option<Encoding>,
    model: Option<Arc<ModelSchema>>,
}

impl FieldOpts {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Explicit query override for renamed, namespaced, or hyphenated
    /// tag names.
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Fallback value for absent fields.
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Marks the field's wire form as URL-safe base64.
    pub fn base64(mut self) -> Self {
        self.encoding = Some(Encoding::Base64);
        self
    }

    /// Attaches an already-declared schema instead of an inline body.
    pub fn model(mut self, schema: &Arc<ModelSchema>) -> Self {
        self.model = Some(Arc::clone(schema));
        self
    }
}

/// Collects field declarations and freezes them into a [`ModelSchema`].
///
/// The `*_with` variants take a closure declaring an inline nested
/// schema; its root tag defaults to the field's explicit path or name,
/// and it inherits the enclosing namespace table by value as of the
/// declaration point.
#[derive(Debug)]
pub struct SchemaBuilder {
    root: String,
    namespaces: Namespaces,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(root: &str) -> Self {
        SchemaBuilder {
            root: root.to_string(),
            namespaces: Namespaces::new(),
            fields: Vec::new(),
        }
    }

    /// Replaces the root tag name.
    pub fn root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    /// Installs the namespace table (alias → URI, aliases as written:
    /// `xmlns`, `xmlns:thr`, ...).
    pub fn namespaces<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.namespaces = pairs.into_iter().collect();
        self
    }

    /// Declares an attribute embedded on the model's root element.
    pub fn attribute(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::Attribute, opts, None, None)
    }

    /// Declares the text content of the model's root element.
    pub fn body(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::Body, opts, None, None)
    }

    /// Declares a textual child element.
    pub fn text(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::Text, opts, None, None)
    }

    /// Declares a timestamp child element.
    pub fn datetime(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::DateTime, opts, None, None)
    }

    /// Declares a single nested model; without `FieldOpts::model` the
    /// field behaves as a scalar text element.
    pub fn child(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::Child, opts, None, None)
    }

    /// Declares a single nested model with an inline schema body.
    pub fn child_with(
        self,
        name: &str,
        opts: FieldOpts,
        body: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
    ) -> Self {
        let nested = self.nested_schema(name, &opts, body);
        self.push(name, FieldKind::Child, opts, Some(nested), None)
    }

    /// Declares a repeated model field.
    pub fn list(self, name: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::List, opts, None, None)
    }

    /// Declares a repeated model field with an inline schema body.
    pub fn list_with(
        self,
        name: &str,
        opts: FieldOpts,
        body: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
    ) -> Self {
        let nested = self.nested_schema(name, &opts, body);
        self.push(name, FieldKind::List, opts, Some(nested), None)
    }

    /// Declares a key-indexed model map; `key` names the nested field
    /// whose value becomes the map key.
    pub fn map(self, name: &str, key: &str, opts: FieldOpts) -> Self {
        self.push(name, FieldKind::Map, opts, None, Some(key.to_string()))
    }

    /// Declares a key-indexed model map with an inline schema body.
    pub fn map_with(
        self,
        name: &str,
        key: &str,
        opts: FieldOpts,
        body: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
    ) -> Self {
        let nested = self.nested_schema(name, &opts, body);
        self.push(name, FieldKind::Map, opts, Some(nested), Some(key.to_string()))
    }

    /// Freezes the declarations into an immutable, shareable schema.
    ///
    /// # Panics
    ///
    /// Panics if a `map` field lacks a nested schema; schema declaration
    /// is init-time code and misdeclaration is a programming error.
    pub fn build(self) -> Arc<ModelSchema> {
        for field in &self.fields {
            if field.kind == FieldKind::Map && field.nested.is_none() {
                panic!(
                    "map field `{}` in schema `{}` requires a nested model",
                    field.name, self.root
                );
            }
        }
        Arc::new(ModelSchema {
            root: self.root,
            namespaces: self.namespaces,
            fields: self.fields,
        })
    }

    fn nested_schema(
        &self,
        name: &str,
        opts: &FieldOpts,
        body: impl FnOnce(SchemaBuilder) -> SchemaBuilder,
    ) -> Arc<ModelSchema> {
        let root = opts.path.as_deref().unwrap_or(name);
        let builder = SchemaBuilder {
            root: root.to_string(),
            namespaces: self.namespaces.clone(),
            fields: Vec::new(),
        };
        body(builder).build()
    }

    /// # Panics
    ///
    /// Panics on a duplicate field name within one schema.
    fn push(
        mut self,
        name: &str,
        kind: FieldKind,
        opts: FieldOpts,
        inline: Option<Arc<ModelSchema>>,
        key_field: Option<String>,
    ) -> Self {
        if self.fields.iter().any(|f| f.name == name) {
            panic!("duplicate field `{name}` in schema `{}`", self.root);
        }
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            path: opts.path,
            nested: inline.or(opts.model),
            key_field,
            encoding: opts.encoding,
            default: opts.default,
        });
        self
    }
}
