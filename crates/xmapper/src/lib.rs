//! # xmapper
//!
//! A declarative, schema-driven engine mapping structured object models
//! to and from XML documents.
//!
//! A model author declares, once at model-definition time, an ordered
//! set of typed field descriptors together with a root tag name and a
//! namespace table. The engine then provides two operations, parsing an
//! XML document into an instance graph and serializing an instance graph
//! back into an XML document, that address the document through the
//! same path-resolution rule in both directions.
//!
//! ## Declaration ↔ document mapping
//!
//! | Declaration | Document shape |
//! |-------------|----------------|
//! | `attribute("type", ..)` | `<title type="…">` |
//! | `body("value", ..)` | text content of the current element |
//! | `text("title", ..)` | `<title>…</title>` |
//! | `datetime("updated", ..)` | `<updated>2003-12-13T18:30:02+00:00</updated>` |
//! | `child_with("author", .., body)` | one `<author>…</author>` |
//! | `list_with("entry", .., body)` | repeated `<entry>…</entry>` siblings |
//! | `map_with("link", "rel", .., body)` | repeated `<link rel="…">` keyed by `rel` |
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use xmapper::{FieldOpts, Instance, ModelSchema, from_xml_str};
//!
//! let feed = ModelSchema::builder("feed")
//!     .namespaces([("xmlns", "http://www.w3.org/2005/Atom")])
//!     .text("title", FieldOpts::new())
//!     .child_with("author", FieldOpts::new(), |b| {
//!         b.text("name", FieldOpts::new())
//!     })
//!     .build();
//!
//! let instance = Instance::new(
//!     &feed,
//!     &json!({"title": "Example Feed", "author": {"name": "John Doe"}}),
//! )?;
//! let xml = instance.to_xml()?;
//!
//! let parsed = from_xml_str(&feed, &xml)?;
//! assert_eq!(parsed.text("title"), Some("Example Feed"));
//! assert_eq!(parsed.child("author").unwrap().text("name"), Some("John Doe"));
//! # Ok::<(), xmapper::Error>(())
//! ```
//!
//! ## Scope
//!
//! The engine owns the schema registry, path resolution, the parse and
//! build walks, and value coercion (date-time, base64). Tokenization,
//! node queries, and text serialization belong to the document engine
//! crates ([`roxmltree`] on the read side, [`quick_xml`] on the write
//! side); their errors propagate unchanged. Schema validation,
//! streaming parses, and recovery from malformed input are out of
//! scope.

pub mod build;
pub mod coerce;
pub mod error;
pub mod parse;
pub mod path;
pub mod schema;
pub mod value;

pub use build::{to_xml_string, to_xml_writer};
pub use error::{Error, Result};
pub use parse::{from_xml_str, parse_node};
pub use path::{resolve, resolve_root};
pub use schema::{
    Encoding, FieldDescriptor, FieldKind, FieldOpts, ModelSchema, Namespaces, SchemaBuilder,
};
pub use value::{Instance, Value};
