//! Error types for schema-driven XML mapping.

use thiserror::Error;

/// Errors surfaced while parsing documents, building documents, or
/// constructing model instances.
///
/// Coercion and tokenization failures abort the whole `parse`/`to_xml`
/// call; there is no partial-result mode. Matching zero nodes for a field
/// is not an error: it yields the field's default or an empty container.
#[derive(Debug, Error)]
pub enum Error {
    /// The input text could not be tokenized by the document engine.
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] roxmltree::Error),

    /// A `datetime` field matched non-empty text that does not parse
    /// under any accepted timestamp profile.
    #[error("invalid temporal value {value:?} in field `{field}`")]
    InvalidTemporalValue { field: String, value: String },

    /// A base64-encoded field carried payload text that cannot be
    /// decoded with the URL-safe alphabet.
    #[error("invalid base64 payload in field `{field}`: {source}")]
    Base64 {
        field: String,
        source: base64::DecodeError,
    },

    /// A query path uses a namespace prefix the schema's namespace table
    /// does not declare.
    #[error("unbound namespace prefix `{0}`")]
    UnboundPrefix(String),

    /// A configuration mapping does not fit the declared shape of a
    /// field (e.g. an array where a nested mapping is required).
    #[error("invalid configuration for field `{field}`: {message}")]
    Config { field: String, message: String },

    /// XML serialization error from the document engine.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// IO error while writing a document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, Error>;
