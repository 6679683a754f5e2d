//! Field-address resolution and document queries.
//!
//! [`resolve`] is the pure rule that turns a field descriptor into a
//! query string; [`eval`] runs such a query against a context element.
//! Both the parser and the builder go through `resolve`, which is what
//! keeps the two directions addressing the same nodes.

use roxmltree::Node;

use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, FieldKind, Namespaces};

/// Resolves a field descriptor to its document query string.
///
/// Priority: explicit path (with `@` prepended for attributes that lack
/// it, so renamed attributes parse from the address they are built to),
/// then `@name` for attributes, `text()` for body fields, a
/// default-alias-qualified name when the schema declares a default
/// namespace, and finally the bare field name.
pub fn resolve(descriptor: &FieldDescriptor, namespaces: &Namespaces) -> String {
    if let Some(path) = &descriptor.path {
        if descriptor.kind == FieldKind::Attribute && !path.starts_with('@') {
            return format!("@{path}");
        }
        return path.clone();
    }
    match descriptor.kind {
        FieldKind::Attribute => format!("@{}", descriptor.name),
        FieldKind::Body => "text()".to_string(),
        _ if namespaces.has_default() => format!("xmlns:{}", descriptor.name),
        _ => descriptor.name.clone(),
    }
}

/// Resolves a schema's root tag to the query that selects its context
/// node: the default alias is prepended when the table declares one and
/// the root tag is not already qualified.
pub fn resolve_root(root: &str, namespaces: &Namespaces) -> String {
    if namespaces.has_default() && !root.contains(':') {
        format!("xmlns:{root}")
    } else {
        root.to_string()
    }
}

/// One result of evaluating a query: an element node, or leaf text
/// (attribute values and text-node content).
#[derive(Debug)]
pub(crate) enum Match<'a, 'input> {
    Element(Node<'a, 'input>),
    Text(String),
}

/// Evaluates a resolved query against a context element, returning
/// matches in document order.
///
/// Grammar: `/`-separated element steps with an optional `@name` or
/// `text()` terminal. When the namespace table is empty, names match by
/// local name only (the namespace-stripping mode); otherwise prefixes
/// resolve through the table and both URI and local name must match.
pub(crate) fn eval<'a, 'input>(
    query: &str,
    namespaces: &Namespaces,
    context: Node<'a, 'input>,
) -> Result<Vec<Match<'a, 'input>>> {
    let steps: Vec<&str> = query.split('/').collect();
    let mut contexts = vec![context];

    for (i, step) in steps.iter().enumerate() {
        let terminal = i == steps.len() - 1;

        if terminal && *step == "text()" {
            let mut out = Vec::new();
            for node in contexts {
                for child in node.children().filter(|c| c.is_text()) {
                    if let Some(text) = child.text() {
                        out.push(Match::Text(text.to_string()));
                    }
                }
            }
            return Ok(out);
        }

        if terminal {
            if let Some(name) = step.strip_prefix('@') {
                let qname = QName::parse(name);
                let mut out = Vec::new();
                for node in contexts {
                    if let Some(value) = attribute_value(node, &qname, namespaces)? {
                        out.push(Match::Text(value));
                    }
                }
                return Ok(out);
            }
        }

        let qname = QName::parse(step);
        let mut next = Vec::new();
        for node in contexts {
            for child in node.children().filter(|c| c.is_element()) {
                if element_matches(child, &qname, namespaces)? {
                    next.push(child);
                }
            }
        }
        contexts = next;
    }

    Ok(contexts.into_iter().map(Match::Element).collect())
}

/// Whether `node` itself matches a single-step element query; used to
/// check the document root against the schema's root path.
pub(crate) fn node_matches(query: &str, namespaces: &Namespaces, node: Node) -> Result<bool> {
    element_matches(node, &QName::parse(query), namespaces)
}

/// Concatenated descendant text of an element, the scalar reading of a
/// matched node.
pub(crate) fn element_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// A possibly-prefixed name from a query step.
struct QName {
    prefix: Option<String>,
    local: String,
}

impl QName {
    fn parse(step: &str) -> QName {
        match step.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => QName {
                prefix: None,
                local: step.to_string(),
            },
        }
    }
}

fn element_matches(node: Node, qname: &QName, namespaces: &Namespaces) -> Result<bool> {
    if !node.is_element() || node.tag_name().name() != qname.local {
        return Ok(false);
    }
    if namespaces.is_empty() {
        return Ok(true);
    }
    match &qname.prefix {
        Some(prefix) => {
            let uri = namespaces
                .resolve_prefix(prefix)
                .ok_or_else(|| Error::UnboundPrefix(prefix.clone()))?;
            Ok(node.tag_name().namespace() == Some(uri))
        }
        None => Ok(node.tag_name().namespace().is_none()),
    }
}

fn attribute_value(node: Node, qname: &QName, namespaces: &Namespaces) -> Result<Option<String>> {
    match &qname.prefix {
        Some(prefix) if !namespaces.is_empty() => {
            let uri = namespaces
                .resolve_prefix(prefix)
                .ok_or_else(|| Error::UnboundPrefix(prefix.clone()))?;
            Ok(node
                .attributes()
                .find(|a| a.namespace() == Some(uri) && a.name() == qname.local)
                .map(|a| a.value().to_string()))
        }
        _ => {
            // Namespace-stripping mode matches attributes by local name;
            // with a table present, an unprefixed query matches only
            // non-namespaced attributes.
            Ok(node
                .attributes()
                .find(|a| {
                    a.name() == qname.local
                        && (namespaces.is_empty() || a.namespace().is_none())
                })
                .map(|a| a.value().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldOpts, ModelSchema};

    fn descriptor(schema: &ModelSchema, name: &str) -> FieldDescriptor {
        schema.field(name).unwrap().clone()
    }

    #[test]
    fn resolver_rule_table() {
        let plain = ModelSchema::builder("feed")
            .attribute("type", FieldOpts::new())
            .body("value", FieldOpts::new())
            .text("title", FieldOpts::new())
            .text("total", FieldOpts::new().path("thr:total"))
            .attribute("lang", FieldOpts::new().path("xml:lang"))
            .build();
        let none = Namespaces::new();
        assert_eq!(resolve(&descriptor(&plain, "type"), &none), "@type");
        assert_eq!(resolve(&descriptor(&plain, "value"), &none), "text()");
        assert_eq!(resolve(&descriptor(&plain, "title"), &none), "title");
        assert_eq!(resolve(&descriptor(&plain, "total"), &none), "thr:total");
        assert_eq!(resolve(&descriptor(&plain, "lang"), &none), "@xml:lang");

        let defaulted: Namespaces = [("xmlns", "http://www.w3.org/2005/Atom")]
            .into_iter()
            .collect();
        assert_eq!(resolve(&descriptor(&plain, "title"), &defaulted), "xmlns:title");
        assert_eq!(resolve(&descriptor(&plain, "type"), &defaulted), "@type");
        assert_eq!(resolve(&descriptor(&plain, "value"), &defaulted), "text()");
    }

    #[test]
    fn root_resolution_qualifies_unprefixed_roots_only() {
        let ns: Namespaces = [("xmlns", "http://docs.oasis-open.org/ns/xri/xrd-1.0")]
            .into_iter()
            .collect();
        assert_eq!(resolve_root("XRD", &ns), "xmlns:XRD");
        assert_eq!(resolve_root("thr:total", &ns), "thr:total");
        assert_eq!(resolve_root("rss", &Namespaces::new()), "rss");
    }

    #[test]
    fn namespace_free_mode_matches_local_names() {
        let doc = roxmltree::Document::parse(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom">
                 <atom:link rel="hub"/>
                 <link>plain</link>
               </rss>"#,
        )
        .unwrap();
        let ns = Namespaces::new();
        let matches = eval("link", &ns, doc.root_element()).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn namespace_aware_mode_requires_uri_match() {
        let doc = roxmltree::Document::parse(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:other="http://example.org/">
                 <title>yes</title>
                 <other:title>no</other:title>
               </feed>"#,
        )
        .unwrap();
        let ns: Namespaces = [("xmlns", "http://www.w3.org/2005/Atom")]
            .into_iter()
            .collect();
        let matches = eval("xmlns:title", &ns, doc.root_element()).unwrap();
        assert_eq!(matches.len(), 1);
        match &matches[0] {
            Match::Element(el) => assert_eq!(element_text(*el), "yes"),
            other => panic!("expected element match, got {other:?}"),
        }
    }

    #[test]
    fn unbound_prefix_is_an_error() {
        let doc = roxmltree::Document::parse("<feed><a/></feed>").unwrap();
        let ns: Namespaces = [("xmlns", "http://www.w3.org/2005/Atom")]
            .into_iter()
            .collect();
        let err = eval("nope:a", &ns, doc.root_element()).unwrap_err();
        assert!(matches!(err, Error::UnboundPrefix(p) if p == "nope"));
    }

    #[test]
    fn text_terminal_yields_direct_text_children() {
        let doc = roxmltree::Document::parse("<title type=\"text\">Example Feed</title>").unwrap();
        let matches = eval("text()", &Namespaces::new(), doc.root_element()).unwrap();
        assert_eq!(matches.len(), 1);
        match &matches[0] {
            Match::Text(t) => assert_eq!(t, "Example Feed"),
            other => panic!("expected text match, got {other:?}"),
        }
    }

    #[test]
    fn multi_step_paths_descend() {
        let doc = roxmltree::Document::parse(
            "<rss><channel><item><title>Item Example</title></item></channel></rss>",
        )
        .unwrap();
        let matches = eval("channel/item/title", &Namespaces::new(), doc.root_element()).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn attribute_terminal_yields_values() {
        let doc = roxmltree::Document::parse(r#"<link href="http://example.org/" rel="self"/>"#)
            .unwrap();
        let matches = eval("@href", &Namespaces::new(), doc.root_element()).unwrap();
        assert_eq!(matches.len(), 1);
        match &matches[0] {
            Match::Text(t) => assert_eq!(t, "http://example.org/"),
            other => panic!("expected text match, got {other:?}"),
        }
        assert!(eval("@missing", &Namespaces::new(), doc.root_element())
            .unwrap()
            .is_empty());
    }
}
