//! MathML formula import
//!
//! The translator answers with a `<formula>` envelope around a single MathML
//! element. Namespaced MathML elements are flattened into `mml:`-prefixed node
//! names so the rest of the pipeline never deals with XML namespaces. Names in
//! the XML namespace keep their reserved `xml:` prefix; any other namespace is
//! rejected.

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tag::{Tag, MML_PREFIX};
use crate::domain::tree::{Document, NodeId};

/// MathML namespace URI.
pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XML_PREFIX: &str = "xml:";

/// Root element of a translator response.
pub const FORMULA_ELEMENT: &str = "formula";

/// Parse a translator response and build its math root as a detached subtree of `doc`.
pub fn import_formula(doc: &mut Document, formula: &str) -> DomainResult<NodeId> {
    let xml = roxmltree::Document::parse(formula).map_err(|e| DomainError::InvalidFormula {
        message: e.to_string(),
    })?;
    let envelope = xml.root_element();
    let envelope_name = envelope.tag_name();
    if envelope_name.namespace().is_some() || envelope_name.name() != FORMULA_ELEMENT {
        return Err(DomainError::InvalidFormula {
            message: format!(
                "root element is <{}>, expected <{}>",
                envelope_name.name(),
                FORMULA_ELEMENT
            ),
        });
    }

    let mut elements = envelope.children().filter(|n| n.is_element());
    let math = elements.next().ok_or_else(|| DomainError::InvalidFormula {
        message: "empty formula".to_string(),
    })?;
    if elements.next().is_some() {
        return Err(DomainError::InvalidFormula {
            message: "formula holds more than one element".to_string(),
        });
    }
    convert_element(doc, math)
}

/// Convert an XML element and everything below it into detached document nodes.
///
/// Attributes are copied with the same name flattening as elements. Text is
/// kept in document order; whitespace between child elements is dropped.
pub fn convert_element(doc: &mut Document, element: roxmltree::Node<'_, '_>) -> DomainResult<NodeId> {
    let tag = element.tag_name();
    let id = doc.create_element(Tag::from_name(&formula_name(tag.namespace(), tag.name())?));
    for attr in element.attributes() {
        let name = formula_name(attr.namespace(), attr.name())?;
        doc.node_mut(id)?.set_attribute(name, attr.value());
    }

    let has_elements = element.children().any(|c| c.is_element());
    for child in element.children() {
        if child.is_element() {
            let converted = convert_element(doc, child)?;
            doc.append(id, converted)?;
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if has_elements && text.trim().is_empty() {
                continue;
            }
            let text = doc.create_text(text);
            doc.append(id, text)?;
        }
    }
    Ok(id)
}

/// Prefixed name for a namespaced XML name; `None` for namespaces without a fixed prefix.
pub fn flatten(namespace: Option<&str>, local: &str) -> Option<String> {
    match namespace {
        Some(MATHML_NS) => Some(format!("{}{}", MML_PREFIX, local)),
        Some(XML_NS) => Some(format!("{}{}", XML_PREFIX, local)),
        Some(_) => None,
        None => Some(local.to_string()),
    }
}

fn formula_name(namespace: Option<&str>, local: &str) -> DomainResult<String> {
    flatten(namespace, local).ok_or_else(|| DomainError::InvalidFormula {
        message: format!("{} is in unsupported namespace {}", local, namespace.unwrap_or_default()),
    })
}
