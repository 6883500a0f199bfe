//! XML interchange format for document trees.
//!
//! Element names are node names, character data becomes text nodes. Two
//! attributes are reserved: `source` holds the LaTeX source of a node and
//! `unicode` marks a math symbol leaf (empty when the symbol is unresolved).
//! A trailing `*` in a node name is spelled `-star`, which keeps names valid XML.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::mathml::{flatten, MATHML_NS};
use crate::domain::tag::Tag;
use crate::domain::tree::{Document, NodeId, NodeKind};

pub const SOURCE_ATTR: &str = "source";
pub const UNICODE_ATTR: &str = "unicode";
const STAR_SUFFIX: &str = "-star";

/// Load a document tree.
pub fn parse_document(xml: &str) -> DomainResult<Document> {
    let parsed = roxmltree::Document::parse(xml).map_err(|e| DomainError::InvalidXml {
        message: e.to_string(),
    })?;
    let element = parsed.root_element();
    if element.attribute(UNICODE_ATTR).is_some() {
        return Err(DomainError::InvalidXml {
            message: "document root cannot be a symbol".to_string(),
        });
    }
    let mut doc = Document::new(Tag::from_name(&node_name(element)?));
    let root = doc.root();
    load_attributes(&mut doc, root, element)?;
    load_children(&mut doc, root, element)?;
    Ok(doc)
}

fn load_element(doc: &mut Document, element: roxmltree::Node<'_, '_>) -> DomainResult<NodeId> {
    let tag = Tag::from_name(&node_name(element)?);
    let id = match element.attribute(UNICODE_ATTR) {
        Some(unicode) => doc.create_symbol(tag, unicode.chars().next()),
        None => doc.create_element(tag),
    };
    load_attributes(doc, id, element)?;
    load_children(doc, id, element)?;
    Ok(id)
}

fn load_attributes(
    doc: &mut Document,
    id: NodeId,
    element: roxmltree::Node<'_, '_>,
) -> DomainResult<()> {
    let node = doc.node_mut(id)?;
    for attr in element.attributes() {
        match (attr.namespace(), attr.name()) {
            (None, SOURCE_ATTR) => node.source = Some(attr.value().to_string()),
            (None, UNICODE_ATTR) => {}
            (namespace, name) => node.set_attribute(document_name(namespace, name)?, attr.value()),
        }
    }
    Ok(())
}

fn load_children(
    doc: &mut Document,
    id: NodeId,
    element: roxmltree::Node<'_, '_>,
) -> DomainResult<()> {
    for child in element.children() {
        if child.is_element() {
            let converted = load_element(doc, child)?;
            doc.append(id, converted)?;
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            // indentation
            if text.trim().is_empty() && text.contains('\n') {
                continue;
            }
            let text = doc.create_text(text);
            doc.append(id, text)?;
        }
    }
    Ok(())
}

fn node_name(element: roxmltree::Node<'_, '_>) -> DomainResult<String> {
    let tag = element.tag_name();
    let name = document_name(tag.namespace(), tag.name())?;
    Ok(match name.strip_suffix(STAR_SUFFIX) {
        Some(base) if !base.is_empty() => format!("{}*", base),
        _ => name,
    })
}

fn document_name(namespace: Option<&str>, local: &str) -> DomainResult<String> {
    flatten(namespace, local).ok_or_else(|| DomainError::InvalidXml {
        message: format!("{} is in unsupported namespace {}", local, namespace.unwrap_or_default()),
    })
}

fn xml_name(node_name: &str) -> String {
    match node_name.strip_suffix('*') {
        Some(base) => format!("{}{}", base, STAR_SUFFIX),
        None => node_name.to_string(),
    }
}

/// Serialize a document tree without added whitespace.
///
/// With `declare_mml` the root element declares the `mml` namespace prefix.
pub fn write_document(doc: &Document, declare_mml: bool) -> DomainResult<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, doc, doc.root(), declare_mml)?;
    String::from_utf8(writer.into_inner()).map_err(|e| DomainError::InvalidXml {
        message: e.to_string(),
    })
}

/// True when any node of the document is a math-markup node.
pub fn has_mathml(doc: &Document) -> bool {
    doc.iter()
        .any(|(_, node)| matches!(node.tag(), Some(Tag::MathMl(_))))
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    id: NodeId,
    declare_mml: bool,
) -> DomainResult<()> {
    let node = doc.node(id)?;
    if let Some(text) = node.text() {
        return writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err);
    }

    let name = xml_name(node.name());
    let mut start = BytesStart::new(name.as_str());
    if declare_mml {
        start.push_attribute(("xmlns:mml", MATHML_NS));
    }
    if let NodeKind::Symbol { unicode, .. } = &node.kind {
        let value = unicode.map(String::from).unwrap_or_default();
        start.push_attribute((UNICODE_ATTR, value.as_str()));
    }
    if let Some(source) = &node.source {
        start.push_attribute((SOURCE_ATTR, source.as_str()));
    }
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children().is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }
    writer
        .write_event(Event::Start(start.borrow()))
        .map_err(xml_err)?;
    for &child in node.children() {
        write_node(writer, doc, child, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(xml_err)
}

fn xml_err(e: quick_xml::Error) -> DomainError {
    DomainError::InvalidXml {
        message: e.to_string(),
    }
}
