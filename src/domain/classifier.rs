//! Routing decision between the plain rendering path and full translation.

use crate::domain::tree::{Document, NodeId, NodeKind};

/// Decide whether the math subtree at `id` can be rendered as plain markup.
///
/// Layout constructs are never simple, whether the parser produced them as
/// elements or as symbols. Text is always simple, a symbol only when its
/// codepoint is known, and any other container when all of its children are.
pub fn is_simple(doc: &Document, id: NodeId) -> bool {
    let Some(node) = doc.get(id) else {
        return false;
    };
    match &node.kind {
        NodeKind::Element(tag) | NodeKind::Symbol { tag, .. } if tag.needs_layout() => false,
        NodeKind::Text(_) => true,
        NodeKind::Symbol { unicode, .. } => unicode.is_some(),
        NodeKind::Element(_) => node.children().iter().all(|&c| is_simple(doc, c)),
    }
}
