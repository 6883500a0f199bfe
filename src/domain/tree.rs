//! Arena-backed document tree.
//!
//! Nodes live in a generational arena and refer to each other by index. The
//! parent's `children` list is the only ownership record; `parent` is a plain
//! back-reference kept in sync by the structural operations below.

use std::collections::BTreeMap;
use std::fmt;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tag::Tag;

/// Handle of a node inside a [`Document`].
pub type NodeId = Index;

/// Name used for text nodes.
pub const TEXT_NODE_NAME: &str = "#text";

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Literal character data
    Text(String),
    /// Structural element
    Element(Tag),
    /// Math symbol leaf, `unicode` is None when the parser could not resolve it
    Symbol { tag: Tag, unicode: Option<char> },
}

/// Tree node in the document arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Scalar attributes such as `label` or `id`
    pub attributes: BTreeMap<String, String>,
    /// Original LaTeX source of the node, when the parser recorded it
    pub source: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            source: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Node name as the parser spelled it (`#text` for text nodes).
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::Text(_) => TEXT_NODE_NAME,
            NodeKind::Element(tag) | NodeKind::Symbol { tag, .. } => tag.as_str(),
        }
    }

    /// Tag of an element or symbol node.
    pub fn tag(&self) -> Option<&Tag> {
        match &self.kind {
            NodeKind::Text(_) => None,
            NodeKind::Element(tag) | NodeKind::Symbol { tag, .. } => Some(tag),
        }
    }

    pub fn is_element(&self, tag: &Tag) -> bool {
        matches!(&self.kind, NodeKind::Element(t) if t == tag)
    }

    /// Text payload of a text node.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Text(text) => return write!(f, "{} {:?}", TEXT_NODE_NAME, text),
            NodeKind::Element(tag) => write!(f, "{}", tag)?,
            NodeKind::Symbol { tag, unicode: Some(c) } => write!(f, "{} [{}]", tag, c)?,
            NodeKind::Symbol { tag, unicode: None } => write!(f, "{} [?]", tag)?,
        }
        for (key, value) in &self.attributes {
            write!(f, " {}={:?}", key, value)?;
        }
        Ok(())
    }
}

/// Mutable ordered tree of typed nodes.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Tag::Document)
    }
}

impl Document {
    /// Create a document consisting of a single root element.
    pub fn new(root: Tag) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(Node::new(NodeKind::Element(root)));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    /// Like [`Document::get`], but a missing node is an error.
    pub fn node(&self, id: NodeId) -> DomainResult<&Node> {
        self.arena.get(id).ok_or(DomainError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut Node> {
        self.arena.get_mut(id).ok_or(DomainError::NodeNotFound(id))
    }

    /// Allocate a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        self.arena.insert(Node::new(kind))
    }

    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        self.create(NodeKind::Element(tag))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create(NodeKind::Text(text.into()))
    }

    pub fn create_symbol(&mut self, tag: Tag, unicode: Option<char>) -> NodeId {
        self.create(NodeKind::Symbol { tag, unicode })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Name of the node (`#text` for text), None for a stale id.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.arena.get(id).map(Node::name)
    }

    /// Position of `id` within its parent's children.
    pub fn position(&self, id: NodeId) -> DomainResult<Option<usize>> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(None);
        };
        self.children(parent)
            .iter()
            .position(|&c| c == id)
            .map(Some)
            .ok_or(DomainError::ChildNotFound { parent, child: id })
    }

    pub fn next_sibling(&self, id: NodeId) -> DomainResult<Option<NodeId>> {
        let (Some(parent), Some(pos)) = (self.parent(id), self.position(id)?) else {
            return Ok(None);
        };
        Ok(self.children(parent).get(pos + 1).copied())
    }

    pub fn previous_sibling(&self, id: NodeId) -> DomainResult<Option<NodeId>> {
        let (Some(parent), Some(pos)) = (self.parent(id), self.position(id)?) else {
            return Ok(None);
        };
        Ok(pos
            .checked_sub(1)
            .and_then(|p| self.children(parent).get(p).copied()))
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// Remove a node from its parent's children. The node stays in the arena.
    #[instrument(level = "trace", skip(self))]
    pub fn detach(&mut self, id: NodeId) -> DomainResult<()> {
        let Some(pos) = self.position(id)? else {
            return Ok(());
        };
        let parent = self.node(id)?.parent.ok_or(DomainError::NodeNotFound(id))?;
        self.node_mut(parent)?.children.remove(pos);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Insert `child` under `parent` at `index`, moving it out of its current place.
    #[instrument(level = "trace", skip(self))]
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomainResult<()> {
        self.check_attachable(parent, child)?;
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Append `child` as last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        let end = self.node(parent)?.children.len();
        self.insert(parent, end, child)
    }

    /// Move all of `from`'s children to the end of `to`.
    pub fn append_children(&mut self, to: NodeId, from: NodeId) -> DomainResult<()> {
        for child in self.children(from).to_vec() {
            self.append(to, child)?;
        }
        Ok(())
    }

    /// Move all of `from`'s children to the front of `to`, keeping their order.
    pub fn prepend_children(&mut self, to: NodeId, from: NodeId) -> DomainResult<()> {
        for (i, child) in self.children(from).to_vec().into_iter().enumerate() {
            self.insert(to, i, child)?;
        }
        Ok(())
    }

    /// Replace a node by a list of nodes, in place within its parent.
    ///
    /// Replacements are moved out of wherever they currently live (typically
    /// the replaced node itself). The replaced node and whatever is still
    /// below it afterwards are removed from the arena.
    #[instrument(level = "trace", skip(self))]
    pub fn replace(&mut self, id: NodeId, replacements: &[NodeId]) -> DomainResult<()> {
        let parent = self.node(id)?.parent.ok_or(DomainError::Detached(id))?;
        for &r in replacements {
            if r == id {
                return Err(DomainError::CycleDetected(id));
            }
            self.check_attachable(parent, r)?;
            self.detach(r)?;
        }

        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == id)
            .ok_or(DomainError::ChildNotFound { parent, child: id })?;
        self.node_mut(parent)?
            .children
            .splice(pos..=pos, replacements.iter().copied());
        for &r in replacements {
            self.node_mut(r)?.parent = Some(parent);
        }
        self.node_mut(id)?.parent = None;
        self.remove_subtree(id)
    }

    /// Replace a node by its own children.
    pub fn unpack(&mut self, id: NodeId) -> DomainResult<()> {
        let children = self.children(id).to_vec();
        self.replace(id, &children)
    }

    /// Drop a node and all of its descendants from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) -> DomainResult<()> {
        if id == self.root {
            return Err(DomainError::RootRemoval);
        }
        self.detach(id)?;
        for node in self.postorder(id) {
            self.arena.remove(node);
        }
        Ok(())
    }

    /// Ids of the subtree at `id`, children before parents.
    pub fn postorder(&self, id: NodeId) -> Vec<NodeId> {
        PostOrderIterator::new(self, id).map(|(idx, _)| idx).collect()
    }

    /// Pre-order walk over the whole document.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    /// Post-order walk over the whole document.
    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, self.root)
    }

    /// Structural view of the subtree at `id`, for display.
    pub fn to_termtree(&self, id: NodeId) -> Tree<String> {
        let label = self
            .get(id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("<stale {:?}>", id));
        let leaves: Vec<_> = self
            .children(id)
            .iter()
            .map(|&c| self.to_termtree(c))
            .collect();
        Tree::new(label).with_leaves(leaves)
    }

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == self.root || self.is_ancestor_or_self(child, parent) {
            return Err(DomainError::CycleDetected(child));
        }
        Ok(())
    }
}

pub struct TreeIterator<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> TreeIterator<'a> {
    fn new(doc: &'a Document, start: NodeId) -> Self {
        Self {
            doc,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.doc.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev());
                return Some((current, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    doc: &'a Document,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(doc: &'a Document, start: NodeId) -> Self {
        Self {
            doc,
            stack: vec![(start, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if let Some(node) = self.doc.get(current) {
                if visited {
                    return Some((current, node));
                }
                self.stack.push((current, true));
                for &child in node.children.iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn par_with_texts(doc: &mut Document, texts: &[&str]) -> NodeId {
        let par = doc.create_element(Tag::Par);
        for t in texts {
            let text = doc.create_text(*t);
            doc.append(par, text).unwrap();
        }
        let root = doc.root();
        doc.append(root, par).unwrap();
        par
    }

    #[test]
    fn given_node_when_unpacking_then_children_take_its_place() {
        let mut doc = Document::default();
        let root = doc.root();
        let before = doc.create_text("before");
        doc.append(root, before).unwrap();
        let par = par_with_texts(&mut doc, &["a", "b"]);
        let after = doc.create_text("after");
        doc.append(root, after).unwrap();

        doc.unpack(par).unwrap();

        let names: Vec<_> = doc
            .children(root)
            .iter()
            .map(|&c| doc.get(c).unwrap().text().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["before", "a", "b", "after"]);
        assert!(!doc.contains(par));
        for &c in doc.children(root) {
            assert_eq!(doc.parent(c), Some(root));
        }
    }

    #[test]
    fn given_replaced_node_when_replacing_then_dropped_subtree_leaves_arena() {
        let mut doc = Document::default();
        let par = par_with_texts(&mut doc, &["x"]);
        let dropped = doc.children(par)[0];
        let fresh = doc.create_element(Tag::MathIt);

        doc.replace(par, &[fresh]).unwrap();

        assert!(!doc.contains(par));
        assert!(!doc.contains(dropped));
        assert_eq!(doc.children(doc.root()), &[fresh]);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn given_stale_parent_link_when_replacing_then_child_not_found() {
        let mut doc = Document::default();
        let par = par_with_texts(&mut doc, &["x"]);
        let root = doc.root();
        // corrupt: remove par from root's children but keep its parent link
        doc.get_mut(root).unwrap().children.clear();

        let result = doc.replace(par, &[]);

        assert!(matches!(result, Err(DomainError::ChildNotFound { .. })));
    }

    #[test]
    fn given_ancestor_when_inserting_below_descendant_then_cycle_detected() {
        let mut doc = Document::default();
        let par = par_with_texts(&mut doc, &["x"]);
        let text = doc.children(par)[0];

        assert!(matches!(
            doc.append(text, par),
            Err(DomainError::CycleDetected(_))
        ));
        assert!(matches!(
            doc.append(par, doc.root()),
            Err(DomainError::CycleDetected(_))
        ));
    }

    #[test]
    fn given_siblings_when_querying_then_neighbours_resolve() {
        let mut doc = Document::default();
        let a = par_with_texts(&mut doc, &["a"]);
        let b = par_with_texts(&mut doc, &["b"]);

        assert_eq!(doc.next_sibling(a).unwrap(), Some(b));
        assert_eq!(doc.previous_sibling(b).unwrap(), Some(a));
        assert_eq!(doc.previous_sibling(a).unwrap(), None);
        assert_eq!(doc.next_sibling(doc.root()).unwrap(), None);
    }

    #[test]
    fn given_tree_when_iterating_postorder_then_children_come_first() {
        let mut doc = Document::default();
        let par = par_with_texts(&mut doc, &["a", "b"]);
        let order: Vec<_> = doc.iter_postorder().map(|(id, _)| id).collect();

        assert_eq!(order.len(), 4);
        assert_eq!(order[2], par);
        assert_eq!(order[3], doc.root());
        assert_eq!(order[0], doc.children(par)[0]);
        assert_eq!(doc.postorder(par), order[..3].to_vec());
    }
}
