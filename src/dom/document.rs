use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dom::dom_model::{DocumentSnapshot, FrameSnapshot, NodeSnapshot, Rect, Viewport};
use crate::dom::selector::{Selector, SelectorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub usize);

/// Identity of one element across every traversed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef {
    pub doc: DocumentId,
    pub node: NodeId,
}

impl ElementRef {
    pub fn new(doc: DocumentId, node: NodeId) -> Self {
        Self { doc, node }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc{}:node{}", self.doc.0, self.node.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub rect: Option<Rect>,
    pub hidden: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub frame: Option<FrameSnapshot>,
}

/// Arena-backed element tree for one document scope.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    url: String,
    title: String,
    viewport: Viewport,
    nodes: Vec<Node>,
}

impl Document {
    pub fn from_snapshot(id: DocumentId, snapshot: DocumentSnapshot) -> Self {
        let mut doc = Document {
            id,
            url: snapshot.url,
            title: snapshot.title,
            viewport: snapshot.viewport,
            nodes: Vec::new(),
        };
        doc.push_node(snapshot.root, None);
        doc
    }

    fn push_node(&mut self, snapshot: NodeSnapshot, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: snapshot.tag.to_ascii_lowercase(),
            attributes: snapshot.attributes,
            text: snapshot.text.unwrap_or_default(),
            rect: snapshot.rect,
            hidden: snapshot.hidden,
            parent,
            children: Vec::new(),
            frame: snapshot.frame,
        });

        for child in snapshot.children {
            let child_id = self.push_node(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }

        id
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Renumbered when earlier documents leave the page.
    pub(crate) fn set_id(&mut self, id: DocumentId) {
        self.id = id;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn element(&self, node: NodeId) -> ElementRef {
        ElementRef::new(self.id, node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// All node ids in document order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn tag(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.tag.as_str()).unwrap_or("")
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.node(id).and_then(|n| n.rect)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Whether `outer` is `inner` or one of its ancestors.
    pub fn contains(&self, outer: NodeId, inner: NodeId) -> bool {
        outer == inner || self.ancestors(inner).any(|a| a == outer)
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    pub fn own_text(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.text.as_str()).unwrap_or("")
    }

    /// Concatenated text of the element and its descendants, whitespace-collapsed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = vec![self.own_text(id)];
        for d in self.descendants(id) {
            parts.push(self.own_text(d));
        }
        parts
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn element_by_id(&self, html_id: &str) -> Option<NodeId> {
        self.node_ids().find(|n| self.attr(*n, "id") == Some(html_id))
    }

    /// Elements inside `scope` (excluding `scope`) matching `selector`.
    pub fn query_selector_all(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|n| parsed.matches(self, *n))
            .collect())
    }

    pub fn query_selector(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .find(|n| parsed.matches(self, *n)))
    }

    /// Whitespace-separated class tokens.
    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    /// Nodes hosting a nested document.
    pub fn frame_hosts(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|n| self.node(*n).is_some_and(|node| node.frame.is_some()))
            .collect()
    }

    pub(crate) fn take_frame(&mut self, id: NodeId) -> Option<FrameSnapshot> {
        self.node_mut(id).and_then(|n| n.frame.take())
    }

    pub(crate) fn set_frame(&mut self, id: NodeId, frame: FrameSnapshot) {
        if let Some(node) = self.node_mut(id) {
            node.frame = Some(frame);
        }
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let root = NodeSnapshot::element("body").with_child(
            NodeSnapshot::element("form")
                .with_attr("id", "signup")
                .with_child(NodeSnapshot::element("label").with_text("Email"))
                .with_child(NodeSnapshot::element("input").with_attr("name", "email")),
        );
        Document::from_snapshot(DocumentId(0), DocumentSnapshot::new("https://a.test/", root))
    }

    #[test]
    fn arena_preserves_document_order_and_parents() {
        let doc = sample();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.tag(NodeId(1)), "form");
        assert_eq!(doc.parent(NodeId(3)), Some(NodeId(1)));
        assert_eq!(doc.descendants(doc.root()), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(doc.contains(NodeId(1), NodeId(3)));
        assert!(!doc.contains(NodeId(3), NodeId(1)));
        assert_eq!(doc.depth(NodeId(3)), 2);
    }

    #[test]
    fn text_content_collapses_whitespace() {
        let doc = sample();
        assert_eq!(doc.text_content(NodeId(1)), "Email");
        assert_eq!(doc.element_by_id("signup"), Some(NodeId(1)));
    }
}
