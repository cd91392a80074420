//! Live Nodes
//!
//! This module defines the node types that live in the engine's node tree.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// Handle to a node in a [`Dom`](super::Dom).
///
/// A handle names a slot *and* the incarnation of the node living in it.
/// Releasing or recycling a node bumps the slot's generation, after which the
/// old handle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// The kind of node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a lowercase tag name.
    Element(String),

    /// A text leaf. Text nodes never have children.
    Text,

    /// A transparent container. Fragments hold the children of a reactive
    /// slot or a component instance and are invisible in serialized output.
    Fragment,
}

impl NodeKind {
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A node in the live tree.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) attrs: IndexMap<String, String>,
    pub(crate) classes: IndexSet<String>,
    pub(crate) style: IndexMap<String, String>,
    /// Content of a text node.
    pub(crate) text: String,
    /// Reconciliation key assigned by the renderer.
    pub(crate) key: Option<String>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: SmallVec::new(),
            attrs: IndexMap::new(),
            classes: IndexSet::new(),
            style: IndexMap::new(),
            text: String::new(),
            key: None,
        }
    }

    pub(crate) fn element(tag: &str) -> Self {
        Self::new(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    pub(crate) fn text(content: &str) -> Self {
        let mut node = Self::new(NodeKind::Text);
        node.text = content.to_string();
        node
    }

    /// Strip everything but the tag so the node can be reused.
    pub(crate) fn reset(&mut self) {
        self.parent = None;
        self.children.clear();
        self.attrs.clear();
        self.classes.clear();
        self.style.clear();
        self.text.clear();
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_tags_are_lowercased() {
        let node = Node::element("DIV");
        assert_eq!(node.kind.tag(), Some("div"));
        assert!(node.kind.is_container());
    }

    #[test]
    fn reset_keeps_kind_only() {
        let mut node = Node::element("li");
        node.attrs.insert("id".into(), "a".into());
        node.classes.insert("done".into());
        node.key = Some("k:a".into());
        node.reset();
        assert_eq!(node.kind, NodeKind::Element("li".into()));
        assert!(node.attrs.is_empty() && node.classes.is_empty() && node.key.is_none());
    }

    #[test]
    fn display_includes_generation() {
        assert_eq!(NodeId::new(3, 2).to_string(), "n3v2");
    }
}
