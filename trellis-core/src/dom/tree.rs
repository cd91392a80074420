//! Node Arena
//!
//! [`Dom`] stores every live node in a slab indexed by [`NodeId`]. Freed slots
//! go on a free list and are handed out again with a bumped generation, so a
//! handle outlives its node safely: every accessor checks the generation and
//! treats a mismatch as "no such node".
//!
//! # Structure
//!
//! Node 0 is the document root (`<body>`). Nodes created by the renderer start
//! detached and are attached with [`Dom::append_child`] or
//! [`Dom::set_children`], both of which refuse to make a node its own ancestor.
//! A node is *connected* when its ancestor chain reaches the document.

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::node::{Node, NodeId, NodeKind};
use crate::error::DomError;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    /// Nodes currently alive.
    pub live: usize,
    /// Nodes created from scratch.
    pub created: usize,
    /// Nodes handed out again after recycling.
    pub reused: usize,
}

#[derive(Debug)]
pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<u32>,
    document: NodeId,
    stats: DomStats,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let mut dom = Self {
            slots: Vec::new(),
            free: Vec::new(),
            document: NodeId::new(0, 0),
            stats: DomStats::default(),
        };
        dom.document = dom.insert(Node::element("body"));
        dom
    }

    /// The document root.
    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn stats(&self) -> DomStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    fn insert(&mut self, node: Node) -> NodeId {
        self.stats.created += 1;
        self.stats.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.insert(Node::element(tag))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.insert(Node::text(content))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.insert(Node::new(NodeKind::Fragment))
    }

    /// Whether `id` still names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    fn live(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.node_mut(id).ok_or(DomError::StaleNode(id))
    }

    /// Free `id` and its whole subtree. Returns the number of nodes freed.
    pub fn release(&mut self, id: NodeId) -> usize {
        if !self.contains(id) || id == self.document {
            return 0;
        }
        self.detach(id);
        self.release_subtree(id)
    }

    fn release_subtree(&mut self, id: NodeId) -> usize {
        let slot = &mut self.slots[id.index() as usize];
        let Some(node) = slot.node.take() else {
            return 0;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.stats.live -= 1;
        1 + node
            .children
            .iter()
            .map(|child| self.release_subtree(*child))
            .sum::<usize>()
    }

    /// Detach `id`, free its children and clear it for reuse under a new
    /// handle. The old handle becomes stale.
    pub fn recycle(&mut self, id: NodeId) -> Result<NodeId, DomError> {
        if id == self.document {
            return Err(DomError::NotAContainer(id));
        }
        self.detach(id);
        let children = self.live(id)?.children.clone();
        for child in children {
            self.release_subtree(child);
        }
        let slot = &mut self.slots[id.index() as usize];
        slot.generation = slot.generation.wrapping_add(1);
        let fresh = NodeId::new(id.index(), slot.generation);
        if let Some(node) = slot.node.as_mut() {
            node.reset();
        }
        trace!(old = %id, new = %fresh, "node recycled");
        Ok(fresh)
    }

    /// Record that a recycled node was handed out again.
    pub(crate) fn note_reuse(&mut self) {
        self.stats.reused += 1;
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|node| node.kind.tag())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|node| node.children.to_vec()).unwrap_or_default()
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_ancestor_or_self(self.document, id)
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let Some(parent_node) = self.node(parent) else {
            return Err(DomError::StaleNode(parent));
        };
        if !parent_node.kind.is_container() {
            return Err(DomError::NotAContainer(parent));
        }
        if !self.contains(child) {
            return Err(DomError::StaleNode(child));
        }
        if child == self.document || self.is_ancestor_or_self(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        Ok(())
    }

    /// Remove `id` from its parent's child list.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_attach(parent, child)?;
        self.detach(child);
        let parent_node = self.live(parent)?;
        let position = reference
            .and_then(|r| parent_node.children.iter().position(|c| *c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);
        self.live(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `new` where `old` is. `old` ends up detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.parent(old) else {
            return Ok(());
        };
        if old == new {
            return Ok(());
        }
        self.insert_before(parent, new, Some(old))?;
        self.detach(old);
        Ok(())
    }

    /// Replace the child list of `parent` in one step.
    ///
    /// Previous children missing from `children` are detached (not freed).
    /// Every entry is validated before anything changes.
    pub fn set_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        for child in children {
            self.check_attach(parent, *child)?;
        }
        let incoming: IndexSet<NodeId> = children.iter().copied().collect();
        for old in self.children(parent) {
            if !incoming.contains(&old) {
                if let Some(node) = self.node_mut(old) {
                    node.parent = None;
                }
            }
        }
        for child in &incoming {
            if self.parent(*child) != Some(parent) {
                self.detach(*child);
            }
            self.live(*child)?.parent = Some(parent);
        }
        self.live(parent)?.children = incoming.into_iter().collect::<SmallVec<_>>();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes, classes, style, text
    // ------------------------------------------------------------------

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        let node = self.node(id)?;
        if name == "class" {
            return (!node.classes.is_empty()).then(|| join(&node.classes, " "));
        }
        node.attrs.get(name).cloned()
    }

    /// Set an attribute. `class` replaces the whole class list.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let node = self.live(id)?;
        if name == "class" {
            node.classes = value.split_whitespace().map(str::to_string).collect();
        } else {
            node.attrs.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let node = self.live(id)?;
        if name == "class" {
            node.classes.clear();
        } else {
            node.attrs.shift_remove(name);
        }
        Ok(())
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        self.live(id)?.classes.insert(class.to_string());
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        self.live(id)?.classes.shift_remove(class);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.node(id).is_some_and(|node| node.classes.contains(class))
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        self.node(id).and_then(|node| node.style.get(property).cloned())
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.live(id)?.style.insert(property.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) -> Result<(), DomError> {
        self.live(id)?.style.shift_remove(property);
        Ok(())
    }

    /// Content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id)
            .filter(|node| node.kind == NodeKind::Text)
            .map(|node| node.text.as_str())
    }

    pub fn set_text(&mut self, id: NodeId, content: &str) -> Result<(), DomError> {
        let node = self.live(id)?;
        if node.kind != NodeKind::Text {
            return Err(DomError::NotAContainer(id));
        }
        if node.text != content {
            node.text = content.to_string();
        }
        Ok(())
    }

    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|node| node.key.as_deref())
    }

    pub(crate) fn set_key(&mut self, id: NodeId, key: Option<String>) {
        if let Some(node) = self.node_mut(id) {
            node.key = key;
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// First connected node matching `#id` or a tag name, in document order.
    pub fn query(&self, selector: &str) -> Option<NodeId> {
        self.query_all(selector).into_iter().next()
    }

    pub fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_matches(self.document, selector, &mut found);
        found
    }

    fn collect_matches(&self, id: NodeId, selector: &str, found: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        let matched = match selector.strip_prefix('#') {
            Some(wanted) => node.attrs.get("id").is_some_and(|v| v == wanted),
            None => node.kind.tag().is_some_and(|t| t.eq_ignore_ascii_case(selector)),
        };
        if matched {
            found.push(id);
        }
        for child in &node.children {
            self.collect_matches(*child, selector, found);
        }
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out);
        out
    }

    fn write_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.kind {
            NodeKind::Text => out.push_str(&node.text),
            _ => {
                for child in &node.children {
                    self.write_text(*child, out);
                }
            }
        }
    }

    /// Serialize the subtree at `id` as HTML. Fragments contribute only
    /// their children.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let tag = match &node.kind {
            NodeKind::Text => {
                escape_into(&node.text, false, out);
                return;
            }
            NodeKind::Fragment => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
                return;
            }
            NodeKind::Element(tag) => tag,
        };

        out.push('<');
        out.push_str(tag);
        for (name, value) in &node.attrs {
            write_attr(name, value, out);
        }
        if !node.classes.is_empty() {
            write_attr("class", &join(&node.classes, " "), out);
        }
        if !node.style.is_empty() {
            let style = node
                .style
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            write_attr("style", &style, out);
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        for child in &node.children {
            self.write_html(*child, out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn join(set: &IndexSet<String>, separator: &str) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(separator)
}

fn write_attr(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    if !value.is_empty() {
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
