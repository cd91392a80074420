//! Keyed Reconciliation
//!
//! Patches the children of a container to match a new list of views while
//! keeping as many existing nodes as possible.
//!
//! # Algorithm
//!
//! 1. Every existing child is indexed by the key the renderer stored on it.
//!    Keys come from an explicit `key` prop; otherwise from a hash of the tag
//!    and the static `id`, `name`, `type` and `class` props. Text views are
//!    keyed by their content. Children without a key never match.
//!
//! 2. Each new view takes the first unclaimed child with the same key. If the
//!    child is compatible (same tag and the same set of bound props, or an
//!    instance of the same component) it is kept and its static props are
//!    refreshed in place; component instances go through `update_instance`.
//!
//! 3. Views without a match are rendered fresh, reusing a pooled node of the
//!    same tag when one is available.
//!
//! 4. The container's child list is replaced in one step (which also refuses
//!    circular attachment), and unclaimed children are torn down into the
//!    recycle pool. The text node of the container's own `text` prop is not
//!    part of the list and keeps its position.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::trace;

use super::renderer::{apply_target, is_text_node, text_of, with_pinned, Renderer, Target};
use super::view::{Children, Element, Prop, Props, View};
use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::{DomError, RenderError};

/// Props that contribute to the implicit key of an unkeyed element.
const IDENTITY_PROPS: [&str; 4] = ["id", "name", "type", "class"];

/// Reconciliation key of a view, if it has one.
pub(crate) fn view_key(view: &View) -> Option<String> {
    match view {
        View::Text(content) => Some(format!("t:{content}")),
        View::Element(el) => Some(element_key(el)),
        _ => None,
    }
}

fn element_key(el: &Element) -> String {
    if let Some(key) = el.props.static_value("key") {
        return format!("k:{}", text_of(key));
    }
    let mut hasher = DefaultHasher::new();
    el.tag.to_ascii_lowercase().hash(&mut hasher);
    for name in IDENTITY_PROPS {
        if let Some(value) = el.props.static_value(name) {
            name.hash(&mut hasher);
            text_of(value).hash(&mut hasher);
        }
    }
    format!("h:{}:{:016x}", el.tag.to_ascii_lowercase(), hasher.finish())
}

/// Props an element keeps live through effects or deferred values.
pub(crate) fn bound_props(props: &Props) -> IndexSet<String> {
    let mut names = IndexSet::new();
    for (name, prop) in props.iter() {
        match (name, prop) {
            ("key", _) | (_, Prop::Handler(_) | Prop::Static(_)) => {}
            ("children", Prop::Children(Children::Dynamic(_))) => {
                names.insert(name.to_string());
            }
            ("style", Prop::Style(entries)) => {
                for (property, value) in entries {
                    if !matches!(value, Prop::Static(_)) {
                        names.insert(format!("style:{property}"));
                    }
                }
            }
            (_, Prop::Bind(_) | Prop::Deferred(_)) => {
                names.insert(name.to_string());
            }
            _ => {}
        }
    }
    names
}

/// Patch the children of `container` to match `views`.
pub(crate) fn reconcile(
    renderer: &Renderer,
    engine: &Engine,
    container: NodeId,
    views: &[View],
) -> Result<(), RenderError> {
    let previous = engine.dom().children(container);
    let pinned = renderer.pinned_text(engine, container);
    let mut unclaimed: IndexMap<String, VecDeque<NodeId>> = IndexMap::new();
    let mut unkeyed = Vec::new();
    {
        let dom = engine.dom();
        for node in previous.iter().filter(|node| pinned.map(|(text, _)| text) != Some(**node)) {
            match dom.key(*node) {
                Some(key) => unclaimed.entry(key.to_string()).or_default().push_back(*node),
                None => unkeyed.push(*node),
            }
        }
    }

    let mut next = Vec::with_capacity(views.len());
    let mut fresh = Vec::new();
    let mut incompatible = Vec::new();
    for view in views {
        let claimed = view_key(view).and_then(|key| unclaimed.get_mut(&key).and_then(VecDeque::pop_front));
        if let Some(node) = claimed {
            if compatible(engine, node, view) {
                update_in_place(renderer, engine, node, view)?;
                next.push(node);
                continue;
            }
            incompatible.push(node);
        }
        if let Some(node) = renderer.render(engine, view) {
            fresh.push(node);
            next.push(node);
        }
    }

    let kept = next.len() - fresh.len();
    let next = with_pinned(next, pinned);
    let attached = engine.dom_mut().set_children(container, &next);
    if let Err(err) = attached {
        for node in fresh {
            renderer.discard(engine, node);
        }
        return Err(err.into());
    }

    let leftovers: Vec<NodeId> = unclaimed
        .into_values()
        .flatten()
        .chain(incompatible)
        .chain(unkeyed)
        .collect();
    trace!(
        node = %container,
        kept,
        created = fresh.len(),
        removed = leftovers.len(),
        "children reconciled"
    );
    for node in leftovers {
        renderer.discard(engine, node);
    }
    Ok(())
}

fn compatible(engine: &Engine, node: NodeId, view: &View) -> bool {
    match view {
        View::Text(_) => is_text_node(engine, node),
        View::Element(el) if engine.has_component(&el.tag) => engine
            .instances()
            .instance_at(node)
            .is_some_and(|id| id.name() == el.tag),
        View::Element(el) => {
            engine.instances().instance_at(node).is_none()
                && engine.dom().tag(node).is_some_and(|tag| tag.eq_ignore_ascii_case(&el.tag))
                && engine.renderer().same_shape(node, &el.props)
        }
        _ => false,
    }
}

/// Bring a kept node up to date with `view`'s static props.
fn update_in_place(renderer: &Renderer, engine: &Engine, node: NodeId, view: &View) -> Result<(), RenderError> {
    let View::Element(el) = view else {
        // Text nodes are keyed by content, so a match is already current.
        return Ok(());
    };
    if engine.has_component(&el.tag) {
        engine.instances().update(engine, node, el.props.clone());
        return Ok(());
    }

    let previous_static = renderer.static_attrs(node);
    let mut next_static = IndexSet::new();
    let mut listeners = Vec::new();
    for (name, prop) in el.props.iter() {
        match (name, prop) {
            ("key", _) => {}
            ("children", Prop::Children(Children::Static(views))) => {
                if !renderer.children_are_bound(node) {
                    reconcile(renderer, engine, node, views)?;
                }
            }
            ("text", Prop::Static(value)) => {
                match renderer.text_node(node) {
                    Some(text_node) => apply_target(engine, node, &Target::Text(text_node), value),
                    None => return Err(DomError::NotAContainer(node).into()),
                }
            }
            ("style", Prop::Style(entries)) => {
                for (property, value) in entries {
                    if let Prop::Static(value) = value {
                        apply_target(engine, node, &Target::Style(property.clone()), value);
                    }
                }
            }
            ("style", Prop::Static(Value::Object(entries))) => {
                for (property, value) in entries {
                    apply_target(engine, node, &Target::Style(property.clone()), value);
                }
            }
            (name, Prop::Handler(handler)) => {
                if let Some(event) = name.strip_prefix("on").filter(|e| !e.is_empty()) {
                    listeners.push((event.to_string(), handler.clone()));
                }
            }
            (name, Prop::Static(value)) => {
                apply_target(engine, node, &Target::Attr(name.to_string()), value);
                next_static.insert(name.to_string());
            }
            _ => {}
        }
    }
    for stale in previous_static.iter().filter(|name| !next_static.contains(*name)) {
        apply_target(engine, node, &Target::Attr(stale.clone()), &Value::Null);
    }
    renderer.refresh_record(node, next_static.into_iter().collect(), listeners);
    Ok(())
}

/// Detached nodes kept per tag for reuse.
#[derive(Debug)]
pub(crate) struct RecyclePool {
    limit: usize,
    free: HashMap<String, Vec<NodeId>>,
}

impl RecyclePool {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            free: HashMap::new(),
        }
    }

    pub(crate) fn has_room(&self, tag: &str) -> bool {
        self.count(tag) < self.limit
    }

    pub(crate) fn count(&self, tag: &str) -> usize {
        self.free.get(tag).map_or(0, Vec::len)
    }

    pub(crate) fn put(&mut self, tag: &str, node: NodeId) {
        if self.has_room(tag) {
            self.free.entry(tag.to_string()).or_default().push(node);
        }
    }

    pub(crate) fn take(&mut self, tag: &str) -> Option<NodeId> {
        self.free.get_mut(tag).and_then(Vec::pop)
    }

    pub(crate) fn drain(&mut self) -> Vec<NodeId> {
        self.free.drain().flat_map(|(_, nodes)| nodes).collect()
    }
}
