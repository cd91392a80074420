//! Tree Renderer
//!
//! Turns [`View`]s into live nodes and keeps them in sync with the store.
//!
//! # Bindings
//!
//! Every reactive prop becomes an [`Effect`](crate::reactive::Effect) owned by
//! the node's [`BindingRecord`]:
//!
//! - a bound attribute, text or style property re-applies its value when the
//!   value changes (deep comparison against the last applied value);
//! - a dynamic child list re-runs its closure and patches the children;
//! - a deferred value shows the placeholder class until it settles, then the
//!   value or the error class.
//!
//! A static render evaluates every binding once and records no effects.
//!
//! DOM patching always runs untracked, so reads made while rendering a new
//! subtree never become dependencies of the binder that triggered it.
//!
//! # Render modes
//!
//! In fine-grained mode a dynamic child list is replaced wholesale on every
//! change. In reconciling mode it goes through the keyed diff in
//! [`reconcile`](super::reconcile); a diff that fails falls back to full
//! replacement for that container, and enough failures switch the whole
//! renderer to fine-grained mode.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::bindings::BindingRecord;
use super::reconcile::{self, RecyclePool};
use super::view::{ChildUpdate, Children, ChildrenFn, Handler, Prop, Props, View};
use crate::config::{EngineConfig, RenderMode, TapConfig};
use crate::dom::{Event, NodeId, NodeKind, TapTracker};
use crate::engine::Engine;
use crate::error::{DomError, RenderError};
use crate::reactive::{Deferred, Settled};

/// Class carried by every diagnostic node.
pub const DIAGNOSTIC_CLASS: &str = "trellis-diagnostic";

/// Where a bound value lands.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Attr(String),
    /// A text node's content.
    Text(NodeId),
    Style(String),
}

pub(crate) struct Renderer {
    mode: Cell<RenderMode>,
    failures: Cell<usize>,
    failure_limit: usize,
    /// Containers whose reconciliation failed; they are always replaced.
    fallback: RefCell<HashSet<NodeId>>,
    bindings: RefCell<HashMap<NodeId, BindingRecord>>,
    pool: RefCell<RecyclePool>,
    placeholder_classes: RefCell<Vec<String>>,
    /// Depth of nested static renders; bindings are evaluated once while set.
    static_depth: Cell<usize>,
    default_placeholder: String,
    error_class: String,
    tap: TapConfig,
}

impl Renderer {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        Self {
            mode: Cell::new(config.render_mode),
            failures: Cell::new(0),
            failure_limit: config.reconcile_failure_limit,
            fallback: RefCell::new(HashSet::new()),
            bindings: RefCell::new(HashMap::new()),
            pool: RefCell::new(RecyclePool::new(config.recycle_pool_limit)),
            placeholder_classes: RefCell::new(Vec::new()),
            static_depth: Cell::new(0),
            default_placeholder: config.placeholder_class.clone(),
            error_class: config.error_class.clone(),
            tap: config.tap.clone(),
        }
    }

    pub(crate) fn mode(&self) -> RenderMode {
        self.mode.get()
    }

    pub(crate) fn set_mode(&self, mode: RenderMode) {
        self.mode.set(mode);
        if mode == RenderMode::Reconciling {
            self.failures.set(0);
            self.fallback.borrow_mut().clear();
        }
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures.get()
    }

    /// Placeholder class of the mount being rendered, or the global one.
    pub(crate) fn placeholder_class(&self) -> String {
        self.placeholder_classes
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| self.default_placeholder.clone())
    }

    /// Run `f` with `class` as the placeholder class.
    pub(crate) fn with_placeholder<R>(&self, class: Option<&str>, f: impl FnOnce() -> R) -> R {
        let Some(class) = class else {
            return f();
        };
        self.placeholder_classes.borrow_mut().push(class.to_string());
        let result = f();
        self.placeholder_classes.borrow_mut().pop();
        result
    }

    /// Run `f` with bindings evaluated once instead of subscribed.
    pub(crate) fn with_static<R>(&self, f: impl FnOnce() -> R) -> R {
        self.static_depth.set(self.static_depth.get() + 1);
        let result = f();
        self.static_depth.set(self.static_depth.get() - 1);
        result
    }

    fn is_static(&self) -> bool {
        self.static_depth.get() > 0
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub(crate) fn render(&self, engine: &Engine, view: &View) -> Option<NodeId> {
        let node = match view {
            View::Empty => return None,
            View::Text(content) => engine.dom_mut().create_text(content),
            View::Fragment(children) => {
                let fragment = engine.dom_mut().create_fragment();
                for child in children {
                    if let Some(node) = self.render(engine, child) {
                        self.attach(engine, fragment, node);
                    }
                }
                fragment
            }
            View::Dynamic(f) => {
                let slot = engine.dom_mut().create_fragment();
                let mut record = BindingRecord::default();
                self.bind_children(engine, slot, f.clone(), &mut record);
                self.store_record(slot, record);
                slot
            }
            View::Deferred(deferred) => self.render_deferred_view(engine, deferred),
            View::Element(el) => {
                if engine.has_component(&el.tag) {
                    engine
                        .store()
                        .untracked(|| engine.instances().create(engine, &el.tag, &el.props))
                } else if is_component_name(&el.tag) {
                    self.diagnostic(engine, &RenderError::UnknownComponent(el.tag.clone()))
                } else {
                    self.render_element(engine, &el.tag, &el.props)
                }
            }
        };
        engine.dom_mut().set_key(node, reconcile::view_key(view));
        Some(node)
    }

    fn render_element(&self, engine: &Engine, tag: &str, props: &Props) -> NodeId {
        let node = match self.take_pooled(engine, tag) {
            Some(node) => node,
            None => engine.dom_mut().create_element(tag),
        };
        let mut record = BindingRecord {
            bound: reconcile::bound_props(props),
            ..BindingRecord::default()
        };
        self.apply_props(engine, node, props, &mut record);
        self.store_record(node, record);
        node
    }

    fn apply_props(&self, engine: &Engine, node: NodeId, props: &Props, record: &mut BindingRecord) {
        for (name, prop) in props.iter() {
            match (name, prop) {
                ("key", _) => {}
                ("children", Prop::Children(Children::Static(views))) => {
                    for view in views {
                        if let Some(child) = self.render(engine, view) {
                            self.attach(engine, node, child);
                        }
                    }
                }
                ("children", Prop::Children(Children::Dynamic(f))) => {
                    self.bind_children(engine, node, f.clone(), record);
                }
                ("text", prop) => self.apply_text(engine, node, prop, record),
                ("style", Prop::Style(entries)) => {
                    for (property, value) in entries {
                        self.apply_value(engine, node, Target::Style(property.clone()), value, record);
                    }
                }
                ("style", Prop::Static(Value::Object(entries))) => {
                    for (property, value) in entries {
                        apply_target(engine, node, &Target::Style(property.clone()), value);
                    }
                }
                (name, Prop::Handler(handler)) => match name.strip_prefix("on") {
                    Some(event) if !event.is_empty() => {
                        if event == "click" && record.taps.is_none() {
                            record.taps = Some(TapTracker::new(self.tap.clone()));
                        }
                        record.listeners.push((event.to_string(), handler.clone()));
                    }
                    _ => warn!(prop = name, "handler prop must be named on<event>; ignored"),
                },
                (name, Prop::Children(_) | Prop::Style(_)) => {
                    warn!(prop = name, "children or style value under another prop name; ignored");
                }
                (name, value) => {
                    if matches!(value, Prop::Static(_)) {
                        record.static_attrs.insert(name.to_string());
                    }
                    self.apply_value(engine, node, Target::Attr(name.to_string()), value, record);
                }
            }
        }
    }

    fn apply_text(&self, engine: &Engine, node: NodeId, prop: &Prop, record: &mut BindingRecord) {
        let initial = match prop {
            Prop::Static(value) => text_of(value),
            _ => String::new(),
        };
        let text = engine.dom_mut().create_text(&initial);
        self.attach(engine, node, text);
        // Child binders on this node patch before its record is stored.
        self.bindings.borrow_mut().entry(node).or_default().text_node = Some(text);
        if !matches!(prop, Prop::Static(_)) {
            self.apply_value(engine, node, Target::Text(text), prop, record);
        }
    }

    /// Apply a static, bound or deferred value to `target`.
    fn apply_value(&self, engine: &Engine, node: NodeId, target: Target, prop: &Prop, record: &mut BindingRecord) {
        match prop {
            Prop::Static(value) => apply_target(engine, node, &target, value),
            Prop::Bind(f) if self.is_static() => {
                let value = engine.store().untracked(|| f());
                apply_target(engine, node, &target, &value);
            }
            Prop::Bind(f) => {
                let f = f.clone();
                let weak = engine.downgrade();
                let last: RefCell<Option<Value>> = RefCell::new(None);
                let effect = engine.store().effect(move || {
                    let value = f();
                    if last.borrow().as_ref() == Some(&value) {
                        trace!(node = %node, "bound value unchanged");
                        return;
                    }
                    let Some(engine) = weak.upgrade() else {
                        return;
                    };
                    engine.store().untracked(|| apply_target(&engine, node, &target, &value));
                    *last.borrow_mut() = Some(value);
                });
                record.effects.push(effect);
            }
            Prop::Deferred(deferred) => self.bind_deferred(engine, node, target, deferred.clone()),
            Prop::Handler(_) | Prop::Style(_) | Prop::Children(_) => {}
        }
    }

    fn bind_deferred(&self, engine: &Engine, node: NodeId, target: Target, deferred: Deferred<Value>) {
        let class = self.placeholder_class();
        if let Some(outcome) = deferred.peek() {
            self.settle_value(engine, node, &target, &class, outcome);
            return;
        }
        log_dom(engine.dom_mut().add_class(node, &class));

        let weak = engine.downgrade();
        engine.tasks().spawn(async move {
            let outcome = deferred.settle().await;
            if let Some(engine) = weak.upgrade() {
                engine.renderer().settle_value(&engine, node, &target, &class, outcome);
            }
        });
    }

    fn settle_value(&self, engine: &Engine, node: NodeId, target: &Target, class: &str, outcome: Settled<Value>) {
        if !engine.dom().contains(node) {
            debug!(node = %node, "stale deferred value discarded");
            return;
        }
        log_dom(engine.dom_mut().remove_class(node, class));
        match outcome {
            Ok(value) => engine.store().untracked(|| apply_target(engine, node, target, &value)),
            Err(rejected) => {
                warn!(node = %node, error = %rejected, "deferred value rejected");
                let mut dom = engine.dom_mut();
                log_dom(dom.add_class(node, &self.error_class));
                log_dom(dom.set_attr(node, "data-error", &rejected.0));
            }
        }
    }

    fn render_deferred_view(&self, engine: &Engine, deferred: &Deferred<View>) -> NodeId {
        match deferred.peek() {
            Some(Ok(view)) => match self.render(engine, &view) {
                Some(node) => node,
                None => engine.dom_mut().create_fragment(),
            },
            Some(Err(rejected)) => self.diagnostic(engine, &RenderError::from(rejected)),
            None => {
                let slot = self.placeholder_slot(engine);
                let deferred = deferred.clone();
                let weak = engine.downgrade();
                engine.tasks().spawn(async move {
                    let outcome = deferred.settle().await;
                    let Some(engine) = weak.upgrade() else {
                        return;
                    };
                    engine.renderer().fill_slot(&engine, slot, |engine| match &outcome {
                        Ok(view) => engine.renderer().render(engine, view),
                        Err(rejected) => {
                            Some(engine.renderer().diagnostic(engine, &RenderError::from(rejected.clone())))
                        }
                    });
                });
                slot
            }
        }
    }

    /// A fragment holding a single placeholder element.
    pub(crate) fn placeholder_slot(&self, engine: &Engine) -> NodeId {
        let slot = engine.dom_mut().create_fragment();
        let placeholder = self.placeholder_node(engine);
        self.attach(engine, slot, placeholder);
        slot
    }

    pub(crate) fn placeholder_node(&self, engine: &Engine) -> NodeId {
        let mut dom = engine.dom_mut();
        let node = dom.create_element("span");
        log_dom(dom.add_class(node, &self.placeholder_class()));
        node
    }

    /// Replace the children of `slot` with whatever `content` renders.
    /// A slot released in the meantime is left alone.
    pub(crate) fn fill_slot(&self, engine: &Engine, slot: NodeId, content: impl FnOnce(&Engine) -> Option<NodeId>) {
        if !engine.dom().contains(slot) {
            debug!(node = %slot, "stale continuation discarded");
            return;
        }
        self.clear_children(engine, slot);
        let node = engine.store().untracked(|| content(engine));
        if let Some(node) = node {
            self.attach(engine, slot, node);
        }
    }

    /// An inline node describing a render failure.
    pub(crate) fn diagnostic(&self, engine: &Engine, err: &RenderError) -> NodeId {
        warn!(kind = err.kind(), error = %err, "rendering diagnostic node");
        let mut dom = engine.dom_mut();
        let node = dom.create_element("div");
        log_dom(dom.add_class(node, DIAGNOSTIC_CLASS));
        log_dom(dom.add_class(node, &self.error_class));
        log_dom(dom.set_attr(node, "data-error", err.kind()));
        let text = dom.create_text(&err.to_string());
        log_dom(dom.append_child(node, text));
        node
    }

    pub(crate) fn attach(&self, engine: &Engine, parent: NodeId, child: NodeId) {
        let result = engine.dom_mut().append_child(parent, child);
        if let Err(err) = result {
            warn!(error = %err, "attach refused");
            self.discard(engine, child);
        }
    }

    // ------------------------------------------------------------------
    // Child lists
    // ------------------------------------------------------------------

    fn bind_children(&self, engine: &Engine, container: NodeId, f: ChildrenFn, record: &mut BindingRecord) {
        if self.is_static() {
            if let ChildUpdate::Replace(views) = engine.store().untracked(|| f()) {
                self.replace_children(engine, container, &views);
            }
            return;
        }
        record.dynamic_children = true;
        let weak = engine.downgrade();
        let last: RefCell<Option<Vec<View>>> = RefCell::new(None);
        let effect = engine.store().effect(move || {
            let views = match f() {
                ChildUpdate::Ignore => {
                    trace!(node = %container, "child update ignored");
                    return;
                }
                ChildUpdate::Replace(views) => views,
            };
            if last.borrow().as_ref() == Some(&views) {
                trace!(node = %container, "child list unchanged");
                return;
            }
            let Some(engine) = weak.upgrade() else {
                return;
            };
            engine
                .store()
                .untracked(|| engine.renderer().patch_children(&engine, container, &views));
            *last.borrow_mut() = Some(views);
        });
        record.effects.push(effect);
    }

    /// Make the children of `container` match `views` using the active mode.
    pub(crate) fn patch_children(&self, engine: &Engine, container: NodeId, views: &[View]) {
        if !engine.dom().contains(container) {
            debug!(node = %container, "patch skipped: container released");
            return;
        }
        let replace = self.mode.get() == RenderMode::FineGrained || self.fallback.borrow().contains(&container);
        if replace {
            self.replace_children(engine, container, views);
            return;
        }
        if let Err(err) = reconcile::reconcile(self, engine, container, views) {
            warn!(node = %container, error = %err, "reconciliation failed; replacing children");
            self.note_failure(container);
            self.replace_children(engine, container, views);
        }
    }

    /// Discard every child of `container` and render `views` in their place.
    /// The node of a `text` prop stays where it is.
    pub(crate) fn replace_children(&self, engine: &Engine, container: NodeId, views: &[View]) {
        let pinned = self.pinned_text(engine, container);
        let children = engine.dom().children(container);
        for child in children {
            if pinned.map(|(text, _)| text) != Some(child) {
                self.discard(engine, child);
            }
        }
        let fresh: Vec<NodeId> = views.iter().filter_map(|view| self.render(engine, view)).collect();
        let next = with_pinned(fresh.clone(), pinned);
        let result = engine.dom_mut().set_children(container, &next);
        if let Err(err) = result {
            warn!(node = %container, error = %err, "replacing children failed");
            for node in fresh {
                self.discard(engine, node);
            }
        }
    }

    /// The `text` prop node of `container`, if still attached, and whether it
    /// precedes the other children.
    pub(crate) fn pinned_text(&self, engine: &Engine, container: NodeId) -> Option<(NodeId, bool)> {
        let text = self.bindings.borrow().get(&container).and_then(|r| r.text_node)?;
        let dom = engine.dom();
        if dom.parent(text) != Some(container) {
            return None;
        }
        let leading = dom.children(container).first() == Some(&text);
        Some((text, leading))
    }

    pub(crate) fn clear_children(&self, engine: &Engine, container: NodeId) {
        let children = engine.dom().children(container);
        for child in children {
            self.discard(engine, child);
        }
    }

    fn note_failure(&self, container: NodeId) {
        self.fallback.borrow_mut().insert(container);
        let failures = self.failures.get() + 1;
        self.failures.set(failures);
        if failures >= self.failure_limit && self.mode.get() == RenderMode::Reconciling {
            warn!(failures, "too many reconciliation failures; switching to fine-grained rendering");
            self.mode.set(RenderMode::FineGrained);
        }
    }

    // ------------------------------------------------------------------
    // Records, teardown, recycling
    // ------------------------------------------------------------------

    fn store_record(&self, node: NodeId, record: BindingRecord) {
        let mut bindings = self.bindings.borrow_mut();
        let early = bindings.remove(&node).and_then(|early| early.text_node);
        let record = BindingRecord {
            text_node: record.text_node.or(early),
            ..record
        };
        if !record.is_empty() {
            bindings.insert(node, record);
        }
    }

    pub(crate) fn has_bindings(&self, node: NodeId) -> bool {
        self.bindings.borrow().contains_key(&node)
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Whether `node` can take `props` in place: same bound props and a
    /// `text` node exactly when `props` has a `text` entry.
    pub(crate) fn same_shape(&self, node: NodeId, props: &Props) -> bool {
        let bindings = self.bindings.borrow();
        let record = bindings.get(&node);
        let has_text = record.is_some_and(|r| r.text_node.is_some());
        let bound = reconcile::bound_props(props);
        has_text == props.get("text").is_some() && record.map_or(bound.is_empty(), |r| r.bound == bound)
    }

    pub(crate) fn text_node(&self, node: NodeId) -> Option<NodeId> {
        self.bindings.borrow().get(&node).and_then(|r| r.text_node)
    }

    pub(crate) fn children_are_bound(&self, node: NodeId) -> bool {
        self.bindings.borrow().get(&node).is_some_and(|r| r.dynamic_children)
    }

    /// Attribute names last written from static props.
    pub(crate) fn static_attrs(&self, node: NodeId) -> Vec<String> {
        self.bindings
            .borrow()
            .get(&node)
            .map(|record| record.static_attrs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the static attribute set and listeners of `node` after an
    /// in-place update.
    pub(crate) fn refresh_record(&self, node: NodeId, static_attrs: Vec<String>, listeners: Vec<(String, Handler)>) {
        let mut bindings = self.bindings.borrow_mut();
        let record = bindings.entry(node).or_default();
        record.static_attrs = static_attrs.into_iter().collect();
        if !listeners.is_empty() || !record.listeners.is_empty() {
            let wants_taps = listeners.iter().any(|(event, _)| event == "click");
            record.listeners = listeners.into_iter().collect();
            if !wants_taps {
                record.taps = None;
            } else if record.taps.is_none() {
                record.taps = Some(TapTracker::new(self.tap.clone()));
            }
        }
        if record.is_empty() {
            bindings.remove(&node);
        }
    }

    /// Run unmount hooks and dispose every binding under `node`. The nodes
    /// themselves stay allocated.
    pub(crate) fn teardown(&self, engine: &Engine, node: NodeId) {
        let instance = engine.instances().begin_unmount(engine, node);
        let children = engine.dom().children(node);
        for child in children {
            self.teardown(engine, child);
        }
        let record = self.bindings.borrow_mut().remove(&node);
        if let Some(record) = record {
            record.dispose();
        }
        self.fallback.borrow_mut().remove(&node);
        if let Some(instance) = instance {
            engine.instances().finish_unmount(engine, &instance);
        }
    }

    /// Tear down `node` and return it to the recycle pool, or free it.
    pub(crate) fn discard(&self, engine: &Engine, node: NodeId) {
        if !engine.dom().contains(node) {
            return;
        }
        self.teardown(engine, node);
        let tag = engine.dom().tag(node).map(str::to_string);
        let poolable = tag.as_deref().is_some_and(|tag| self.pool.borrow().has_room(tag));
        match tag {
            Some(tag) if poolable => {
                let recycled = engine.dom_mut().recycle(node);
                match recycled {
                    Ok(fresh) => self.pool.borrow_mut().put(&tag, fresh),
                    Err(err) => warn!(node = %node, error = %err, "recycling failed"),
                }
            }
            _ => {
                engine.dom_mut().release(node);
            }
        }
    }

    fn take_pooled(&self, engine: &Engine, tag: &str) -> Option<NodeId> {
        let tag = tag.to_ascii_lowercase();
        loop {
            let candidate = self.pool.borrow_mut().take(&tag)?;
            let mut dom = engine.dom_mut();
            if dom.contains(candidate) {
                dom.note_reuse();
                trace!(node = %candidate, tag = %tag, "reusing pooled node");
                return Some(candidate);
            }
        }
    }

    pub(crate) fn pooled(&self, tag: &str) -> usize {
        self.pool.borrow().count(tag)
    }

    /// Dispose every binding and empty the pool.
    pub(crate) fn clear(&self, engine: &Engine) {
        let records: Vec<BindingRecord> = self.bindings.borrow_mut().drain().map(|(_, r)| r).collect();
        for record in records {
            record.dispose();
        }
        let pooled = self.pool.borrow_mut().drain();
        let mut dom = engine.dom_mut();
        for node in pooled {
            dom.release(node);
        }
        self.fallback.borrow_mut().clear();
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Handlers on `node` for `event`, plus the click synthesized by its tap
    /// tracker and the click handlers it should reach.
    pub(crate) fn listeners_for(&self, node: NodeId, event: &Event) -> (Vec<Handler>, Option<(Event, Vec<Handler>)>) {
        let mut bindings = self.bindings.borrow_mut();
        let Some(record) = bindings.get_mut(&node) else {
            return (Vec::new(), None);
        };
        let handlers = record.handlers(&event.name);
        let tap = record
            .taps
            .as_mut()
            .and_then(|taps| taps.observe(event))
            .map(|click| {
                let handlers = record.handlers("click");
                (click, handlers)
            });
        (handlers, tap)
    }
}

/// Write `value` to `target` on `node`.
pub(crate) fn apply_target(engine: &Engine, node: NodeId, target: &Target, value: &Value) {
    let mut dom = engine.dom_mut();
    if !dom.contains(node) {
        return;
    }
    let result = match target {
        Target::Attr(name) => match value {
            Value::Null | Value::Bool(false) => dom.remove_attr(node, name),
            Value::Bool(true) => dom.set_attr(node, name, ""),
            other => dom.set_attr(node, name, &text_of(other)),
        },
        Target::Text(text_node) => dom.set_text(*text_node, &text_of(value)),
        Target::Style(property) => match value {
            Value::Null | Value::Bool(false) => dom.remove_style(node, property),
            other => dom.set_style(node, property, &text_of(other)),
        },
    };
    log_dom(result);
}

/// `nodes` with the pinned text node put back at its end.
pub(crate) fn with_pinned(mut nodes: Vec<NodeId>, pinned: Option<(NodeId, bool)>) -> Vec<NodeId> {
    match pinned {
        Some((text, true)) => nodes.insert(0, text),
        Some((text, false)) => nodes.push(text),
        None => {}
    }
    nodes
}

/// Display form of a value: strings unquoted, null empty.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn is_component_name(tag: &str) -> bool {
    tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

pub(crate) fn is_text_node(engine: &Engine, node: NodeId) -> bool {
    engine.dom().kind(node) == Some(&NodeKind::Text)
}

fn log_dom(result: Result<(), DomError>) {
    if let Err(err) = result {
        debug!(error = %err, "node operation skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mount_list(engine: &Engine) -> NodeId {
        let store = engine.store().clone();
        let body = engine.dom().document();
        engine
            .mount(body, move |_| {
                let store = store.clone();
                View::el(
                    "ol",
                    Props::new().text("items:").children_fn(move || {
                        let items = store.read("items", json!([]));
                        items
                            .as_array()
                            .into_iter()
                            .flatten()
                            .map(|item| View::el("li", Props::new().key(item.to_string()).text(item.to_string())))
                            .collect::<Vec<_>>()
                            .into()
                    }),
                )
            })
            .unwrap();
        let list = engine.dom().query("ol");
        list.unwrap()
    }

    fn items(engine: &Engine, list: NodeId) -> Vec<NodeId> {
        let dom = engine.dom();
        dom.children(list)
            .into_iter()
            .filter(|node| dom.tag(*node) == Some("li"))
            .collect()
    }

    #[test]
    fn failed_container_falls_back_to_full_replacement() {
        let engine = Engine::with_state(EngineConfig::default(), json!({"items": [1, 2]})).unwrap();
        let list = mount_list(&engine);
        let renderer = engine.renderer();

        renderer.note_failure(list);
        assert_eq!(renderer.failures(), 1);
        assert_eq!(renderer.mode(), RenderMode::Reconciling);

        let before = items(&engine, list);
        engine.store().write("items", json!([1, 2, 3])).unwrap();
        let after = items(&engine, list);
        assert_eq!(after.len(), 3);
        assert!(before.iter().all(|node| !after.contains(node)));
        assert_eq!(engine.dom().text_content(list), "items:123");
    }

    #[test]
    fn repeated_failures_switch_to_fine_grained() {
        let config = EngineConfig {
            reconcile_failure_limit: 2,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        let renderer = engine.renderer();
        let (a, b) = {
            let mut dom = engine.dom_mut();
            (dom.create_element("ul"), dom.create_element("ul"))
        };

        renderer.note_failure(a);
        assert_eq!(renderer.mode(), RenderMode::Reconciling);
        renderer.note_failure(b);
        assert_eq!(renderer.mode(), RenderMode::FineGrained);

        renderer.set_mode(RenderMode::Reconciling);
        assert_eq!(renderer.failures(), 0);
        assert!(renderer.fallback.borrow().is_empty());
    }

    #[test]
    fn text_prop_node_survives_child_patches() {
        let engine = Engine::with_state(EngineConfig::default(), json!({"items": [1]})).unwrap();
        let list = mount_list(&engine);
        let text = renderer_text(&engine, list);

        engine.store().write("items", json!([2, 1])).unwrap();
        assert_eq!(renderer_text(&engine, list), text);
        assert_eq!(engine.dom().text_content(list), "items:21");

        engine.set_render_mode(RenderMode::FineGrained);
        engine.store().write("items", json!([3])).unwrap();
        assert_eq!(renderer_text(&engine, list), text);
        assert_eq!(engine.dom().children(list).first(), Some(&text));
        assert_eq!(engine.dom().text_content(list), "items:3");
    }

    fn renderer_text(engine: &Engine, node: NodeId) -> NodeId {
        let text = engine.renderer().text_node(node);
        text.unwrap()
    }

    #[test]
    fn bound_props_decide_in_place_updates() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let node = engine
            .render(&View::el("a", Props::new().attr("href", "/").bind("title", || json!("t"))))
            .unwrap();
        let renderer = engine.renderer();

        assert!(renderer.same_shape(node, &Props::new().attr("href", "/x").bind("title", || json!("u"))));
        assert!(!renderer.same_shape(node, &Props::new().bind("href", || json!("/")).bind("title", || json!("t"))));
        assert!(!renderer.same_shape(node, &Props::new().attr("href", "/").attr("title", "t")));
        assert!(!renderer.same_shape(node, &Props::new().bind("title", || json!("t")).text("go")));
    }

    #[test]
    fn static_render_records_no_effects() {
        let engine = Engine::with_state(EngineConfig::default(), json!({"n": 1})).unwrap();
        let store = engine.store().clone();
        let node = engine
            .render_static(&View::el("span", Props::new().text_bind(move || store.read("n", 0))))
            .unwrap();

        assert_eq!(engine.dom().text_content(node), "1");
        assert_eq!(engine.store().dependents("n"), 0);
        engine.store().write("n", 2).unwrap();
        assert_eq!(engine.dom().text_content(node), "1");
    }

    #[test]
    fn text_of_formats_values() {
        assert_eq!(text_of(&json!("plain")), "plain");
        assert_eq!(text_of(&Value::Null), "");
        assert_eq!(text_of(&json!(2.5)), "2.5");
        assert_eq!(text_of(&json!(true)), "true");
    }
}
