//! Component Instances
//!
//! The instance manager turns a component element into live nodes and keeps
//! track of what it created.
//!
//! # Creation
//!
//! 1. Props that are still pending render a placeholder slot. Once every
//!    pending prop settles, creation runs again with the values and the
//!    result replaces the placeholder. A rejection leaves a diagnostic node.
//!
//! 2. Otherwise the factory is called and its [`ComponentOutput`] decides the
//!    instance's shape. Every instance renders into its own fragment
//!    container, which is the node the instance is known by.
//!
//! 3. A stack of component names in progress guards against a component
//!    rendering itself and against runaway nesting. Continuations that finish
//!    a creation later restore the stack they were spawned under.
//!
//! # Teardown
//!
//! `on_unmount` runs first, then the renderer disposes the subtree's bindings,
//! then every local-state path the instance created is deleted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use futures_util::future::join_all;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, warn};

use super::factory::{ApiMethod, Completion, ComponentOutput, Factory, Lifecycle, RenderFn};
use crate::dom::NodeId;
use crate::engine::{Context, Engine};
use crate::error::{panic_message, RenderError};
use crate::reactive::{run_guarded, Deferred, Effect};
use crate::render::{Prop, Props};

/// Root of the local-state namespace.
pub const LOCAL_ROOT: &str = "##local";

/// Identifies a live instance as `name#ordinal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    name: String,
    ordinal: u64,
}

impl InstanceId {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Store path of the instance's local state.
    pub fn local_path(&self, key: &str) -> String {
        format!("{LOCAL_ROOT}.{self}.{key}")
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.ordinal)
    }
}

/// What [`Engine::update_instance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Props changed; hooks ran and content was refreshed.
    Updated,
    /// Props deep-equal the current ones.
    Skipped,
    /// Some props are pending; the update runs once they settle.
    Deferred,
    /// A prop was rejected; the instance keeps its previous props.
    Rejected,
    /// The node is not an instance container.
    NotAnInstance,
}

#[derive(Clone)]
enum Shape {
    Nodes,
    Lifecycle(Rc<Lifecycle>),
    Render {
        effect: Effect,
        props: Rc<RefCell<Props>>,
    },
    /// Waiting for a deferred component.
    Pending,
}

struct Instance {
    factory: Factory,
    props: Props,
    shape: Shape,
}

pub(crate) struct InstanceManager {
    max_depth: usize,
    ordinals: RefCell<HashMap<String, u64>>,
    live: RefCell<IndexMap<InstanceId, Instance>>,
    roots: RefCell<HashMap<NodeId, InstanceId>>,
    apis: RefCell<IndexMap<String, (InstanceId, IndexMap<String, ApiMethod>)>>,
    /// Names of the components currently being created, outermost first.
    stack: RefCell<Vec<String>>,
    locals: RefCell<HashMap<InstanceId, IndexSet<String>>>,
}

impl InstanceManager {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ordinals: RefCell::new(HashMap::new()),
            live: RefCell::new(IndexMap::new()),
            roots: RefCell::new(HashMap::new()),
            apis: RefCell::new(IndexMap::new()),
            stack: RefCell::new(Vec::new()),
            locals: RefCell::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create an instance of `name`. Failures render a diagnostic node.
    pub(crate) fn create(&self, engine: &Engine, name: &str, props: &Props) -> NodeId {
        let renderer = engine.renderer();
        let Some(factory) = engine.component(name) else {
            return renderer.diagnostic(engine, &RenderError::UnknownComponent(name.to_string()));
        };
        let _frame = match self.enter(name) {
            Ok(frame) => frame,
            Err(err) => return renderer.diagnostic(engine, &err),
        };

        let pending = props.pending();
        if !pending.is_empty() {
            return self.create_when_settled(engine, name, props, pending);
        }
        match props.settled() {
            Ok(props) => self.instantiate(engine, name, factory, props),
            Err(rejected) => renderer.diagnostic(engine, &RenderError::from(rejected)),
        }
    }

    fn enter(&self, name: &str) -> Result<StackFrame<'_>, RenderError> {
        let mut stack = self.stack.borrow_mut();
        if stack.iter().any(|open| open == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(RenderError::RecursiveComponent {
                name: name.to_string(),
                chain: chain.join(" > "),
            });
        }
        if stack.len() >= self.max_depth {
            return Err(RenderError::DepthExceeded {
                name: name.to_string(),
                limit: self.max_depth,
            });
        }
        stack.push(name.to_string());
        Ok(StackFrame { manager: self })
    }

    /// Run `f` with `chain` as the stack of components in progress.
    fn with_chain<R>(&self, chain: Vec<String>, f: impl FnOnce() -> R) -> R {
        let saved = std::mem::replace(&mut *self.stack.borrow_mut(), chain);
        let result = f();
        *self.stack.borrow_mut() = saved;
        result
    }

    fn create_when_settled(
        &self,
        engine: &Engine,
        name: &str,
        props: &Props,
        pending: Vec<(String, Deferred<Value>)>,
    ) -> NodeId {
        let renderer = engine.renderer();
        let slot = renderer.placeholder_slot(engine);
        debug!(component = name, pending = pending.len(), "waiting for props");

        let weak = engine.downgrade();
        let name = name.to_string();
        let mut resolved = props.clone();
        // The component re-enters itself when the props settle.
        let mut chain = self.stack.borrow().clone();
        chain.pop();
        engine.tasks().spawn(async move {
            let outcomes = join_all(pending.iter().map(|(_, value)| value.settle())).await;
            let Some(engine) = weak.upgrade() else {
                return;
            };
            let mut rejection = None;
            for ((key, _), outcome) in pending.iter().zip(outcomes) {
                match outcome {
                    Ok(value) => resolved.insert(key.clone(), Prop::Static(value)),
                    Err(rejected) => {
                        rejection = Some(rejected);
                        break;
                    }
                }
            }
            engine.renderer().fill_slot(&engine, slot, |engine| match rejection {
                Some(rejected) => Some(engine.renderer().diagnostic(engine, &RenderError::from(rejected))),
                None => Some(
                    engine
                        .instances()
                        .with_chain(chain, || engine.instances().create(engine, &name, &resolved)),
                ),
            });
        });
        slot
    }

    fn next_id(&self, name: &str) -> InstanceId {
        let mut ordinals = self.ordinals.borrow_mut();
        let ordinal = ordinals.entry(name.to_string()).or_insert(0);
        *ordinal += 1;
        InstanceId {
            name: name.to_string(),
            ordinal: *ordinal,
        }
    }

    fn instantiate(&self, engine: &Engine, name: &str, factory: Factory, props: Props) -> NodeId {
        let id = self.next_id(name);
        let root = engine.dom_mut().create_fragment();
        self.live.borrow_mut().insert(
            id.clone(),
            Instance {
                factory: factory.clone(),
                props: props.clone(),
                shape: Shape::Pending,
            },
        );
        self.roots.borrow_mut().insert(root, id.clone());
        debug!(component = name, instance = %id, "instance created");

        let context = Context::new(engine, Some(id.clone()));
        match call_factory(name, &factory, &props, &context) {
            Ok(output) => self.materialize(engine, &id, root, &props, output),
            Err(err) => {
                let diagnostic = engine.renderer().diagnostic(engine, &err);
                engine.renderer().attach(engine, root, diagnostic);
            }
        }
        root
    }

    /// Render `output` into the instance container `root`.
    fn materialize(&self, engine: &Engine, id: &InstanceId, root: NodeId, props: &Props, output: ComponentOutput) {
        let renderer = engine.renderer();
        match output {
            ComponentOutput::Nodes(views) => {
                self.set_shape(id, Shape::Nodes);
                for view in &views {
                    if let Some(child) = renderer.render(engine, view) {
                        renderer.attach(engine, root, child);
                    }
                }
            }
            ComponentOutput::Lifecycle(lifecycle) => {
                let lifecycle = Rc::new(lifecycle);
                if let Some(render) = &lifecycle.render {
                    if let Some(view) = run_guarded("render", || render(props)) {
                        if let Some(child) = renderer.render(engine, &view) {
                            renderer.attach(engine, root, child);
                        }
                    }
                }
                if !lifecycle.api.is_empty() {
                    self.apis
                        .borrow_mut()
                        .insert(id.name.clone(), (id.clone(), lifecycle.api.clone()));
                }
                self.set_shape(id, Shape::Lifecycle(lifecycle.clone()));
                if let Some(on_mount) = lifecycle.on_mount.clone() {
                    self.schedule_mount(engine, id, on_mount);
                }
            }
            ComponentOutput::Render(render) => {
                let current = Rc::new(RefCell::new(props.clone()));
                let effect = bind_render(engine, root, render, current.clone());
                self.set_shape(
                    id,
                    Shape::Render {
                        effect,
                        props: current,
                    },
                );
            }
            ComponentOutput::Pending(future) => {
                self.set_shape(id, Shape::Pending);
                let placeholder = renderer.placeholder_node(engine);
                renderer.attach(engine, root, placeholder);

                let weak = engine.downgrade();
                let id = id.clone();
                let props = props.clone();
                let chain = self.stack.borrow().clone();
                engine.tasks().spawn(async move {
                    let outcome = future.await;
                    let Some(engine) = weak.upgrade() else {
                        return;
                    };
                    if !engine.instances().is_live(&id) {
                        debug!(instance = %id, "stale component resolution discarded");
                        return;
                    }
                    match outcome {
                        Ok(output) => {
                            engine.renderer().clear_children(&engine, root);
                            let instances = engine.instances();
                            instances.with_chain(chain, || {
                                engine
                                    .store()
                                    .untracked(|| instances.materialize(&engine, &id, root, &props, output))
                            });
                        }
                        Err(rejected) => {
                            engine.renderer().fill_slot(&engine, root, |engine| {
                                Some(engine.renderer().diagnostic(engine, &RenderError::from(rejected)))
                            });
                        }
                    }
                });
            }
        }
    }

    fn schedule_mount(&self, engine: &Engine, id: &InstanceId, on_mount: super::factory::Hook) {
        let weak = engine.downgrade();
        let id = id.clone();
        engine.tasks().spawn(async move {
            let completion = {
                let Some(engine) = weak.upgrade() else {
                    return;
                };
                if !engine.instances().is_live(&id) {
                    debug!(instance = %id, "instance gone before mount");
                    return;
                }
                debug!(instance = %id, "mounting");
                let context = Context::new(&engine, Some(id.clone()));
                run_guarded("on_mount", || on_mount(&context))
            };
            if let Some(Completion::Pending(rest)) = completion {
                rest.await;
            }
        });
    }

    fn set_shape(&self, id: &InstanceId, shape: Shape) {
        if let Some(instance) = self.live.borrow_mut().get_mut(id) {
            instance.shape = shape;
        }
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    pub(crate) fn update(&self, engine: &Engine, node: NodeId, props: Props) -> UpdateOutcome {
        let id = self.roots.borrow().get(&node).cloned();
        let Some(id) = id else {
            return UpdateOutcome::NotAnInstance;
        };

        let pending = props.pending();
        if !pending.is_empty() {
            let weak = engine.downgrade();
            engine.tasks().spawn(async move {
                join_all(pending.iter().map(|(_, value)| value.settle())).await;
                if let Some(engine) = weak.upgrade() {
                    engine.update_instance(node, props);
                }
            });
            return UpdateOutcome::Deferred;
        }

        let resolved = match props.settled() {
            Ok(resolved) => resolved,
            Err(rejected) => {
                warn!(instance = %id, error = %rejected, "update rejected; keeping previous props");
                return UpdateOutcome::Rejected;
            }
        };

        let (previous, shape, factory) = {
            let mut live = self.live.borrow_mut();
            let Some(instance) = live.get_mut(&id) else {
                return UpdateOutcome::NotAnInstance;
            };
            if instance.props == resolved {
                return UpdateOutcome::Skipped;
            }
            let previous = std::mem::replace(&mut instance.props, resolved.clone());
            (previous, instance.shape.clone(), instance.factory.clone())
        };
        debug!(instance = %id, "updating instance");

        let renderer = engine.renderer();
        let context = Context::new(engine, Some(id.clone()));
        match shape {
            Shape::Lifecycle(lifecycle) => {
                if let Some(on_update) = &lifecycle.on_update {
                    run_guarded("on_update", || on_update(&context, &previous, &resolved));
                }
                if let Some(render) = &lifecycle.render {
                    if let Some(view) = run_guarded("render", || render(&resolved)) {
                        engine
                            .store()
                            .untracked(|| renderer.patch_children(engine, node, std::slice::from_ref(&view)));
                    }
                }
            }
            Shape::Render { effect, props } => {
                *props.borrow_mut() = resolved;
                effect.execute();
            }
            Shape::Nodes => {
                let output = engine
                    .store()
                    .untracked(|| call_factory(&id.name, &factory, &resolved, &context));
                match output {
                    Ok(ComponentOutput::Nodes(views)) => {
                        engine.store().untracked(|| renderer.patch_children(engine, node, &views));
                    }
                    Ok(other) => {
                        renderer.clear_children(engine, node);
                        engine
                            .store()
                            .untracked(|| self.materialize(engine, &id, node, &resolved, other));
                    }
                    Err(err) => {
                        renderer.fill_slot(engine, node, |engine| Some(engine.renderer().diagnostic(engine, &err)));
                    }
                }
            }
            Shape::Pending => {}
        }
        UpdateOutcome::Updated
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Unregister the instance rooted at `node` and run its `on_unmount`.
    /// Returns the instance so its local state can be dropped once the
    /// subtree's bindings are gone.
    pub(crate) fn begin_unmount(&self, engine: &Engine, node: NodeId) -> Option<InstanceId> {
        let id = self.roots.borrow_mut().remove(&node)?;
        let instance = self.live.borrow_mut().shift_remove(&id);
        {
            let mut apis = self.apis.borrow_mut();
            if apis.get(&id.name).is_some_and(|(owner, _)| *owner == id) {
                apis.shift_remove(&id.name);
            }
        }

        if let Some(instance) = instance {
            match instance.shape {
                Shape::Render { effect, .. } => effect.dispose(),
                Shape::Lifecycle(lifecycle) => {
                    if let Some(on_unmount) = lifecycle.on_unmount.clone() {
                        let context = Context::new(engine, Some(id.clone()));
                        if let Some(Completion::Pending(rest)) = run_guarded("on_unmount", || on_unmount(&context)) {
                            engine.tasks().spawn(rest);
                        }
                    }
                }
                Shape::Nodes | Shape::Pending => {}
            }
        }
        debug!(instance = %id, "instance unmounted");
        Some(id)
    }

    /// Delete every local-state path owned by `id`.
    pub(crate) fn finish_unmount(&self, engine: &Engine, id: &InstanceId) {
        let owned = self.locals.borrow_mut().remove(id).unwrap_or_default();
        let store = engine.store();
        for path in &owned {
            if let Err(err) = store.remove(path) {
                warn!(instance = %id, path = %path, error = %err, "failed to drop local state");
            }
        }
        if !owned.is_empty() {
            let namespace = format!("{LOCAL_ROOT}.{id}");
            if let Err(err) = store.remove(&namespace) {
                warn!(instance = %id, error = %err, "failed to drop local namespace");
            }
        }
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    pub(crate) fn record_local(&self, id: &InstanceId, path: &str) {
        self.locals
            .borrow_mut()
            .entry(id.clone())
            .or_default()
            .insert(path.to_string());
    }

    pub(crate) fn is_live(&self, id: &InstanceId) -> bool {
        self.live.borrow().contains_key(id)
    }

    pub(crate) fn instance_at(&self, node: NodeId) -> Option<InstanceId> {
        self.roots.borrow().get(&node).cloned()
    }

    pub(crate) fn live_ids(&self) -> Vec<InstanceId> {
        self.live.borrow().keys().cloned().collect()
    }

    /// Invoke `method` of the API registered under `component`.
    pub(crate) fn call(&self, component: &str, method: &str, arg: Value) -> Option<Value> {
        let found = self
            .apis
            .borrow()
            .get(component)
            .and_then(|(_, api)| api.get(method).cloned());
        let Some(method_fn) = found else {
            debug!(component, method, "no such API method");
            return None;
        };
        run_guarded("api method", || method_fn(arg))
    }

    pub(crate) fn clear(&self) {
        self.live.borrow_mut().clear();
        self.roots.borrow_mut().clear();
        self.apis.borrow_mut().clear();
        self.locals.borrow_mut().clear();
    }
}

/// Pops the component name pushed by [`InstanceManager::enter`].
struct StackFrame<'a> {
    manager: &'a InstanceManager,
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        self.manager.stack.borrow_mut().pop();
    }
}

fn call_factory(
    name: &str,
    factory: &Factory,
    props: &Props,
    context: &Context,
) -> Result<ComponentOutput, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(|| factory(props, context))).map_err(|payload| {
        RenderError::ComponentPanicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        }
    })
}

/// Keep `root` filled with `render(props)`, re-rendering in full whenever
/// the state read by `render` changes.
fn bind_render(engine: &Engine, root: NodeId, render: RenderFn, props: Rc<RefCell<Props>>) -> Effect {
    let weak = engine.downgrade();
    engine.store().effect(move || {
        let current = props.borrow().clone();
        let Some(view) = run_guarded("render", || render(&current)) else {
            return;
        };
        let Some(engine) = weak.upgrade() else {
            return;
        };
        engine
            .store()
            .untracked(|| engine.renderer().replace_children(&engine, root, std::slice::from_ref(&view)));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::render::View;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::with_state(EngineConfig::default(), json!({})).unwrap()
    }

    fn mount(engine: &Engine, view: View) -> NodeId {
        let body = engine.dom().document();
        engine.mount(body, move |_| view.clone()).unwrap();
        body
    }

    fn error_kinds(engine: &Engine) -> Vec<String> {
        let dom = engine.dom();
        dom.query_all("div")
            .into_iter()
            .filter_map(|node| dom.attr(node, "data-error"))
            .collect()
    }

    #[test]
    fn pending_component_swaps_placeholder_when_resolved() {
        let engine = engine();
        let (gate, resolver) = Deferred::<View>::channel();
        engine.register("Lazy", move |_props, _ctx| {
            let gate = gate.clone();
            ComponentOutput::pending(async move { gate.settle().await.map(|view| ComponentOutput::nodes(vec![view])) })
        });
        let body = mount(&engine, View::el("Lazy", Props::new()));

        let placeholder = engine.dom().query("span").unwrap();
        assert!(engine.dom().has_class(placeholder, &engine.config().placeholder_class));
        assert_eq!(engine.flush().pending, 1);

        resolver.resolve(View::el("p", Props::new().text("ready")));
        assert_eq!(engine.flush().pending, 0);
        assert!(engine.dom().query("span").is_none());
        assert_eq!(engine.dom().text_content(body), "ready");
        assert_eq!(engine.instances_live().len(), 1);
    }

    #[test]
    fn rejected_component_renders_diagnostic() {
        let engine = engine();
        let (gate, resolver) = Deferred::<View>::channel();
        engine.register("Lazy", move |_props, _ctx| {
            let gate = gate.clone();
            ComponentOutput::pending(async move { gate.settle().await.map(|view| ComponentOutput::nodes(vec![view])) })
        });
        mount(&engine, View::el("Lazy", Props::new()));

        resolver.reject("chunk failed");
        engine.flush();
        assert_eq!(error_kinds(&engine), vec!["rejected"]);
        assert!(engine.dom().query("span").is_none());
    }

    #[test]
    fn pending_props_create_the_instance_once_settled() {
        let engine = engine();
        engine.register("Greeting", |props, _ctx| {
            let name = props.static_value("name").cloned().unwrap_or_default();
            View::el("b", Props::new().text(format!("hi {}", name.as_str().unwrap_or("?")))).into()
        });
        let (name, resolver) = Deferred::channel();
        let body = mount(&engine, View::el("Greeting", Props::new().deferred("name", name)));

        assert!(engine.instances_live().is_empty());
        assert!(engine.dom().query("span").is_some());

        resolver.resolve(json!("ada"));
        engine.flush();
        assert_eq!(engine.dom().text_content(body), "hi ada");
        assert_eq!(engine.instances_live().len(), 1);
        assert!(engine.dom().query("span").is_none());
    }

    #[test]
    fn rejected_prop_skips_the_factory() {
        let engine = engine();
        let calls = Rc::new(std::cell::Cell::new(0));
        let counter = calls.clone();
        engine.register("Greeting", move |_props, _ctx| {
            counter.set(counter.get() + 1);
            View::el("b", Props::new()).into()
        });
        let (name, resolver) = Deferred::channel();
        mount(&engine, View::el("Greeting", Props::new().deferred("name", name)));

        resolver.reject("no user");
        engine.flush();
        assert_eq!(calls.get(), 0);
        assert_eq!(error_kinds(&engine), vec!["rejected"]);
    }

    #[test]
    fn component_resolving_to_itself_is_caught() {
        let engine = engine();
        engine.register("Lazy", |_props, _ctx| {
            ComponentOutput::pending(async { Ok(ComponentOutput::nodes(vec![View::el("Lazy", Props::new())])) })
        });
        mount(&engine, View::el("Lazy", Props::new()));

        assert_eq!(engine.flush().pending, 0);
        assert_eq!(error_kinds(&engine), vec!["recursive-component"]);
    }

    #[test]
    fn recursion_through_settled_props_keeps_the_parent_chain() {
        let engine = engine();
        let (seed, resolver) = Deferred::channel();
        engine.register("Outer", move |_props, _ctx| {
            View::el("Inner", Props::new().deferred("seed", seed.clone())).into()
        });
        engine.register("Inner", |_props, _ctx| View::el("Outer", Props::new()).into());
        let body = mount(&engine, View::el("Outer", Props::new()));

        resolver.resolve(json!(1));
        assert_eq!(engine.flush().pending, 0);
        assert_eq!(error_kinds(&engine), vec!["recursive-component"]);
        assert!(engine.dom().text_content(body).contains("Outer > Inner > Outer"));
    }

    #[test]
    fn depth_limit_counts_frames_before_the_continuation() {
        let config = EngineConfig {
            max_component_depth: 2,
            ..EngineConfig::default()
        };
        let engine = Engine::with_state(config, json!({})).unwrap();
        let (seed, resolver) = Deferred::channel();
        engine.register("A", move |_props, _ctx| View::el("B", Props::new().deferred("seed", seed.clone())).into());
        engine.register("B", |_props, _ctx| View::el("C", Props::new()).into());
        engine.register("C", |_props, _ctx| View::el("i", Props::new()).into());
        mount(&engine, View::el("A", Props::new()));

        resolver.resolve(json!(1));
        engine.flush();
        assert_eq!(error_kinds(&engine), vec!["depth-exceeded"]);
        assert!(engine.dom().query("i").is_none());
    }

    #[test]
    fn local_paths_use_name_and_ordinal() {
        let engine = engine();
        engine.register("Widget", |_props, ctx| {
            let state = ctx.new_state("open", false);
            View::el("i", Props::new().attr("data-path", state.path())).into()
        });
        mount(&engine, View::fragment(vec![View::el("Widget", Props::new()), View::el("Widget", Props::new())]));

        let dom = engine.dom();
        let paths: Vec<String> = dom
            .query_all("i")
            .into_iter()
            .filter_map(|node| dom.attr(node, "data-path"))
            .collect();
        assert_eq!(paths, vec!["##local.Widget#1.open", "##local.Widget#2.open"]);
    }
}
