//! Engine
//!
//! The [`Engine`] owns everything one application needs: the store, the node
//! tree, the renderer, the instance manager, the component and service
//! registries and the continuation queue. It is threaded explicitly to
//! components through [`Context`]; nothing is looked up globally.
//!
//! # Lifecycle
//!
//! ```text
//! Engine::new ─▶ register components ─▶ mount ─▶ (write / dispatch / flush)* ─▶ dispose
//! ```
//!
//! Deferred work never runs on its own. The host calls [`Engine::flush`] to
//! advance every continuation that can make progress; hydrated mounts attach
//! during the first flush that leaves nothing pending.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::component::{ComponentOutput, Factory, InstanceId, InstanceManager, UpdateOutcome};
use crate::config::{EngineConfig, RenderMode};
use crate::dom::{Dom, Event, NodeId};
use crate::error::{DomError, EngineError, StoreError};
use crate::reactive::{run_guarded, FlushReport, Store, Subscription, TaskQueue, WriteOutcome};
use crate::render::{Props, Renderer, View};

pub type RootFn = Rc<dyn Fn(&Context) -> View>;

/// Where a root is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    Node(NodeId),
    /// `#id` or a tag name, resolved against the connected document.
    Selector(String),
}

impl From<NodeId> for MountTarget {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    /// Placeholder class for deferred content under this root.
    pub placeholder_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Content is in the container.
    Attached,
    /// Content is rendered off-tree, waiting for pending work to settle.
    Staged,
}

struct Mount {
    container: NodeId,
    root: RootFn,
    options: MountOptions,
    content: Option<NodeId>,
    staging: Option<NodeId>,
}

struct EngineInner {
    config: EngineConfig,
    store: Rc<Store>,
    dom: RefCell<Dom>,
    tasks: TaskQueue,
    renderer: Renderer,
    instances: InstanceManager,
    components: RefCell<IndexMap<String, Factory>>,
    services: RefCell<IndexMap<String, Rc<dyn Any>>>,
    mounts: RefCell<Vec<Mount>>,
    disposed: Cell<bool>,
}

/// A rendering engine instance.
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::render::{Props, View};
/// use trellis_core::{Engine, EngineConfig};
///
/// let engine = Engine::with_state(EngineConfig::default(), json!({"name": "Ada"})).unwrap();
/// let body = engine.dom().document();
/// let store = engine.store().clone();
/// engine
///     .mount(body, move |_| {
///         let store = store.clone();
///         View::el("p", Props::new().text_bind(move || store.read("name", "")))
///     })
///     .unwrap();
/// assert_eq!(engine.dom().text_content(body), "Ada");
///
/// engine.store().write("name", "Grace").unwrap();
/// assert_eq!(engine.dom().text_content(body), "Grace");
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

/// Non-owning handle held by bindings and continuations.
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_state(config, Value::Object(Default::default()))
    }

    /// An engine whose store starts from `initial`.
    pub fn with_state(config: EngineConfig, initial: Value) -> Result<Self, EngineError> {
        config.validate()?;
        let store = Store::with_limits(initial, config.max_tracking_depth, config.max_notify_depth);
        let renderer = Renderer::new(&config);
        let instances = InstanceManager::new(config.max_component_depth);
        info!(mode = ?config.render_mode, hydrate = config.hydrate, "engine created");
        Ok(Self {
            inner: Rc::new(EngineInner {
                config,
                store,
                dom: RefCell::new(Dom::new()),
                tasks: TaskQueue::new(),
                renderer,
                instances,
                components: RefCell::new(IndexMap::new()),
                services: RefCell::new(IndexMap::new()),
                mounts: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.inner.store
    }

    /// Read access to the node tree. Do not hold the guard across calls
    /// into the engine.
    pub fn dom(&self) -> Ref<'_, Dom> {
        self.inner.dom.borrow()
    }

    /// Write access for hosts that build mount containers by hand. Nodes
    /// the renderer owns should only change through the store.
    pub fn dom_mut(&self) -> RefMut<'_, Dom> {
        self.inner.dom.borrow_mut()
    }

    pub(crate) fn tasks(&self) -> &TaskQueue {
        &self.inner.tasks
    }

    pub(crate) fn renderer(&self) -> &Renderer {
        &self.inner.renderer
    }

    pub(crate) fn instances(&self) -> &InstanceManager {
        &self.inner.instances
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// A context with no owning instance.
    pub fn context(&self) -> Context {
        Context::new(self, None)
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    /// Register a component. Registering a name again replaces the factory.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Props, &Context) -> ComponentOutput + 'static,
    {
        let name = name.into();
        debug!(component = %name, "component registered");
        self.inner.components.borrow_mut().insert(name, Rc::new(factory));
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.inner.components.borrow().contains_key(name)
    }

    pub fn component_names(&self) -> Vec<String> {
        self.inner.components.borrow().keys().cloned().collect()
    }

    pub(crate) fn component(&self, name: &str) -> Option<Factory> {
        self.inner.components.borrow().get(name).cloned()
    }

    pub fn provide_service<T: Any>(&self, name: impl Into<String>, service: T) {
        self.inner
            .services
            .borrow_mut()
            .insert(name.into(), Rc::new(service) as Rc<dyn Any>);
    }

    /// The service registered under `name`, if it has type `T`.
    pub fn service<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        let service = self.inner.services.borrow().get(name).cloned()?;
        service.downcast::<T>().ok()
    }

    /// Invoke a method of a component's public API.
    pub fn call(&self, component: &str, method: &str, arg: Value) -> Option<Value> {
        self.instances().call(component, method, arg)
    }

    /// Ids of every live component instance, in creation order.
    pub fn instances_live(&self) -> Vec<InstanceId> {
        self.instances().live_ids()
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Render `view` into a detached node.
    pub fn render(&self, view: &View) -> Option<NodeId> {
        self.store().untracked(|| self.renderer().render(self, view))
    }

    /// Render `view` once, without subscribing to the store. Bound values
    /// and dynamic children are evaluated a single time; deferred values and
    /// event listeners still work.
    pub fn render_static(&self, view: &View) -> Option<NodeId> {
        self.renderer().with_static(|| self.render(view))
    }

    pub fn mount<F>(&self, target: impl Into<MountTarget>, root: F) -> Result<MountState, EngineError>
    where
        F: Fn(&Context) -> View + 'static,
    {
        self.mount_with(target, MountOptions::default(), root)
    }

    /// Render `root` into the container named by `target`.
    ///
    /// With `hydrate` enabled the content is rendered into a hidden staging
    /// node and moved into the container by the first [`Engine::flush`] that
    /// leaves no work pending. Mounting onto a container that already holds
    /// a root replaces it.
    pub fn mount_with<F>(
        &self,
        target: impl Into<MountTarget>,
        options: MountOptions,
        root: F,
    ) -> Result<MountState, EngineError>
    where
        F: Fn(&Context) -> View + 'static,
    {
        let container = self.resolve(target.into())?;
        self.release_mount(container);

        let root: RootFn = Rc::new(root);
        let content = self.render_root(&root, &options);
        let mut mount = Mount {
            container,
            root,
            options,
            content,
            staging: None,
        };
        let state = self.place(&mut mount);
        debug!(container = %container, state = ?state, "root mounted");
        self.inner.mounts.borrow_mut().push(mount);
        Ok(state)
    }

    fn resolve(&self, target: MountTarget) -> Result<NodeId, DomError> {
        let dom = self.dom();
        match target {
            MountTarget::Node(node) if dom.contains(node) => Ok(node),
            MountTarget::Node(node) => Err(DomError::StaleNode(node)),
            MountTarget::Selector(selector) => dom.query(&selector).ok_or(DomError::NoMatch(selector)),
        }
    }

    fn render_root(&self, root: &RootFn, options: &MountOptions) -> Option<NodeId> {
        let context = self.context();
        self.renderer().with_placeholder(options.placeholder_class.as_deref(), || {
            let view = self.store().untracked(|| run_guarded("root", || root(&context)))?;
            self.render(&view)
        })
    }

    /// Attach rendered content directly or stage it for hydration.
    fn place(&self, mount: &mut Mount) -> MountState {
        let Some(content) = mount.content else {
            return MountState::Attached;
        };
        if !self.inner.config.hydrate {
            self.renderer().attach(self, mount.container, content);
            return MountState::Attached;
        }
        let staging = {
            let mut dom = self.dom_mut();
            let staging = dom.create_element("div");
            let _ = dom.set_attr(staging, "hidden", "");
            staging
        };
        self.renderer().attach(self, staging, content);
        mount.staging = Some(staging);
        MountState::Staged
    }

    pub fn mount_state(&self, container: NodeId) -> Option<MountState> {
        self.inner
            .mounts
            .borrow()
            .iter()
            .find(|mount| mount.container == container)
            .map(|mount| {
                if mount.staging.is_some() {
                    MountState::Staged
                } else {
                    MountState::Attached
                }
            })
    }

    /// Move staged roots into their containers once nothing is pending.
    fn complete_hydration(&self) {
        if !self.tasks().is_idle() {
            return;
        }
        let ready: Vec<(NodeId, Option<NodeId>, NodeId)> = self
            .inner
            .mounts
            .borrow_mut()
            .iter_mut()
            .filter_map(|mount| {
                let staging = mount.staging.take()?;
                Some((mount.container, mount.content, staging))
            })
            .collect();
        for (container, content, staging) in ready {
            if let Some(content) = content {
                self.renderer().attach(self, container, content);
            }
            self.dom_mut().release(staging);
            debug!(container = %container, "staged root attached");
        }
    }

    fn release_mount(&self, container: NodeId) {
        let position = self
            .inner
            .mounts
            .borrow()
            .iter()
            .position(|mount| mount.container == container);
        let Some(position) = position else {
            return;
        };
        let mount = self.inner.mounts.borrow_mut().remove(position);
        self.discard_content(&mount);
    }

    fn discard_content(&self, mount: &Mount) {
        if let Some(content) = mount.content {
            self.renderer().teardown(self, content);
            self.dom_mut().release(content);
        }
        if let Some(staging) = mount.staging {
            self.dom_mut().release(staging);
        }
    }

    /// Advance every continuation that can make progress.
    pub fn flush(&self) -> FlushReport {
        let report = self.tasks().flush();
        if report.pending == 0 {
            self.complete_hydration();
        }
        report
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks().pending()
    }

    /// Tear down and re-render every mounted root.
    pub fn rerender(&self) {
        let count = self.inner.mounts.borrow().len();
        info!(roots = count, "forced re-render");
        for index in 0..count {
            let (root, options, old) = {
                let mounts = self.inner.mounts.borrow();
                let Some(mount) = mounts.get(index) else {
                    break;
                };
                (
                    mount.root.clone(),
                    mount.options.clone(),
                    Mount {
                        container: mount.container,
                        root: mount.root.clone(),
                        options: mount.options.clone(),
                        content: mount.content,
                        staging: mount.staging,
                    },
                )
            };
            self.discard_content(&old);
            let content = self.render_root(&root, &options);
            let mut fresh = Mount {
                content,
                staging: None,
                ..old
            };
            self.place(&mut fresh);
            if let Some(slot) = self.inner.mounts.borrow_mut().get_mut(index) {
                *slot = fresh;
            }
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        self.renderer().mode()
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        info!(mode = ?mode, "render mode changed");
        self.renderer().set_mode(mode);
    }

    /// Reconciliation failures seen so far.
    pub fn reconcile_failures(&self) -> usize {
        self.renderer().failures()
    }

    /// Nodes of `tag` waiting in the recycle pool.
    pub fn pooled(&self, tag: &str) -> usize {
        self.renderer().pooled(tag)
    }

    /// Whether `node` has reactive bindings, listeners or static props
    /// recorded.
    pub fn has_bindings(&self, node: NodeId) -> bool {
        self.renderer().has_bindings(node)
    }

    pub fn binding_count(&self) -> usize {
        self.renderer().binding_count()
    }

    // ------------------------------------------------------------------
    // Events, updates, teardown
    // ------------------------------------------------------------------

    /// Deliver `event` to `node` and then to each of its ancestors.
    /// Returns the number of handlers that ran.
    pub fn dispatch(&self, node: NodeId, mut event: Event) -> usize {
        event.target = Some(node);
        let path: Vec<NodeId> = {
            let dom = self.dom();
            std::iter::successors(Some(node), |current| dom.parent(*current))
                .take_while(|current| dom.contains(*current))
                .collect()
        };
        let mut ran = 0;
        for current in path {
            let (handlers, tap) = self.renderer().listeners_for(current, &event);
            for handler in handlers {
                run_guarded("event handler", || handler(&event));
                ran += 1;
            }
            if let Some((click, handlers)) = tap {
                for handler in handlers {
                    run_guarded("event handler", || handler(&click));
                    ran += 1;
                }
            }
        }
        ran
    }

    /// Give a component instance new props.
    pub fn update_instance(&self, node: NodeId, props: Props) -> UpdateOutcome {
        self.instances().update(self, node, props)
    }

    /// Tear down and free `node`. Passing a mount container removes that
    /// root instead and keeps the container.
    pub fn unmount(&self, node: NodeId) -> Result<(), EngineError> {
        if !self.dom().contains(node) {
            return Err(DomError::StaleNode(node).into());
        }
        let is_container = self.inner.mounts.borrow().iter().any(|m| m.container == node);
        if is_container {
            self.release_mount(node);
            return Ok(());
        }
        self.renderer().teardown(self, node);
        self.dom_mut().release(node);
        self.inner
            .mounts
            .borrow_mut()
            .retain(|mount| mount.content != Some(node));
        Ok(())
    }

    /// Tear down every root and drop all registrations.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let mounts: Vec<Mount> = self.inner.mounts.borrow_mut().drain(..).collect();
        for mount in &mounts {
            self.discard_content(mount);
        }
        self.renderer().clear(self);
        self.instances().clear();
        self.store().clear_subscriptions();
        self.inner.components.borrow_mut().clear();
        self.inner.services.borrow_mut().clear();
        info!(roots = mounts.len(), "engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.render_mode())
            .field("components", &self.component_names())
            .field("mounts", &self.inner.mounts.borrow().len())
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

/// What components, hooks and roots see of the engine.
#[derive(Clone)]
pub struct Context {
    store: Rc<Store>,
    engine: WeakEngine,
    instance: Option<InstanceId>,
}

impl Context {
    pub(crate) fn new(engine: &Engine, instance: Option<InstanceId>) -> Self {
        Self {
            store: engine.store().clone(),
            engine: engine.downgrade(),
            instance,
        }
    }

    pub fn engine(&self) -> Option<Engine> {
        self.engine.upgrade()
    }

    /// The instance this context belongs to; `None` for roots.
    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance.as_ref()
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.store
    }

    pub fn read(&self, path: &str, default: impl Into<Value>) -> Value {
        self.store.read(path, default)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.store.get(path)
    }

    pub fn write(&self, path: &str, value: impl Into<Value>) -> Result<WriteOutcome, StoreError> {
        self.store.write(path, value)
    }

    pub fn remove(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.store.remove(path)
    }

    pub fn subscribe<F>(&self, path: &str, callback: F) -> Subscription
    where
        F: Fn(&crate::reactive::StoreChange) + 'static,
    {
        self.store.subscribe(path, callback)
    }

    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.store.execute_batch(f)
    }

    /// State private to this instance, stored under
    /// `##local.<instance>.<key>` and deleted when the instance unmounts.
    /// The initial value is written only if the path is empty.
    pub fn new_state(&self, key: &str, initial: impl Into<Value>) -> LocalState {
        let path = match &self.instance {
            Some(id) => id.local_path(key),
            None => format!("{}.app.{key}", crate::component::LOCAL_ROOT),
        };
        if self.store.read_untracked(&path).is_none() {
            let initial = initial.into();
            if let Err(err) = self.store.untracked(|| self.store.write(&path, initial)) {
                warn!(path = %path, error = %err, "could not initialise local state");
            }
        }
        if let (Some(id), Some(engine)) = (&self.instance, self.engine.upgrade()) {
            engine.instances().record_local(id, &path);
        }
        LocalState {
            store: self.store.clone(),
            path,
        }
    }

    pub fn service<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.engine.upgrade()?.service(name)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.engine.upgrade().is_some_and(|engine| engine.has_component(name))
    }

    pub fn component_names(&self) -> Vec<String> {
        self.engine
            .upgrade()
            .map(|engine| engine.component_names())
            .unwrap_or_default()
    }

    pub fn call(&self, component: &str, method: &str, arg: Value) -> Option<Value> {
        self.engine.upgrade()?.call(component, method, arg)
    }

    /// Run `future` on the engine's task queue.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        if let Some(engine) = self.engine.upgrade() {
            engine.tasks().spawn(future);
        }
    }

    pub fn rerender(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.rerender();
        }
    }

    pub fn flush(&self) -> FlushReport {
        self.engine
            .upgrade()
            .map(|engine| engine.flush())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("instance", &self.instance).finish()
    }
}

/// Handle to one local-state value.
#[derive(Clone)]
pub struct LocalState {
    store: Rc<Store>,
    path: String,
}

impl LocalState {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current value, tracked.
    pub fn get(&self) -> Value {
        self.store.read(&self.path, Value::Null)
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<WriteOutcome, StoreError> {
        self.store.write(&self.path, value)
    }

    pub fn update(&self, f: impl FnOnce(Value) -> Value) -> Result<WriteOutcome, StoreError> {
        let next = f(self.store.read_untracked(&self.path).unwrap_or(Value::Null));
        self.set(next)
    }
}

impl fmt::Debug for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalState").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::with_state(EngineConfig::default(), json!({})).unwrap()
    }

    fn paragraph(text: &'static str) -> impl Fn(&Context) -> View + 'static {
        move |_| View::el("p", Props::new().text(text))
    }

    #[test]
    fn mount_targets_are_resolved() {
        let engine = engine();
        let app = {
            let mut dom = engine.dom_mut();
            let app = dom.create_element("div");
            dom.set_attr(app, "id", "app").unwrap();
            let body = dom.document();
            dom.append_child(body, app).unwrap();
            app
        };

        assert_eq!(engine.mount("#app", paragraph("hi")).unwrap(), MountState::Attached);
        assert_eq!(engine.dom().text_content(app), "hi");
        assert!(matches!(
            engine.mount("#missing", paragraph("x")),
            Err(EngineError::Dom(DomError::NoMatch(_)))
        ));

        engine.unmount(app).unwrap();
        engine.dom_mut().release(app);
        assert!(matches!(
            engine.mount(app, paragraph("x")),
            Err(EngineError::Dom(DomError::StaleNode(_)))
        ));
    }

    #[test]
    fn mounting_twice_replaces_the_root() {
        let engine = engine();
        let body = engine.dom().document();
        engine.mount(body, paragraph("first")).unwrap();
        engine.mount(body, paragraph("second")).unwrap();

        assert_eq!(engine.dom().text_content(body), "second");
        assert_eq!(engine.inner.mounts.borrow().len(), 1);
    }

    #[test]
    fn unmounting_a_container_keeps_it() {
        let engine = engine();
        let body = engine.dom().document();
        engine.mount(body, paragraph("hi")).unwrap();

        engine.unmount(body).unwrap();
        assert!(engine.dom().contains(body));
        assert!(engine.dom().children(body).is_empty());
        assert_eq!(engine.mount_state(body), None);
    }

    #[test]
    fn rerender_runs_every_root_again() {
        let engine = engine();
        let body = engine.dom().document();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        engine
            .mount(body, move |_| {
                counter.set(counter.get() + 1);
                View::el("p", Props::new().text(counter.get().to_string()))
            })
            .unwrap();
        let first = engine.dom().query("p").unwrap();

        engine.rerender();
        assert_eq!(calls.get(), 2);
        assert!(!engine.dom().contains(first));
        assert_eq!(engine.dom().text_content(body), "2");
    }

    #[test]
    fn dispose_is_idempotent_and_clears_registries() {
        let engine = engine();
        let body = engine.dom().document();
        engine.register("Widget", |_props, _ctx| View::el("i", Props::new()).into());
        engine.provide_service("clock", 7u32);
        engine.mount(body, |_| View::el("Widget", Props::new())).unwrap();

        engine.dispose();
        engine.dispose();
        assert!(engine.is_disposed());
        assert!(engine.component_names().is_empty());
        assert!(engine.service::<u32>("clock").is_none());
        assert!(engine.instances_live().is_empty());
        assert!(engine.dom().children(body).is_empty());
    }

    #[test]
    fn context_outlives_engine_safely() {
        let engine = engine();
        let context = engine.context();
        assert!(context.engine().is_some());
        drop(engine);

        assert!(context.engine().is_none());
        assert!(!context.has_component("Anything"));
        assert_eq!(context.flush(), FlushReport::default());
        assert!(context.write("still", 1).is_ok());
    }

    #[test]
    fn root_local_state_updates_in_place() {
        let engine = engine();
        let context = engine.context();
        let count = context.new_state("count", 1);
        assert_eq!(count.path(), "##local.app.count");

        count.update(|v| json!(v.as_i64().unwrap_or(0) + 1)).unwrap();
        assert_eq!(count.get(), json!(2));
        // An existing value is not overwritten.
        assert_eq!(context.new_state("count", 10).get(), json!(2));
    }
}
