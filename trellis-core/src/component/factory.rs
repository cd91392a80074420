//! Component factories and their return shapes.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;

use crate::engine::Context;
use crate::error::Rejected;
use crate::render::{Props, View};

/// Builds a component from its props.
pub type Factory = Rc<dyn Fn(&Props, &Context) -> ComponentOutput>;

pub type RenderFn = Rc<dyn Fn(&Props) -> View>;

/// A method exposed through a component's public API.
pub type ApiMethod = Rc<dyn Fn(Value) -> Value>;

pub(crate) type Hook = Rc<dyn Fn(&Context) -> Completion>;
pub(crate) type UpdateHook = Rc<dyn Fn(&Context, &Props, &Props)>;

/// What a factory returned.
pub enum ComponentOutput {
    /// Plain views, rendered once. Updates re-invoke the factory.
    Nodes(Vec<View>),
    /// A component with lifecycle hooks and an optional public API.
    Lifecycle(Lifecycle),
    /// A render function re-run whenever the state it reads changes.
    Render(RenderFn),
    /// The component itself is not available yet.
    Pending(LocalBoxFuture<'static, Result<ComponentOutput, Rejected>>),
}

impl ComponentOutput {
    pub fn nodes(views: Vec<View>) -> Self {
        Self::Nodes(views)
    }

    pub fn render<F>(f: F) -> Self
    where
        F: Fn(&Props) -> View + 'static,
    {
        Self::Render(Rc::new(f))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<ComponentOutput, Rejected>> + 'static,
    {
        Self::Pending(future.boxed_local())
    }
}

impl From<View> for ComponentOutput {
    fn from(view: View) -> Self {
        Self::Nodes(vec![view])
    }
}

impl From<Lifecycle> for ComponentOutput {
    fn from(lifecycle: Lifecycle) -> Self {
        Self::Lifecycle(lifecycle)
    }
}

impl fmt::Debug for ComponentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes(views) => f.debug_tuple("Nodes").field(views).finish(),
            Self::Lifecycle(lifecycle) => lifecycle.fmt(f),
            Self::Render(_) => f.write_str("Render(..)"),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// How a lifecycle hook finished.
pub enum Completion {
    Done,
    /// The hook continues on the engine's task queue.
    Pending(LocalBoxFuture<'static, ()>),
}

/// Hooks and API of a lifecycle component.
///
/// A lifecycle without `render` and with an API is a headless logic
/// component: it renders nothing and exists to expose methods to others.
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::component::Lifecycle;
///
/// let counter = Lifecycle::new()
///     .on_mount(|ctx| {
///         let _ = ctx.write("mounted", true);
///     })
///     .method("double", |v| json!(v.as_i64().unwrap_or(0) * 2));
/// assert!(counter.has_method("double"));
/// ```
#[derive(Clone, Default)]
pub struct Lifecycle {
    pub(crate) render: Option<RenderFn>,
    pub(crate) on_mount: Option<Hook>,
    pub(crate) on_update: Option<UpdateHook>,
    pub(crate) on_unmount: Option<Hook>,
    pub(crate) api: IndexMap<String, ApiMethod>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content, rendered once on creation and again after each update.
    pub fn render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Props) -> View + 'static,
    {
        self.render = Some(Rc::new(f));
        self
    }

    /// Runs on the task queue after the instance is created.
    pub fn on_mount<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) + 'static,
    {
        self.on_mount = Some(Rc::new(move |ctx: &Context| {
            f(ctx);
            Completion::Done
        }));
        self
    }

    pub fn on_mount_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.on_mount = Some(Rc::new(move |ctx: &Context| Completion::Pending(f(ctx).boxed_local())));
        self
    }

    /// Receives the previous and the new props.
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &Props, &Props) + 'static,
    {
        self.on_update = Some(Rc::new(f));
        self
    }

    pub fn on_unmount<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) + 'static,
    {
        self.on_unmount = Some(Rc::new(move |ctx: &Context| {
            f(ctx);
            Completion::Done
        }));
        self
    }

    pub fn on_unmount_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.on_unmount = Some(Rc::new(move |ctx: &Context| Completion::Pending(f(ctx).boxed_local())));
        self
    }

    /// Expose `name` through [`Context::call`].
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        self.api.insert(name.into(), Rc::new(f));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.api.contains_key(name)
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("render", &self.render.is_some())
            .field("on_mount", &self.on_mount.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_unmount", &self.on_unmount.is_some())
            .field("api", &self.api.keys().collect::<Vec<_>>())
            .finish()
    }
}
