//! Trellis Core
//!
//! This crate provides the runtime for the Trellis reactive rendering engine.
//! It implements:
//!
//! - A path-addressed reactive store with batching, middleware and effects
//! - Fine-grained bindings from store paths to individual node properties
//! - Keyed child reconciliation with a bounded node recycle pool
//! - Components with lifecycles, local state and public APIs
//! - Deferred values settled on an explicit continuation queue
//!
//! Everything runs on one thread. The node tree is an in-memory arena, so the
//! engine can be driven headlessly and serialized with [`Dom::to_html`].
//!
//! # Architecture
//!
//! - `reactive`: store, tracking scopes, effects, deferred values, task queue
//! - `dom`: the node arena and event types
//! - `render`: view descriptions, the renderer and reconciliation
//! - `component`: factories, lifecycles and the instance manager
//! - `engine`: the [`Engine`] that ties them together and the [`Context`]
//!   handed to components
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::render::{Props, View};
//! use trellis_core::{Engine, EngineConfig};
//!
//! let engine = Engine::with_state(EngineConfig::default(), json!({"count": 0})).unwrap();
//!
//! engine.register("Counter", |_props, ctx| {
//!     let store = ctx.store().clone();
//!     View::el(
//!         "span",
//!         Props::new().text_bind(move || store.read("count", 0)),
//!     )
//!     .into()
//! });
//!
//! let body = engine.dom().document();
//! engine.mount(body, |_| View::el("Counter", Props::new())).unwrap();
//!
//! engine.store().write("count", 5).unwrap();
//! assert_eq!(engine.dom().text_content(body), "5");
//! ```

pub mod component;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod reactive;
pub mod render;

pub use component::{Completion, ComponentOutput, InstanceId, Lifecycle, UpdateOutcome};
pub use config::{EngineConfig, RenderMode, TapConfig};
pub use dom::{Dom, Event, NodeId};
pub use engine::{Context, Engine, LocalState, MountOptions, MountState, MountTarget, WeakEngine};
pub use error::{ConfigError, DomError, EngineError, Rejected, RenderError, StoreError};
pub use reactive::{Deferred, Effect, Store, WriteOutcome};
pub use render::{ChildUpdate, Prop, Props, View};
