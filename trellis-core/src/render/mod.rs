//! Rendering
//!
//! Views go in, live nodes come out. The renderer classifies each prop, wires
//! reactive ones to the store through effects and patches child lists either
//! wholesale or through keyed reconciliation.

mod bindings;
mod reconcile;
mod renderer;
mod view;

pub use renderer::DIAGNOSTIC_CLASS;
pub use view::{BindFn, ChildUpdate, Children, ChildrenFn, Element, Handler, Prop, Props, View};

pub(crate) use renderer::Renderer;
