//! Live Node Tree
//!
//! The engine renders into an in-memory tree of elements, text nodes and
//! fragments. Nodes are addressed by generational [`NodeId`] handles, so work
//! that finishes late (a deferred value settling after its target was torn
//! down) can tell that its node is gone instead of writing into a reused one.

mod events;
mod node;
mod tree;

pub use events::Event;
pub use node::{NodeId, NodeKind};
pub use tree::{Dom, DomStats};

pub(crate) use events::TapTracker;
