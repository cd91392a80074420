//! Per-node binding records.

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::view::Handler;
use crate::dom::{NodeId, TapTracker};
use crate::reactive::Effect;

/// Everything the renderer attached to one live node.
///
/// Records live in the renderer's `NodeId`-keyed map and are removed and
/// disposed in a single sweep when the node is torn down.
#[derive(Default)]
pub(crate) struct BindingRecord {
    pub(crate) effects: SmallVec<[Effect; 4]>,
    pub(crate) listeners: SmallVec<[(String, Handler); 2]>,
    pub(crate) taps: Option<TapTracker>,
    /// Attributes written from static props; reconciliation updates these.
    pub(crate) static_attrs: IndexSet<String>,
    /// Props kept live by an effect or a deferred value. A kept node is only
    /// updated in place by a view with the same set.
    pub(crate) bound: IndexSet<String>,
    /// Text node created for the `text` prop. Child patching leaves it alone.
    pub(crate) text_node: Option<NodeId>,
    /// Children are produced by a binder and must not be patched from outside.
    pub(crate) dynamic_children: bool,
}

impl BindingRecord {
    pub(crate) fn is_empty(&self) -> bool {
        self.effects.is_empty()
            && self.listeners.is_empty()
            && self.taps.is_none()
            && self.static_attrs.is_empty()
            && self.bound.is_empty()
            && self.text_node.is_none()
            && !self.dynamic_children
    }

    /// Handlers registered for `event`, in registration order.
    pub(crate) fn handlers(&self, event: &str) -> Vec<Handler> {
        self.listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect()
    }

    pub(crate) fn dispose(self) {
        for effect in &self.effects {
            effect.dispose();
        }
    }
}
