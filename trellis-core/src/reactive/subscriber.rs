//! Subscriber types for the state store.
//!
//! A Subscriber is any callback registered against a path: the re-run hook of
//! a tracked computation (internal registry) or an outside listener such as a
//! synchronization service (external registry).

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Unique identifier for a subscriber.
///
/// Tracked computations keep the same id across re-runs, which is what lets
/// the store replace their subscriptions path by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        thread_local! {
            static COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        COUNTER.with(|counter| {
            let id = counter.get();
            counter.set(id + 1);
            Self(id)
        })
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// An internal subscriber: re-runs a computation when a path it read changes.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Rc<dyn Fn()>,
}

impl Subscriber {
    pub fn new<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id,
            notify: Rc::new(notify),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// What an external subscriber is told about a write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    /// The path that was written (or removed).
    pub path: String,
    /// Value at `path` after the write, `None` if removed.
    pub value: Option<Value>,
    /// Value at `path` before the write.
    pub previous: Option<Value>,
}

pub(crate) type ChangeCallback = Rc<dyn Fn(&StoreChange)>;

/// An external registry entry.
#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) callback: ChangeCallback,
    /// Fire for writes above or below the subscribed path too, not only on it.
    pub(crate) hierarchical: bool,
}
