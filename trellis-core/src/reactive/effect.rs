//! Effect Implementation
//!
//! An Effect is a tracked computation that re-runs whenever a path it read
//! changes. Every attribute, text, style and child-list binding in the
//! renderer is an effect.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately inside a fresh tracking scope
//!    to discover its dependencies.
//!
//! 2. When any dependency changes, the store re-runs it.
//!
//! 3. Every run collects a new dependency set. Paths read this time but not
//!    last time are subscribed; paths no longer read are unsubscribed. A
//!    computation whose `if` branch stops reading a path therefore stops
//!    reacting to it.
//!
//! # Disposal
//!
//! The store keeps an effect alive for as long as it is subscribed to any
//! path. [`Effect::dispose`] removes every subscription; it is the only way to
//! stop an effect.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use tracing::trace;

use super::store::{run_guarded, Store};
use super::subscriber::{Subscriber, SubscriberId};

/// A computation that re-runs when the state it read changes.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::reactive::Store;
///
/// let store = Store::new(json!({"count": 0}));
/// let reader = store.clone();
/// let effect = store.effect(move || {
///     let _ = reader.read("count", 0);
/// });
///
/// store.write("count", 5).unwrap();
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    id: SubscriberId,
    store: Weak<Store>,
    run: Box<dyn Fn()>,
    dependencies: RefCell<IndexSet<String>>,
    disposed: Cell<bool>,
    running: Cell<bool>,
    run_count: Cell<usize>,
}

impl Effect {
    pub(crate) fn new<F>(store: &Rc<Store>, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy(store, run);
        effect.execute();
        effect
    }

    /// Create an effect without running it. Until the first
    /// [`Effect::execute`] it has no dependencies.
    pub(crate) fn new_lazy<F>(store: &Rc<Store>, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                store: Rc::downgrade(store),
                run: Box::new(run),
                dependencies: RefCell::new(IndexSet::new()),
                disposed: Cell::new(false),
                running: Cell::new(false),
                run_count: Cell::new(0),
            }),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the computation now and refresh its subscriptions.
    pub fn execute(&self) {
        EffectInner::execute(&self.inner);
    }

    /// Stop the effect and remove all of its subscriptions.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.unsubscribe_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Paths read during the most recent run.
    pub fn dependencies(&self) -> Vec<String> {
        self.inner.dependencies.borrow().iter().cloned().collect()
    }
}

impl EffectInner {
    fn execute(this: &Rc<Self>) {
        if this.disposed.get() {
            return;
        }
        if this.running.get() {
            trace!(effect = %this.id, "effect re-triggered itself; skipped");
            return;
        }
        let Some(store) = this.store.upgrade() else {
            return;
        };

        this.running.set(true);
        let scope = store.tracking().enter(this.id);
        run_guarded("effect", || (this.run)());
        let next = scope.finish();
        this.running.set(false);
        this.run_count.set(this.run_count.get() + 1);

        // Disposed by its own run (e.g. a binder tearing down its own node).
        if this.disposed.get() {
            this.unsubscribe_all();
            return;
        }

        let previous = this.dependencies.replace(next);
        let current = this.dependencies.borrow();
        for path in previous.difference(&current) {
            store.unsubscribe_internal(path, this.id);
        }
        for path in current.difference(&previous) {
            let me = Rc::clone(this);
            store.subscribe_internal(path, Subscriber::new(this.id, move || EffectInner::execute(&me)));
        }
    }

    fn unsubscribe_all(&self) {
        let deps = std::mem::take(&mut *self.dependencies.borrow_mut());
        if let Some(store) = self.store.upgrade() {
            for path in &deps {
                store.unsubscribe_internal(path, self.id);
            }
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn effect_runs_on_creation() {
        let store = Store::new(json!({}));
        let effect = store.effect(|| {});
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let store = Store::new(json!({"count": 0}));
        let seen = Rc::new(Cell::new(-1));
        let (reader, sink) = (store.clone(), seen.clone());

        let effect = store.effect(move || {
            sink.set(reader.read("count", 0).as_i64().unwrap_or(-1));
        });
        assert_eq!(seen.get(), 0);

        store.write("count", 42).unwrap();
        assert_eq!(seen.get(), 42);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.dependencies(), vec!["count".to_string()]);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let store = Store::new(json!({}));
        let reader = store.clone();
        let effect = store.effect(move || {
            let _ = reader.get("x");
        });
        assert_eq!(store.dependents("x"), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(store.dependents("x"), 0);

        store.write("x", 1).unwrap();
        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_execute() {
        let store = Store::new(json!({}));
        let effect = Effect::new_lazy(&store, || {});
        assert_eq!(effect.run_count(), 0);
        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn branch_change_drops_stale_dependency() {
        let store = Store::new(json!({"flag": true, "detail": "x"}));
        let reader = store.clone();
        let effect = store.effect(move || {
            if reader.read("flag", false) == json!(true) {
                let _ = reader.get("detail");
            }
        });
        assert_eq!(store.dependents("detail"), 1);

        store.write("flag", false).unwrap();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(store.dependents("detail"), 0);

        store.write("detail", "y").unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn ancestor_write_reaches_nested_reader() {
        let store = Store::new(json!({}));
        let reader = store.clone();
        let effect = store.effect(move || {
            let _ = reader.get("ui.theme.accent");
        });

        store.write("ui", json!({"theme": {"accent": "red"}})).unwrap();
        assert_eq!(effect.run_count(), 2);

        store.write("ui.theme.accent", "blue").unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn panicking_run_is_contained() {
        let store = Store::new(json!({}));
        let reader = store.clone();
        let effect = store.effect(move || {
            if reader.read("boom", false) == json!(true) {
                panic!("binding bug");
            }
        });
        store.write("boom", true).unwrap();
        assert_eq!(effect.run_count(), 2);
        assert!(!store.is_tracking());
    }
}
