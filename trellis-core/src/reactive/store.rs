//! State Store
//!
//! The store holds the application's state tree and is the single source of
//! change notifications. Every value is addressed by a dot-delimited path.
//!
//! # How It Works
//!
//! 1. Reads inside a tracking scope record their path as a dependency of the
//!    running computation (see [`Effect`]).
//!
//! 2. A write runs the middleware chain, skips deep-equal values, mutates the
//!    tree and then runs one notification pass:
//!    a. subscribers of the written path,
//!    b. subscribers of every ancestor path (`a.b.c` notifies `a.b` and `a`),
//!    c. subscribers of every descendant path (`a` notifies `a.b.c`).
//!
//! 3. Inside [`Store::execute_batch`] writes are queued per path (last write
//!    wins) and flushed as one multi-path update with a single pass.
//!
//! # Failure Handling
//!
//! A path being notified is marked as updating; writes to it from its own
//! notification pass are skipped instead of recursing. Subscriber and
//! middleware panics are caught and logged so the remaining subscribers still
//! run.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, error, trace, warn};

use super::context::TrackingStack;
use super::effect::Effect;
use super::path;
use super::subscriber::{Listener, StoreChange, Subscriber, SubscriberId};
use crate::error::{panic_message, MiddlewareError, StoreError};

/// A write as seen by middleware.
#[derive(Debug)]
pub struct WriteEvent<'a> {
    pub path: &'a str,
    pub old_value: Option<&'a Value>,
    /// The value after the preceding middleware ran.
    pub new_value: &'a Value,
    /// Caller-supplied context passed to [`Store::write_with`].
    pub context: &'a Value,
    /// The whole tree before the write.
    pub snapshot: &'a Value,
}

/// Middleware may replace the value (`Ok(Some(_))`), keep it (`Ok(None)`) or
/// fail, which keeps it as well.
pub type Middleware = Rc<dyn Fn(&WriteEvent<'_>) -> Result<Option<Value>, MiddlewareError>>;

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The tree changed and subscribers were notified.
    Written,
    /// The value deep-equals the current one; nothing happened.
    Unchanged,
    /// A batch is open; the write was queued.
    Queued,
    /// The path is mid-notification; the write was dropped.
    Reentrant,
}

#[derive(Debug)]
struct QueuedWrite {
    value: Value,
    context: Value,
}

type BatchQueue = IndexMap<String, QueuedWrite>;

pub struct Store {
    tree: RefCell<Value>,
    initial: Value,
    tracking: TrackingStack,
    internal: RefCell<IndexMap<String, IndexMap<SubscriberId, Subscriber>>>,
    external: RefCell<IndexMap<String, IndexMap<SubscriberId, Listener>>>,
    middleware: RefCell<Vec<Middleware>>,
    batch: RefCell<Option<BatchQueue>>,
    updating: RefCell<HashSet<String>>,
    notify_depth: Cell<usize>,
    max_notify_depth: usize,
}

impl Store {
    pub fn new(initial: Value) -> Rc<Self> {
        Self::with_limits(initial, 100, 100)
    }

    pub fn with_limits(initial: Value, max_tracking_depth: usize, max_notify_depth: usize) -> Rc<Self> {
        let initial = match initial {
            Value::Object(_) => initial,
            Value::Null => Value::Object(Map::new()),
            other => {
                warn!(initial = %other, "state root must be an object; starting empty");
                Value::Object(Map::new())
            }
        };
        Rc::new(Self {
            tree: RefCell::new(initial.clone()),
            initial,
            tracking: TrackingStack::new(max_tracking_depth),
            internal: RefCell::new(IndexMap::new()),
            external: RefCell::new(IndexMap::new()),
            middleware: RefCell::new(Vec::new()),
            batch: RefCell::new(None),
            updating: RefCell::new(HashSet::new()),
            notify_depth: Cell::new(0),
            max_notify_depth,
        })
    }

    pub(crate) fn tracking(&self) -> &TrackingStack {
        &self.tracking
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value at `path`, recorded as a dependency of the running computation.
    pub fn get(&self, path: &str) -> Option<Value> {
        let segments = path::parse(path).ok()?;
        if self.tracking.is_tracking() {
            self.tracking.track(path);
        }
        path::lookup(&self.tree.borrow(), &segments).cloned()
    }

    /// Value at `path`, or `default` when absent or the path is invalid.
    pub fn read(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).unwrap_or_else(|| default.into())
    }

    pub fn read_untracked(&self, path: &str) -> Option<Value> {
        let segments = path::parse(path).ok()?;
        path::lookup(&self.tree.borrow(), &segments).cloned()
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.borrow().clone()
    }

    /// Run `f` without recording any reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = self.tracking.suspend();
        f()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_tracking()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn write(&self, path: &str, value: impl Into<Value>) -> Result<WriteOutcome, StoreError> {
        self.write_with(path, value, Value::Null)
    }

    /// Write with a context value that middleware can inspect.
    pub fn write_with(
        &self,
        path: &str,
        value: impl Into<Value>,
        context: Value,
    ) -> Result<WriteOutcome, StoreError> {
        let segments = path::parse(path)?;
        let value = value.into();

        if let Some(queue) = self.batch.borrow_mut().as_mut() {
            queue.insert(path.to_string(), QueuedWrite { value, context });
            return Ok(WriteOutcome::Queued);
        }

        if self.updating.borrow().contains(path) {
            warn!(path, "reentrant write during notification skipped");
            return Ok(WriteOutcome::Reentrant);
        }

        let previous = path::lookup(&self.tree.borrow(), &segments).cloned();
        let value = self.apply_middleware(path, previous.as_ref(), value, &context);
        if previous.as_ref() == Some(&value) {
            trace!(path, "write skipped: value unchanged");
            return Ok(WriteOutcome::Unchanged);
        }

        path::assign(&mut self.tree.borrow_mut(), &segments, value.clone());
        self.notify(&[StoreChange {
            path: path.to_string(),
            value: Some(value),
            previous,
        }])?;
        Ok(WriteOutcome::Written)
    }

    /// Delete the value at `path` and notify its subscribers.
    ///
    /// Removal is applied immediately, even inside a batch.
    pub fn remove(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = path::parse(path)?;
        let previous = path::remove(&mut self.tree.borrow_mut(), &segments);
        if previous.is_some() {
            self.notify(&[StoreChange {
                path: path.to_string(),
                value: None,
                previous: previous.clone(),
            }])?;
        }
        Ok(previous)
    }

    /// Restore the initial tree and notify every subscriber once.
    pub fn reset(&self) {
        *self.tree.borrow_mut() = self.initial.clone();
        let subscribers: IndexMap<SubscriberId, Subscriber> = self
            .internal
            .borrow()
            .values()
            .flat_map(|subs| subs.iter().map(|(id, s)| (*id, s.clone())))
            .collect();
        let listeners: Vec<(Listener, StoreChange)> = self
            .external
            .borrow()
            .iter()
            .flat_map(|(key, entries)| {
                let change = StoreChange {
                    path: key.clone(),
                    value: self.read_untracked(key),
                    previous: None,
                };
                entries.values().map(move |l| (l.clone(), change.clone()))
            })
            .collect();
        debug!(subscribers = subscribers.len(), listeners = listeners.len(), "store reset");
        for subscriber in subscribers.values() {
            run_guarded("subscriber", || subscriber.notify());
        }
        for (listener, change) in &listeners {
            run_guarded("listener", || (listener.callback)(change));
        }
    }

    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(&WriteEvent<'_>) -> Result<Option<Value>, MiddlewareError> + 'static,
    {
        self.middleware.borrow_mut().push(Rc::new(middleware));
    }

    fn apply_middleware(&self, path: &str, old: Option<&Value>, value: Value, context: &Value) -> Value {
        let chain: Vec<Middleware> = self.middleware.borrow().clone();
        if chain.is_empty() {
            return value;
        }
        let snapshot = self.tree.borrow().clone();
        chain.iter().fold(value, |value, middleware| {
            let event = WriteEvent {
                path,
                old_value: old,
                new_value: &value,
                context,
                snapshot: &snapshot,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| middleware(&event))) {
                Ok(Ok(Some(transformed))) => transformed,
                Ok(Ok(None)) => value,
                Ok(Err(err)) => {
                    warn!(path, error = %err, "middleware failed; value left untransformed");
                    value
                }
                Err(payload) => {
                    error!(path, panic = %panic_message(payload.as_ref()), "middleware panicked; value left untransformed");
                    value
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    pub fn is_batching(&self) -> bool {
        self.batch.borrow().is_some()
    }

    /// Run `f` with writes queued, then apply them as one update.
    ///
    /// Nested calls join the outer batch. If `f` panics the batch is closed
    /// and its queued writes are dropped.
    pub fn execute_batch<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.is_batching() {
            return f();
        }
        *self.batch.borrow_mut() = Some(IndexMap::new());
        let guard = BatchGuard { store: self, armed: true };
        let result = f();
        let queue = guard.disarm();
        self.flush_batch(queue);
        result
    }

    /// Like [`Store::execute_batch`] for a deferred body. The batch stays
    /// open until `body` completes.
    pub fn execute_batch_deferred<F>(self: &Rc<Self>, body: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let store = Rc::clone(self);
        async move {
            if store.is_batching() {
                return body.await;
            }
            *store.batch.borrow_mut() = Some(IndexMap::new());
            let guard = BatchGuard { store: &store, armed: true };
            let output = body.await;
            let queue = guard.disarm();
            store.flush_batch(queue);
            output
        }
    }

    fn flush_batch(&self, queue: BatchQueue) {
        let mut changes = Vec::with_capacity(queue.len());
        for (path, QueuedWrite { value, context }) in queue {
            let Ok(segments) = path::parse(&path) else {
                continue;
            };
            if self.updating.borrow().contains(&path) {
                warn!(path = %path, "reentrant batched write skipped");
                continue;
            }
            let previous = path::lookup(&self.tree.borrow(), &segments).cloned();
            let value = self.apply_middleware(&path, previous.as_ref(), value, &context);
            if previous.as_ref() == Some(&value) {
                continue;
            }
            path::assign(&mut self.tree.borrow_mut(), &segments, value.clone());
            changes.push(StoreChange {
                path: path.clone(),
                value: Some(value),
                previous,
            });
        }
        trace!(changed = changes.len(), "batch flushed");
        if changes.is_empty() {
            return;
        }
        if let Err(err) = self.notify(&changes) {
            error!(error = %err, "batch notification aborted");
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Listen for writes at, below or above `path`.
    pub fn subscribe<F>(self: &Rc<Self>, path: &str, callback: F) -> Subscription
    where
        F: Fn(&StoreChange) + 'static,
    {
        self.subscribe_with(path, true, callback)
    }

    /// Listen for writes to exactly `path`.
    pub fn subscribe_exact<F>(self: &Rc<Self>, path: &str, callback: F) -> Subscription
    where
        F: Fn(&StoreChange) + 'static,
    {
        self.subscribe_with(path, false, callback)
    }

    pub fn subscribe_with<F>(self: &Rc<Self>, path: &str, hierarchical: bool, callback: F) -> Subscription
    where
        F: Fn(&StoreChange) + 'static,
    {
        let id = SubscriberId::new();
        self.external
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .insert(
                id,
                Listener {
                    callback: Rc::new(callback),
                    hierarchical,
                },
            );
        Subscription {
            store: Rc::downgrade(self),
            path: path.to_string(),
            id,
        }
    }

    fn unsubscribe_external(&self, path: &str, id: SubscriberId) {
        let mut registry = self.external.borrow_mut();
        if let Some(entries) = registry.get_mut(path) {
            entries.shift_remove(&id);
            if entries.is_empty() {
                registry.shift_remove(path);
            }
        }
    }

    /// Create a tracked computation; it runs once immediately.
    pub fn effect<F>(self: &Rc<Self>, run: F) -> Effect
    where
        F: Fn() + 'static,
    {
        Effect::new(self, run)
    }

    pub(crate) fn subscribe_internal(&self, path: &str, subscriber: Subscriber) {
        self.internal
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .insert(subscriber.id(), subscriber);
    }

    pub(crate) fn unsubscribe_internal(&self, path: &str, id: SubscriberId) {
        let mut registry = self.internal.borrow_mut();
        if let Some(subs) = registry.get_mut(path) {
            subs.shift_remove(&id);
            if subs.is_empty() {
                registry.shift_remove(path);
            }
        }
    }

    /// Number of tracked computations subscribed to exactly `path`.
    pub fn dependents(&self, path: &str) -> usize {
        self.internal.borrow().get(path).map_or(0, IndexMap::len)
    }

    /// Number of external listeners registered on exactly `path`.
    pub fn listeners(&self, path: &str) -> usize {
        self.external.borrow().get(path).map_or(0, IndexMap::len)
    }

    /// Drop every subscription. Used when an engine is disposed.
    pub fn clear_subscriptions(&self) {
        self.internal.borrow_mut().clear();
        self.external.borrow_mut().clear();
    }

    // ------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------

    fn notify(&self, changes: &[StoreChange]) -> Result<(), StoreError> {
        let depth = self.notify_depth.get();
        if depth >= self.max_notify_depth {
            let path = changes.first().map(|c| c.path.clone()).unwrap_or_default();
            error!(path = %path, limit = self.max_notify_depth, "notification depth limit reached");
            return Err(StoreError::NotifyDepthExceeded {
                path,
                limit: self.max_notify_depth,
            });
        }
        self.notify_depth.set(depth + 1);

        {
            let mut updating = self.updating.borrow_mut();
            for change in changes {
                updating.insert(change.path.clone());
            }
        }

        let subscribers = self.collect_internal(changes);
        let listeners = self.collect_external(changes);
        trace!(
            changes = changes.len(),
            subscribers = subscribers.len(),
            listeners = listeners.len(),
            "notifying"
        );

        for subscriber in &subscribers {
            run_guarded("subscriber", || subscriber.notify());
        }
        for (listener, change) in &listeners {
            run_guarded("listener", || (listener.callback)(change));
        }

        {
            let mut updating = self.updating.borrow_mut();
            for change in changes {
                updating.remove(&change.path);
            }
        }
        self.notify_depth.set(depth);
        Ok(())
    }

    /// Exact, then ancestors, then descendants; each subscriber once.
    fn collect_internal(&self, changes: &[StoreChange]) -> Vec<Subscriber> {
        let registry = self.internal.borrow();
        let mut found: IndexMap<SubscriberId, Subscriber> = IndexMap::new();
        let mut take = |subs: &IndexMap<SubscriberId, Subscriber>| {
            for (id, subscriber) in subs {
                found.entry(*id).or_insert_with(|| subscriber.clone());
            }
        };

        for change in changes {
            let written = change.path.as_str();
            if let Some(subs) = registry.get(written) {
                take(subs);
            }
            for ancestor in path::ancestors(written) {
                if let Some(subs) = registry.get(ancestor) {
                    take(subs);
                }
            }
            for (key, subs) in registry.iter() {
                if path::is_descendant(key, written) {
                    take(subs);
                }
            }
        }
        found.into_values().collect()
    }

    /// Matching listeners, each once per pass.
    ///
    /// A listener matched by a single change receives that change. One
    /// matched by several changes of a batch receives a combined change for
    /// its own path, carrying the current value and no previous value.
    fn collect_external(&self, changes: &[StoreChange]) -> Vec<(Listener, StoreChange)> {
        let registry = self.external.borrow();
        let mut found: IndexMap<SubscriberId, (String, Listener, Vec<usize>)> = IndexMap::new();
        let mut take = |key: &str, entries: &IndexMap<SubscriberId, Listener>, index: usize, exact: bool| {
            for (id, listener) in entries.iter().filter(|(_, l)| exact || l.hierarchical) {
                found
                    .entry(*id)
                    .or_insert_with(|| (key.to_string(), listener.clone(), Vec::new()))
                    .2
                    .push(index);
            }
        };

        for (index, change) in changes.iter().enumerate() {
            let written = change.path.as_str();
            if let Some((key, entries)) = registry.get_key_value(written) {
                take(key.as_str(), entries, index, true);
            }
            for ancestor in path::ancestors(written) {
                if let Some((key, entries)) = registry.get_key_value(ancestor) {
                    take(key.as_str(), entries, index, false);
                }
            }
            for (key, entries) in registry.iter() {
                if path::is_descendant(key, written) {
                    take(key.as_str(), entries, index, false);
                }
            }
        }

        found
            .into_values()
            .map(|(key, listener, hits)| {
                let change = match hits.as_slice() {
                    [only] => changes[*only].clone(),
                    _ => StoreChange {
                        value: self.read_untracked(&key),
                        path: key,
                        previous: None,
                    },
                };
                (listener, change)
            })
            .collect()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("tree", &self.tree.borrow())
            .field("internal_paths", &self.internal.borrow().len())
            .field("external_paths", &self.external.borrow().len())
            .field("batching", &self.is_batching())
            .finish()
    }
}

/// Closes an open batch. If dropped while still armed (the batch body
/// panicked or was cancelled) the queued writes are discarded.
struct BatchGuard<'a> {
    store: &'a Store,
    armed: bool,
}

impl BatchGuard<'_> {
    fn disarm(mut self) -> BatchQueue {
        self.armed = false;
        self.store.batch.borrow_mut().take().unwrap_or_default()
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let dropped = self.store.batch.borrow_mut().take().map_or(0, |q| q.len());
            warn!(dropped, "batch aborted; queued writes discarded");
        }
    }
}

/// Handle to an external subscription. Call [`Subscription::unsubscribe`]
/// to remove it; dropping the handle leaves the subscription in place.
#[must_use = "a subscription stays registered until `unsubscribe` is called"]
#[derive(Debug)]
pub struct Subscription {
    store: Weak<Store>,
    path: String,
    id: SubscriberId,
}

impl Subscription {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn unsubscribe(self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe_external(&self.path, self.id);
        }
    }
}

/// Run a callback, catching and logging a panic.
pub(crate) fn run_guarded<R>(what: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(callback = what, panic = %panic_message(payload.as_ref()), "callback panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> (Rc<Cell<usize>>, impl Fn(&StoreChange) + 'static) {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        (count, move |_: &StoreChange| inner.set(inner.get() + 1))
    }

    #[test]
    fn read_returns_default_for_missing_and_invalid_paths() {
        let store = Store::new(json!({"a": {"b": 1}}));
        assert_eq!(store.read("a.b", 0), json!(1));
        assert_eq!(store.read("a.x.y.z", "none"), json!("none"));
        assert_eq!(store.read("", 5), json!(5));
        assert_eq!(store.read("a..b", 5), json!(5));
    }

    #[test]
    fn write_rejects_invalid_paths() {
        let store = Store::new(json!({}));
        assert!(matches!(store.write("", 1), Err(StoreError::InvalidPath { .. })));
        assert!(matches!(store.write("a..b", 1), Err(StoreError::InvalidPath { .. })));
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let store = Store::new(json!({}));
        let (count, cb) = counter();
        let _sub = store.subscribe("user", cb);

        assert_eq!(store.write("user", json!({"name": "ada"})).unwrap(), WriteOutcome::Written);
        assert_eq!(store.write("user", json!({"name": "ada"})).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn hierarchical_and_exact_listeners() {
        let store = Store::new(json!({}));
        let (tree_count, tree_cb) = counter();
        let (exact_count, exact_cb) = counter();
        let _tree = store.subscribe("todos", tree_cb);
        let _exact = store.subscribe_exact("todos", exact_cb);

        store.write("todos.1.done", true).unwrap();
        assert_eq!(tree_count.get(), 1);
        assert_eq!(exact_count.get(), 0);

        store.write("todos", json!([])).unwrap();
        assert_eq!(tree_count.get(), 2);
        assert_eq!(exact_count.get(), 1);
    }

    #[test]
    fn unsubscribe_removes_empty_path_entry() {
        let store = Store::new(json!({}));
        let (count, cb) = counter();
        let sub = store.subscribe("a", cb);
        assert_eq!(store.listeners("a"), 1);

        sub.unsubscribe();
        assert_eq!(store.listeners("a"), 0);
        store.write("a", 1).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn batch_coalesces_writes_per_path() {
        let store = Store::new(json!({}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe("p", move |change| sink.borrow_mut().push(change.value.clone()));

        let outcome = store.execute_batch(|| {
            assert_eq!(store.write("p", "a").unwrap(), WriteOutcome::Queued);
            store.write("p", "b").unwrap();
            42
        });

        assert_eq!(outcome, 42);
        assert_eq!(*seen.borrow(), vec![Some(json!("b"))]);
        assert!(!store.is_batching());
    }

    #[test]
    fn batch_notifies_ancestor_listener_once() {
        let store = Store::new(json!({}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe("a", move |change| sink.borrow_mut().push(change.clone()));

        store.execute_batch(|| {
            store.write("a.b", 1).unwrap();
            store.write("a.c", 2).unwrap();
        });

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "a");
        assert_eq!(seen[0].value, Some(json!({"b": 1, "c": 2})));
        assert_eq!(seen[0].previous, None);
    }

    #[test]
    fn single_match_in_batch_keeps_the_written_change() {
        let store = Store::new(json!({}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe("a", move |change| sink.borrow_mut().push(change.path.clone()));

        store.execute_batch(|| {
            store.write("a.b", 1).unwrap();
            store.write("z", 2).unwrap();
        });
        assert_eq!(*seen.borrow(), vec!["a.b".to_string()]);
    }

    #[test]
    fn deferred_batch_stays_open_across_await() {
        use crate::reactive::Deferred;
        use futures_util::task::noop_waker_ref;
        use futures_util::FutureExt;
        use std::task::{Context, Poll};

        let store = Store::new(json!({}));
        let (count, cb) = counter();
        let _sub = store.subscribe("form", cb);
        let (gate, resolver) = Deferred::<()>::channel();

        let writer = store.clone();
        let mut batch = Box::pin(store.execute_batch_deferred(async move {
            writer.write("form.name", "ada").unwrap();
            let _ = gate.settle().await;
            writer.write("form.age", 36).unwrap();
            "saved"
        }));
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(batch.poll_unpin(&mut cx).is_pending());
        assert!(store.is_batching());
        assert_eq!(store.read_untracked("form.name"), None);
        assert_eq!(count.get(), 0);

        resolver.resolve(());
        assert_eq!(batch.poll_unpin(&mut cx), Poll::Ready("saved"));
        assert!(!store.is_batching());
        assert_eq!(store.read_untracked("form"), Some(json!({"name": "ada", "age": 36})));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn panicking_batch_is_closed_and_discarded() {
        let store = Store::new(json!({}));
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            store.execute_batch(|| {
                store.write("p", 1).unwrap();
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert!(!store.is_batching());
        assert_eq!(store.read_untracked("p"), None);
    }

    #[test]
    fn middleware_transforms_and_failures_are_ignored() {
        let store = Store::new(json!({}));
        store.use_middleware(|event| {
            if event.path == "name" {
                Ok(event.new_value.as_str().map(|s| json!(s.to_uppercase())))
            } else {
                Ok(None)
            }
        });
        store.use_middleware(|_| Err(MiddlewareError("nope".into())));
        store.use_middleware(|_| panic!("middleware bug"));

        store.write("name", "ada").unwrap();
        assert_eq!(store.read_untracked("name"), Some(json!("ADA")));
    }

    #[test]
    fn middleware_sees_context_and_snapshot() {
        let store = Store::new(json!({"count": 1}));
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        store.use_middleware(move |event| {
            *sink.borrow_mut() = Some((event.context.clone(), event.snapshot.clone()));
            Ok(None)
        });

        store.write_with("count", 2, json!({"source": "sync"})).unwrap();
        let (context, snapshot) = seen.borrow().clone().unwrap();
        assert_eq!(context, json!({"source": "sync"}));
        assert_eq!(snapshot, json!({"count": 1}));
    }

    #[test]
    fn reentrant_write_is_skipped() {
        let store = Store::new(json!({}));
        let inner = Rc::downgrade(&store);
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = outcomes.clone();
        let _sub = store.subscribe("loop", move |_| {
            if let Some(store) = inner.upgrade() {
                sink.borrow_mut().push(store.write("loop", 99).unwrap());
            }
        });

        store.write("loop", 1).unwrap();
        assert_eq!(*outcomes.borrow(), vec![WriteOutcome::Reentrant]);
        assert_eq!(store.read_untracked("loop"), Some(json!(1)));
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let store = Store::new(json!({}));
        let (count, cb) = counter();
        let _bad = store.subscribe("x", |_| panic!("listener bug"));
        let _good = store.subscribe("x", cb);

        store.write("x", 1).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn remove_and_reset() {
        let store = Store::new(json!({"keep": true}));
        store.write("tmp.value", 3).unwrap();
        assert_eq!(store.remove("tmp.value").unwrap(), Some(json!(3)));
        assert_eq!(store.read("tmp.value", "gone"), json!("gone"));

        let (count, cb) = counter();
        let _sub = store.subscribe("keep", cb);
        store.write("keep", false).unwrap();
        store.reset();
        assert_eq!(store.snapshot(), json!({"keep": true}));
        assert_eq!(count.get(), 2);
    }
}
