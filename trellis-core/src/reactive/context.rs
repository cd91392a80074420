//! Tracking Scopes
//!
//! The tracking stack records which computation is currently running so that
//! store reads can be attributed to it. Each store owns its own stack; there
//! is no ambient global.
//!
//! # Implementation
//!
//! Entering a scope pushes an entry; the returned guard pops it on drop, so
//! the stack stays balanced even if the computation panics. Nested scopes are
//! supported: reads always land in the innermost entry.
//!
//! A *suspended* entry records nothing. Component boundaries and DOM patching
//! run suspended so their reads do not leak into the enclosing computation.

use std::cell::RefCell;

use indexmap::IndexSet;
use tracing::error;

use super::SubscriberId;

#[derive(Debug)]
struct ScopeEntry {
    subscriber_id: Option<SubscriberId>,
    /// Paths read during this scope, in first-read order.
    dependencies: IndexSet<String>,
}

#[derive(Debug)]
pub(crate) struct TrackingStack {
    entries: RefCell<Vec<ScopeEntry>>,
    max_depth: usize,
}

impl TrackingStack {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            max_depth,
        }
    }

    /// Enter a tracking scope for `subscriber_id`.
    ///
    /// Past the depth limit the scope is entered suspended: the computation
    /// still runs but subscribes to nothing.
    pub(crate) fn enter(&self, subscriber_id: SubscriberId) -> ScopeGuard<'_> {
        let depth = self.depth();
        let subscriber_id = if depth >= self.max_depth {
            error!(depth, limit = self.max_depth, "tracking depth limit reached; running untracked");
            None
        } else {
            Some(subscriber_id)
        };
        self.push(subscriber_id)
    }

    /// Enter a scope in which reads are not recorded.
    pub(crate) fn suspend(&self) -> ScopeGuard<'_> {
        self.push(None)
    }

    fn push(&self, subscriber_id: Option<SubscriberId>) -> ScopeGuard<'_> {
        self.entries.borrow_mut().push(ScopeEntry {
            subscriber_id,
            dependencies: IndexSet::new(),
        });
        ScopeGuard {
            stack: self,
            subscriber_id,
            finished: false,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether reads are currently being recorded.
    pub(crate) fn is_tracking(&self) -> bool {
        self.entries
            .borrow()
            .last()
            .is_some_and(|entry| entry.subscriber_id.is_some())
    }

    pub(crate) fn current_subscriber(&self) -> Option<SubscriberId> {
        self.entries.borrow().last().and_then(|entry| entry.subscriber_id)
    }

    /// Record a read of `path` in the innermost active scope.
    pub(crate) fn track(&self, path: &str) {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.last_mut() {
            if entry.subscriber_id.is_some() && !entry.dependencies.contains(path) {
                entry.dependencies.insert(path.to_string());
            }
        }
    }

    fn pop(&self, expected: Option<SubscriberId>) -> IndexSet<String> {
        let popped = self.entries.borrow_mut().pop();
        match popped {
            Some(entry) => {
                debug_assert_eq!(
                    entry.subscriber_id, expected,
                    "tracking scope mismatch: expected {:?}, got {:?}",
                    expected, entry.subscriber_id
                );
                entry.dependencies
            }
            None => IndexSet::new(),
        }
    }
}

/// Pops its scope when dropped or finished.
pub(crate) struct ScopeGuard<'a> {
    stack: &'a TrackingStack,
    subscriber_id: Option<SubscriberId>,
    finished: bool,
}

impl ScopeGuard<'_> {
    /// Close the scope and return the paths read during it.
    pub(crate) fn finish(mut self) -> IndexSet<String> {
        self.finished = true;
        self.stack.pop(self.subscriber_id)
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stack.pop(self.subscriber_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_tracks_subscriber() {
        let stack = TrackingStack::new(8);
        let id = SubscriberId::new();

        assert!(!stack.is_tracking());
        assert!(stack.current_subscriber().is_none());

        {
            let _scope = stack.enter(id);
            assert!(stack.is_tracking());
            assert_eq!(stack.current_subscriber(), Some(id));
        }

        assert!(!stack.is_tracking());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn scope_collects_each_path_once() {
        let stack = TrackingStack::new(8);
        let scope = stack.enter(SubscriberId::new());

        stack.track("a");
        stack.track("b");
        stack.track("a");

        let deps: Vec<_> = scope.finish().into_iter().collect();
        assert_eq!(deps, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn nested_scopes_are_isolated() {
        let stack = TrackingStack::new(8);
        let outer = stack.enter(SubscriberId::new());
        stack.track("outer");

        let inner = stack.enter(SubscriberId::new());
        stack.track("inner");
        assert_eq!(inner.finish().len(), 1);

        let outer_deps = outer.finish();
        assert!(outer_deps.contains("outer"));
        assert!(!outer_deps.contains("inner"));
    }

    #[test]
    fn suspended_scope_records_nothing() {
        let stack = TrackingStack::new(8);
        let outer = stack.enter(SubscriberId::new());
        {
            let _paused = stack.suspend();
            assert!(!stack.is_tracking());
            stack.track("hidden");
        }
        stack.track("visible");
        let deps = outer.finish();
        assert!(!deps.contains("hidden"));
        assert!(deps.contains("visible"));
    }

    #[test]
    fn depth_limit_degrades_to_untracked() {
        let stack = TrackingStack::new(1);
        let _outer = stack.enter(SubscriberId::new());
        let inner = stack.enter(SubscriberId::new());
        assert!(!stack.is_tracking());
        stack.track("ignored");
        assert!(inner.finish().is_empty());
    }
}
