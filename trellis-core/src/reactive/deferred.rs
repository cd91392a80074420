//! Deferred Values
//!
//! A [`Deferred`] is a value that may not be available yet: a pending
//! request, a lazily loaded component, a value resolved by some other part of
//! the application. It moves through one state machine:
//!
//! ```text
//! Pending ──▶ Resolved(value)
//!        └──▶ Rejected(reason)
//! ```
//!
//! There is no cancelled state. A deferred can be backed by a future (polled
//! by the engine's task queue) or resolved by hand through a [`Resolver`].
//! Clones share the same slot, so every consumer sees the same outcome.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::error::{panic_message, Rejected};

pub type Settled<T> = Result<T, Rejected>;

enum Slot<T: 'static> {
    /// Backed by a future; `None` while the future is being polled.
    Running(Option<LocalBoxFuture<'static, Settled<T>>>),
    /// Waiting for a [`Resolver`].
    Awaiting,
    Settled(Settled<T>),
}

pub struct Deferred<T: 'static = serde_json::Value> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T: 'static> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

/// Identity comparison: two handles are equal when they share a slot.
impl<T: 'static> PartialEq for Deferred<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// A deferred driven by `future`.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Settled<T>> + 'static,
    {
        Self::from_slot(Slot::Running(Some(future.boxed_local())))
    }

    pub fn resolved(value: T) -> Self {
        Self::from_slot(Slot::Settled(Ok(value)))
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::from_slot(Slot::Settled(Err(Rejected::new(reason))))
    }

    /// A pending deferred and the handle that settles it.
    pub fn channel() -> (Self, Resolver<T>) {
        let deferred = Self::from_slot(Slot::Awaiting);
        let resolver = Resolver {
            slot: Rc::clone(&deferred.slot),
        };
        (deferred, resolver)
    }

    fn from_slot(slot: Slot<T>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(slot)),
        }
    }

    /// The outcome, if already settled. Does not poll.
    pub fn peek(&self) -> Option<Settled<T>> {
        match &*self.slot.borrow() {
            Slot::Settled(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(&*self.slot.borrow(), Slot::Settled(_))
    }

    /// A future that completes with the outcome.
    pub fn settle(&self) -> Settle<T> {
        Settle {
            deferred: self.clone(),
        }
    }

    fn poll_slot(&self, cx: &mut Context<'_>) -> Poll<Settled<T>> {
        let running = {
            let mut slot = self.slot.borrow_mut();
            match &mut *slot {
                Slot::Settled(outcome) => return Poll::Ready(outcome.clone()),
                Slot::Awaiting | Slot::Running(None) => return Poll::Pending,
                Slot::Running(future) => future.take(),
            }
        };
        let Some(mut future) = running else {
            return Poll::Pending;
        };
        let polled = panic::catch_unwind(AssertUnwindSafe(|| future.poll_unpin(cx)))
            .unwrap_or_else(|payload| Poll::Ready(Err(Rejected::new(panic_message(payload.as_ref())))));
        match polled {
            Poll::Ready(outcome) => {
                *self.slot.borrow_mut() = Slot::Settled(outcome.clone());
                Poll::Ready(outcome)
            }
            Poll::Pending => {
                let mut slot = self.slot.borrow_mut();
                // A resolver may have won the race while we were polling.
                if matches!(&*slot, Slot::Running(None)) {
                    *slot = Slot::Running(Some(future));
                }
                Poll::Pending
            }
        }
    }
}

impl<T: 'static> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.borrow() {
            Slot::Running(_) | Slot::Awaiting => "pending",
            Slot::Settled(Ok(_)) => "resolved",
            Slot::Settled(Err(_)) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

/// Future returned by [`Deferred::settle`].
pub struct Settle<T: 'static> {
    deferred: Deferred<T>,
}

impl<T: Clone + 'static> Future for Settle<T> {
    type Output = Settled<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.deferred.poll_slot(cx)
    }
}

/// Settles a deferred created by [`Deferred::channel`]. Only the first call
/// has an effect.
pub struct Resolver<T: 'static> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T: 'static> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.settle(Err(Rejected::new(reason)));
    }

    fn settle(self, outcome: Settled<T>) {
        let mut slot = self.slot.borrow_mut();
        if !matches!(&*slot, Slot::Settled(_)) {
            *slot = Slot::Settled(outcome);
        }
    }
}

impl<T: 'static> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::task::noop_waker_ref;
    use serde_json::json;

    fn poll_once<T: Clone + 'static>(d: &Deferred<T>) -> Poll<Settled<T>> {
        let mut cx = Context::from_waker(noop_waker_ref());
        d.settle().poll_unpin(&mut cx)
    }

    #[test]
    fn resolved_is_immediately_settled() {
        let d = Deferred::resolved(json!(1));
        assert!(!d.is_pending());
        assert_eq!(d.peek(), Some(Ok(json!(1))));
    }

    #[test]
    fn channel_settles_once() {
        let (d, resolver) = Deferred::<i32>::channel();
        assert!(d.is_pending());
        assert!(poll_once(&d).is_pending());

        resolver.resolve(7);
        assert_eq!(poll_once(&d), Poll::Ready(Ok(7)));
        assert_eq!(d.clone().peek(), Some(Ok(7)));
    }

    #[test]
    fn future_backed_deferred_caches_outcome() {
        let d: Deferred<i32> = Deferred::new(async { Err(Rejected::new("offline")) });
        assert!(d.is_pending());
        assert_eq!(poll_once(&d), Poll::Ready(Err(Rejected::new("offline"))));
        assert_eq!(d.peek(), Some(Err(Rejected::new("offline"))));
    }

    fn loader_fails() -> bool {
        true
    }

    #[test]
    fn panicking_future_rejects() {
        let d: Deferred<i32> = Deferred::new(async {
            if loader_fails() {
                panic!("loader crashed");
            }
            Ok(1)
        });
        assert_eq!(poll_once(&d), Poll::Ready(Err(Rejected::new("loader crashed"))));
        assert!(!d.is_pending());
    }

    #[test]
    fn clones_compare_by_identity() {
        let a = Deferred::resolved(1);
        let b = Deferred::resolved(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
