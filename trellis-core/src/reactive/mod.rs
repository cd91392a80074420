//! Reactive Primitives
//!
//! This module implements the state side of the engine: the path-addressed
//! store, tracked computations, deferred values and the continuation queue.
//!
//! # Concepts
//!
//! ## Store
//!
//! The [`Store`] owns a JSON state tree. Reading a path inside a tracking
//! scope registers that path as a dependency of the running computation.
//! Writing a path notifies everything that read it, its ancestors or its
//! descendants.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs when the state it read changes.
//! Its dependency set is rebuilt on every run, so a computation only reacts to
//! the paths its current branch actually reads.
//!
//! ## Deferred values
//!
//! A [`Deferred`] is a value that is not available yet. Work that waits on one
//! is queued on a [`TaskQueue`] and advanced only by an explicit flush.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded (`Rc`/`RefCell`). The tracking stack lives in
//! the store rather than in a thread-local, so independent stores never see
//! each other's reads.

mod context;
mod deferred;
mod effect;
mod path;
mod scheduler;
mod store;
mod subscriber;

pub use deferred::{Deferred, Resolver, Settle, Settled};
pub use effect::Effect;
pub use scheduler::{FlushReport, TaskId, TaskQueue};
pub use store::{Middleware, Store, Subscription, WriteEvent, WriteOutcome};
pub use subscriber::{StoreChange, Subscriber, SubscriberId};

pub(crate) use store::run_guarded;
