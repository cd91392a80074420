//! Continuation Scheduler
//!
//! Work that has to wait for a deferred value (swapping a placeholder,
//! running `on_mount` after attachment) is queued here as a task. Nothing runs
//! implicitly: tasks make progress only when [`TaskQueue::flush`] is called,
//! which the engine exposes as its single drain point.
//!
//! # Algorithm
//!
//! `flush` polls every queued task once, in spawn order, with a no-op waker.
//! Finished tasks are dropped; unfinished ones go back on the queue. Because
//! one task settling can unblock another (or spawn new ones), rounds repeat
//! until a round completes nothing and spawns nothing.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::task::{Context, Poll};

use futures_util::future::LocalBoxFuture;
use futures_util::task::noop_waker_ref;
use futures_util::FutureExt;
use tracing::{error, trace};

use crate::error::panic_message;

/// Identifies a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

struct Task {
    id: TaskId,
    future: LocalBoxFuture<'static, ()>,
}

/// Outcome of one [`TaskQueue::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks still waiting on an unsettled value.
    pub pending: usize,
}

/// Clears the flushing flag even when a flush unwinds.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Default)]
pub struct TaskQueue {
    queue: RefCell<VecDeque<Task>>,
    next_id: Cell<u64>,
    flushing: Cell<bool>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a continuation. It first runs at the next flush.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = TaskId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.queue.borrow_mut().push_back(Task {
            id,
            future: future.boxed_local(),
        });
        id
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Poll queued tasks until no more progress can be made.
    ///
    /// A flush requested from inside a running task returns immediately; the
    /// outer flush picks up anything the task queued. A task that panics is
    /// logged and dropped; the rest of the queue still runs.
    pub fn flush(&self) -> FlushReport {
        if self.flushing.replace(true) {
            return FlushReport {
                completed: 0,
                pending: self.pending(),
            };
        }
        let _guard = FlushGuard(&self.flushing);

        let mut cx = Context::from_waker(noop_waker_ref());
        let mut report = FlushReport::default();
        loop {
            let round: VecDeque<Task> = std::mem::take(&mut *self.queue.borrow_mut());
            if round.is_empty() {
                break;
            }
            let polled = round.len();
            let mut waiting = VecDeque::with_capacity(polled);
            let mut completed = 0;
            for mut task in round {
                match panic::catch_unwind(AssertUnwindSafe(|| task.future.poll_unpin(&mut cx))) {
                    Ok(Poll::Ready(())) => {
                        trace!(task = task.id.0, "task completed");
                        completed += 1;
                    }
                    Ok(Poll::Pending) => waiting.push_back(task),
                    Err(payload) => {
                        error!(task = task.id.0, panic = %panic_message(payload.as_ref()), "task panicked");
                        completed += 1;
                    }
                }
            }
            report.completed += completed;

            let mut queue = self.queue.borrow_mut();
            let spawned = queue.len();
            // Keep spawn order: survivors of this round go ahead of new tasks.
            waiting.extend(queue.drain(..));
            *queue = waiting;
            if completed == 0 && spawned == 0 {
                break;
            }
        }

        report.pending = self.pending();
        report
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Deferred;
    use std::rc::Rc;

    #[test]
    fn ready_tasks_complete_on_flush() {
        let queue = TaskQueue::new();
        let ran = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            queue.spawn(async move { ran.set(ran.get() + 1) });
        }
        assert_eq!(ran.get(), 0);

        let report = queue.flush();
        assert_eq!(report, FlushReport { completed: 3, pending: 0 });
        assert_eq!(ran.get(), 3);
    }

    #[test]
    fn waiting_task_survives_until_settled() {
        let queue = TaskQueue::new();
        let (value, resolver) = Deferred::<i32>::channel();
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        queue.spawn(async move {
            if let Ok(v) = value.settle().await {
                sink.set(v);
            }
        });

        assert_eq!(queue.flush().pending, 1);
        resolver.resolve(9);
        assert_eq!(queue.flush(), FlushReport { completed: 1, pending: 0 });
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn tasks_spawned_during_flush_run_in_same_flush() {
        let queue = Rc::new(TaskQueue::new());
        let ran = Rc::new(Cell::new(false));
        let (inner_queue, inner_ran) = (queue.clone(), ran.clone());
        queue.spawn(async move {
            inner_queue.spawn(async move { inner_ran.set(true) });
        });

        let report = queue.flush();
        assert_eq!(report.completed, 2);
        assert!(ran.get());
    }

    #[test]
    fn panicking_task_does_not_wedge_the_queue() {
        let queue = TaskQueue::new();
        queue.spawn(async { panic!("continuation blew up"); });
        assert_eq!(queue.flush(), FlushReport { completed: 1, pending: 0 });

        let ran = Rc::new(Cell::new(false));
        let sink = ran.clone();
        queue.spawn(async move { sink.set(true) });
        assert_eq!(queue.flush(), FlushReport { completed: 1, pending: 0 });
        assert!(ran.get());
    }
}
