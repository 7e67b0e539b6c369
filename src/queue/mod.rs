//! Task queues and the locking protocol they share.
//!
//! A queue is the meeting point of three kinds of threads: producers
//! submitting work through a [`TaskSink`], workers pulling tasks out, and the
//! thread closing the service. [`QueueCore`] owns the shared protocol (one
//! mutex, two condition variables, a running flag); a [`Discipline`] supplies
//! the ordering strategy. The crate ships four disciplines: unbounded FIFO,
//! bounded ring, two-level priority, and bucket-serialized splitting.

pub mod ring;
mod sink;

mod bounded;
mod splitting;
mod two_level;
mod unbounded;

pub use bounded::BoundedTaskQueue;
pub use ring::RingBuffer;
pub use sink::TaskSink;
pub use splitting::SplittingTaskQueue;
pub use two_level::TwoLevelTaskQueue;
pub use unbounded::UnboundedTaskQueue;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::task::{Task, TaskContext};
use sink::Lane;

/// Ordering strategy plugged into a [`QueueCore`].
///
/// Every method is invoked with the queue lock held, so implementations never
/// synchronize on their own.
pub trait Discipline: Send + 'static {
    /// Whether a worker calling [`QueueCore::take`] would come up empty.
    ///
    /// "Empty" means "nothing pollable right now", which for some disciplines
    /// is weaker than "contains no tasks".
    fn is_empty(&self) -> bool;

    /// Removes the next pollable task.
    fn poll(&mut self) -> Option<Task>;

    /// Moves every stored task into `out`, in queue order, leaving the
    /// discipline empty.
    fn drain_into(&mut self, out: &mut Vec<Task>);

    /// Invoked after a previously polled task finished running.
    ///
    /// Returning `true` signals that the discipline's state changed in a way
    /// that may unblock waiting producers or consumers; the core then wakes
    /// both sides for a re-check.
    fn after_run(&mut self, context: Option<&TaskContext>) -> bool {
        let _ = context;
        false
    }
}

// The plain FIFO discipline used by the unbounded queue and recombined by
// the richer ones.
impl Discipline for VecDeque<Task> {
    fn is_empty(&self) -> bool {
        VecDeque::is_empty(self)
    }

    fn poll(&mut self) -> Option<Task> {
        self.pop_front()
    }

    fn drain_into(&mut self, out: &mut Vec<Task>) {
        out.extend(self.drain(..));
    }
}

/// The face a queue shows to [`AsyncService`](crate::service::AsyncService).
///
/// Implemented generically for [`QueueCore`] and, by delegation, for every
/// concrete queue in this module. Custom queues built on [`QueueCore`] get
/// the implementation for free on the core and only need to forward.
pub trait TaskQueue: Send + Sync + 'static {
    /// Blocks until a task is pollable, returning `None` once the queue is
    /// terminated and nothing remains to poll.
    fn take(&self) -> Option<Task>;

    /// Reports that a task obtained from [`take`](TaskQueue::take) finished
    /// running, letting the discipline update its post-run state.
    fn task_completed(&self, context: Option<&TaskContext>);

    /// Removes every stored task.
    fn drain(&self) -> Vec<Task>;

    /// Stops accepting submissions and wakes every blocked producer and
    /// consumer.
    fn terminate(&self);

    /// Whether the queue still accepts submissions.
    fn is_running(&self) -> bool;
}

pub(crate) struct CoreInner<D> {
    /// Written only with the storage lock held; may be read without it.
    pub(crate) running: AtomicBool,
    pub(crate) storage: Mutex<D>,
    pub(crate) not_full: Condvar,
    pub(crate) not_empty: Condvar,
}

/// Shared synchronization core of a task queue.
///
/// Owns the single mutex guarding the discipline storage, the `not_full` and
/// `not_empty` conditions, and the running flag, and hands out [`TaskSink`]s
/// bound to that protocol.
pub struct QueueCore<D> {
    inner: Arc<CoreInner<D>>,
}

impl<D: Discipline> QueueCore<D> {
    pub fn new(discipline: D) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                running: AtomicBool::new(true),
                storage: Mutex::new(discipline),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Creates a sink feeding this core through `offer`.
    ///
    /// The strategy runs with the queue lock held and hands the task back
    /// when the discipline cannot accept it right now.
    pub fn sink(&self, offer: fn(&mut D, Task) -> Result<(), Task>) -> TaskSink {
        TaskSink::new(Arc::new(Lane {
            core: Arc::clone(&self.inner),
            offer,
        }))
    }

    pub fn take(&self) -> Option<Task> {
        let inner = &*self.inner;
        let mut storage = inner.storage.lock();
        while storage.is_empty() && inner.running.load(Ordering::Acquire) {
            inner.not_empty.wait(&mut storage);
        }
        let task = storage.poll();
        if task.is_some() {
            inner.not_full.notify_one();
        }
        task
    }

    pub fn task_completed(&self, context: Option<&TaskContext>) {
        let inner = &*self.inner;
        let mut storage = inner.storage.lock();
        if storage.after_run(context) {
            inner.not_empty.notify_all();
            inner.not_full.notify_all();
        }
    }

    pub fn drain(&self) -> Vec<Task> {
        let mut drained = Vec::new();
        self.inner.storage.lock().drain_into(&mut drained);
        drained
    }

    pub fn terminate(&self) {
        let inner = &*self.inner;
        let _storage = inner.storage.lock();
        inner.running.store(false, Ordering::Release);
        inner.not_empty.notify_all();
        inner.not_full.notify_all();
        tracing::trace!("task queue terminated");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }
}

impl<D: Discipline> TaskQueue for QueueCore<D> {
    fn take(&self) -> Option<Task> {
        QueueCore::take(self)
    }

    fn task_completed(&self, context: Option<&TaskContext>) {
        QueueCore::task_completed(self, context)
    }

    fn drain(&self) -> Vec<Task> {
        QueueCore::drain(self)
    }

    fn terminate(&self) {
        QueueCore::terminate(self)
    }

    fn is_running(&self) -> bool {
        QueueCore::is_running(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use std::thread;
    use std::time::Duration;

    fn noop_task() -> Task {
        Task::new(|| Ok(()), Callback::new(), None)
    }

    #[test]
    fn take_returns_queued_task() {
        let core = QueueCore::new(VecDeque::new());
        core.inner.storage.lock().push_back(noop_task());
        assert!(core.take().is_some());
        assert!(core.inner.storage.lock().is_empty());
    }

    #[test]
    fn terminate_unblocks_empty_take() {
        let core = Arc::new(QueueCore::new(VecDeque::new()));
        let waiter = {
            let core = Arc::clone(&core);
            thread::spawn(move || core.take())
        };
        // Give the worker a moment to park on not_empty.
        thread::sleep(Duration::from_millis(20));
        core.terminate();
        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn take_after_terminate_still_drains_stored_tasks() {
        let core = QueueCore::new(VecDeque::new());
        core.inner.storage.lock().push_back(noop_task());
        core.terminate();
        assert!(core.take().is_some());
        assert!(core.take().is_none());
    }

    #[test]
    fn drain_empties_storage() {
        let core = QueueCore::new(VecDeque::new());
        {
            let mut storage = core.inner.storage.lock();
            storage.push_back(noop_task());
            storage.push_back(noop_task());
        }
        assert_eq!(core.drain().len(), 2);
        assert!(core.drain().is_empty());
    }
}
