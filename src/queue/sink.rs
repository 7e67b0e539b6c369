use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::callback::Callback;
use crate::task::{Task, TaskContext};

use super::CoreInner;

/// One submission path into a queue.
///
/// A lane pairs the shared core with the offer strategy for its slice of the
/// storage. A queue with several sinks (see
/// [`TwoLevelTaskQueue`](super::TwoLevelTaskQueue)) builds one lane per sink,
/// all bound to the same lock and conditions.
pub(crate) struct Lane<D> {
    pub(crate) core: Arc<CoreInner<D>>,
    pub(crate) offer: fn(&mut D, Task) -> Result<(), Task>,
}

pub(crate) trait SinkChannel: Send + Sync {
    fn offer_task(&self, task: Task) -> bool;
    fn put_task(&self, task: Task);
}

impl<D: Send + 'static> SinkChannel for Lane<D> {
    fn offer_task(&self, task: Task) -> bool {
        let core = &*self.core;
        let mut storage = core.storage.lock();
        if core.running.load(Ordering::Acquire) {
            return match (self.offer)(&mut storage, task) {
                Ok(()) => {
                    core.not_empty.notify_one();
                    true
                }
                // Full: the task and its callback are dropped without any
                // delivery, leaving the retry decision to the caller.
                Err(_rejected) => false,
            };
        }
        drop(storage);
        task.terminate();
        true
    }

    fn put_task(&self, mut task: Task) {
        let core = &*self.core;
        let mut storage = core.storage.lock();
        while core.running.load(Ordering::Acquire) {
            match (self.offer)(&mut storage, task) {
                Ok(()) => {
                    core.not_empty.notify_one();
                    return;
                }
                Err(rejected) => {
                    task = rejected;
                    core.not_full.wait(&mut storage);
                }
            }
        }
        drop(storage);
        task.terminate();
    }
}

/// Producer-side facade of a task queue.
///
/// Sinks are handed out by their queue and can be cloned freely; every clone
/// feeds the same queue. Submission wraps the computation and callback into a
/// [`Task`](crate::Task) and enqueues it under the queue lock.
///
/// The return contract of [`offer`](TaskSink::offer) distinguishes two very
/// different "no": `false` means the queue is full and nothing was done with
/// the callback, so the caller may retry or abandon; `true` after termination
/// means the callback contract is already being honored, because the sink
/// delivered `terminated()` on the spot.
#[derive(Clone)]
pub struct TaskSink {
    channel: Arc<dyn SinkChannel>,
}

impl TaskSink {
    pub(crate) fn new(channel: Arc<dyn SinkChannel>) -> Self {
        Self { channel }
    }

    /// Submits a computation if the queue has room.
    ///
    /// Returns `false` when the queue is overflowing; no callback signal will
    /// ever be delivered for the rejected computation. Returns `true` when
    /// the computation was accepted, or when the queue is terminated, in
    /// which case `terminated()` has already been invoked on the callback.
    pub fn offer<R, C>(&self, computation: C, callback: Callback<R>) -> bool
    where
        R: Send + 'static,
        C: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        self.channel
            .offer_task(Task::new(computation, callback, None))
    }

    /// [`offer`](TaskSink::offer) with a context attachment the queue
    /// discipline may inspect.
    pub fn offer_with_context<R, C>(
        &self,
        context: TaskContext,
        computation: C,
        callback: Callback<R>,
    ) -> bool
    where
        R: Send + 'static,
        C: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        self.channel
            .offer_task(Task::new(computation, callback, Some(context)))
    }

    /// Submits a computation, blocking while the queue is full.
    ///
    /// If the queue terminates before space frees up, the computation is
    /// dropped and `terminated()` is invoked on the callback.
    pub fn put<R, C>(&self, computation: C, callback: Callback<R>)
    where
        R: Send + 'static,
        C: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        self.channel.put_task(Task::new(computation, callback, None));
    }

    /// [`put`](TaskSink::put) with a context attachment the queue discipline
    /// may inspect.
    pub fn put_with_context<R, C>(&self, context: TaskContext, computation: C, callback: Callback<R>)
    where
        R: Send + 'static,
        C: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        self.channel
            .put_task(Task::new(computation, callback, Some(context)));
    }
}
