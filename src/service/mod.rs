//! The service binding a task queue to a worker pool.

mod barrier;
pub mod pool;
pub mod threading;


pub use pool::{CloseError, WorkerPool};
pub use threading::{Threading, WorkerFactory};

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::queue::TaskQueue;

/// Asynchronous task-execution service.
///
/// Binds a task queue to a fixed pool of worker threads. Producers submit
/// computations through the queue's sinks; each worker repeatedly takes one
/// task, runs it without holding the queue lock, and reports the outcome
/// through the task's callback.
///
/// ```no_run
/// use std::time::Duration;
/// use taskmill::{AsyncService, Callback, Threading, UnboundedTaskQueue};
///
/// let mut service = AsyncService::new(
///     UnboundedTaskQueue::new(),
///     Threading::named(2, |index| format!("worker-{index}")),
///     Duration::from_secs(5),
/// )?;
///
/// service.queue().sink().offer(
///     || Ok(2 + 2),
///     Callback::new().on_success(|sum| println!("{sum}")),
/// );
///
/// service.close();
/// # Ok::<(), std::io::Error>(())
/// ```
///
/// Closing stops admissions, gives workers up to the termination timeout to
/// finish what is queued, and then delivers `terminated()` to every task
/// still waiting, so each accepted task receives exactly one terminal
/// callback signal. Dropping the service closes it.
pub struct AsyncService<Q: TaskQueue> {
    queue: Arc<Q>,
    pool: WorkerPool,
    termination_timeout: Duration,
    closed: bool,
}

impl<Q: TaskQueue> AsyncService<Q> {
    /// Starts a service draining `queue` on the threads described by
    /// `threading`.
    ///
    /// `termination_timeout` bounds how long [`close`](AsyncService::close)
    /// waits for workers to finish leftover work before draining it.
    pub fn new(queue: Q, threading: Threading, termination_timeout: Duration) -> io::Result<Self> {
        let queue = Arc::new(queue);
        let pool = WorkerPool::new(
            {
                let queue = Arc::clone(&queue);
                move || worker_iteration(&*queue)
            },
            threading.thread_count(),
            &threading,
            {
                let queue = Arc::clone(&queue);
                move || queue.terminate()
            },
        )?;
        Ok(Self {
            queue,
            pool,
            termination_timeout,
            closed: false,
        })
    }

    /// The queue this service drains. Use it to reach the sinks.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Shuts the service down.
    ///
    /// Stops accepting tasks, waits up to the termination timeout for the
    /// workers to wind down, then delivers the shutdown notice to every task
    /// left in the queue. Tasks that already ran are unaffected; a task is
    /// either executed or terminated, never both and never neither.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(error) = self.pool.close_within(self.termination_timeout) {
            tracing::warn!(%error, "worker pool did not wind down cleanly");
        }

        // The queue is terminated by the pool's close hook even when the
        // close timed out, so nothing new can slip in behind this drain.
        let orphans = self.queue.drain();
        if !orphans.is_empty() {
            tracing::debug!(
                count = orphans.len(),
                "delivering shutdown notice to orphan tasks"
            );
        }
        for task in orphans {
            task.terminate();
        }
    }
}

impl<Q: TaskQueue> Drop for AsyncService<Q> {
    fn drop(&mut self) {
        self.close();
    }
}

/// One worker iteration: take a task, run it outside the queue lock, then
/// give the discipline its post-run hook.
fn worker_iteration<Q: TaskQueue>(queue: &Q) {
    let Some(task) = queue.take() else { return };
    let context = task.context().cloned();
    task.run();
    queue.task_completed(context.as_ref());
}
