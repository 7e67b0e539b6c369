use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::task::{Task, TaskContext};

use super::{Discipline, QueueCore, TaskQueue, TaskSink};

type Splitter<K> = Box<dyn Fn(Option<&TaskContext>) -> K + Send>;

struct SplitState<K> {
    splitter: Splitter<K>,
    tasks: VecDeque<Task>,
    locked_buckets: HashSet<K>,
}

impl<K> SplitState<K> {
    fn bucket_of(&self, task: &Task) -> K {
        (self.splitter)(task.context())
    }
}

impl<K> Discipline for SplitState<K>
where
    K: Eq + Hash + Send + 'static,
{
    // The queue counts as empty when every stored task belongs to a locked
    // bucket; waking a worker for those would accomplish nothing.
    fn is_empty(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| self.locked_buckets.contains(&self.bucket_of(task)))
    }

    // First task in FIFO order whose bucket is unlocked; polling locks the
    // bucket until `after_run` releases it.
    fn poll(&mut self) -> Option<Task> {
        let position = self
            .tasks
            .iter()
            .position(|task| !self.locked_buckets.contains(&self.bucket_of(task)))?;
        let task = self.tasks.remove(position)?;
        self.locked_buckets.insert(self.bucket_of(&task));
        Some(task)
    }

    fn after_run(&mut self, context: Option<&TaskContext>) -> bool {
        self.locked_buckets.remove(&(self.splitter)(context));
        true
    }

    fn drain_into(&mut self, out: &mut Vec<Task>) {
        out.extend(self.tasks.drain(..));
    }
}

/// Unbounded task queue that serializes execution within buckets.
///
/// The splitter maps each task's [context](crate::TaskContext) to a bucket
/// key. While a task from some bucket is running, the bucket is locked and
/// further tasks mapping to it are skipped over; tasks from distinct buckets
/// run concurrently up to the width of the worker pool. Apart from that
/// constraint, tasks are served in submission order.
///
/// The splitter runs under the queue lock and is consulted every time the
/// queue is scanned, so it should be cheap. Submissions without a context are
/// perfectly valid; the splitter decides what key the absent context maps to.
pub struct SplittingTaskQueue<K>
where
    K: Eq + Hash + Send + 'static,
{
    core: QueueCore<SplitState<K>>,
    sink: TaskSink,
}

impl<K> SplittingTaskQueue<K>
where
    K: Eq + Hash + Send + 'static,
{
    pub fn new(splitter: impl Fn(Option<&TaskContext>) -> K + Send + 'static) -> Self {
        let core = QueueCore::new(SplitState {
            splitter: Box::new(splitter),
            tasks: VecDeque::new(),
            locked_buckets: HashSet::new(),
        });
        let sink = core.sink(|state, task| {
            state.tasks.push_back(task);
            Ok(())
        });
        Self { core, sink }
    }

    /// The sink feeding this queue.
    pub fn sink(&self) -> &TaskSink {
        &self.sink
    }
}

impl SplittingTaskQueue<()> {
    /// A queue with a single implicit bucket: at most one task runs at a
    /// time, regardless of pool width.
    pub fn serializing() -> Self {
        Self::new(|_| ())
    }
}

impl<K> TaskQueue for SplittingTaskQueue<K>
where
    K: Eq + Hash + Send + 'static,
{
    fn take(&self) -> Option<Task> {
        self.core.take()
    }

    fn task_completed(&self, context: Option<&TaskContext>) {
        self.core.task_completed(context);
    }

    fn drain(&self) -> Vec<Task> {
        self.core.drain()
    }

    fn terminate(&self) {
        self.core.terminate();
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use std::sync::Arc;

    fn bucket_splitter(context: Option<&TaskContext>) -> u8 {
        context
            .and_then(|c| c.downcast_ref::<u8>())
            .copied()
            .unwrap_or(0)
    }

    fn submit(queue: &SplittingTaskQueue<u8>, bucket: u8) {
        let context: TaskContext = Arc::new(bucket);
        assert!(queue
            .sink()
            .offer_with_context(context, || Ok(()), Callback::new()));
    }

    #[test]
    fn poll_skips_locked_buckets_in_fifo_order() {
        let queue = SplittingTaskQueue::new(bucket_splitter);
        submit(&queue, 1);
        submit(&queue, 1);
        submit(&queue, 2);

        // First poll takes the head and locks bucket 1; the second must skip
        // the other bucket-1 task and serve bucket 2.
        let first = queue.take().expect("head task");
        assert_eq!(bucket_splitter(first.context()), 1);
        let second = queue.take().expect("unlocked bucket");
        assert_eq!(bucket_splitter(second.context()), 2);

        // Both buckets locked now; nothing is pollable even though a task is
        // stored, and a worker would block. Unlock bucket 1 and re-poll.
        queue.task_completed(first.context());
        let third = queue.take().expect("bucket released");
        assert_eq!(bucket_splitter(third.context()), 1);
    }

    #[test]
    fn terminate_reports_empty_while_all_buckets_locked() {
        let queue = SplittingTaskQueue::new(bucket_splitter);
        submit(&queue, 1);
        let running = queue.take().expect("head task");

        submit(&queue, 1);
        queue.terminate();
        // The remaining task's bucket is locked, so a worker sees nothing to
        // poll and leaves.
        assert!(queue.take().is_none());

        queue.task_completed(running.context());
        assert!(queue.take().is_some());
    }

    #[test]
    fn serializing_queue_uses_one_bucket() {
        let queue = SplittingTaskQueue::serializing();
        assert!(queue.sink().offer(|| Ok(()), Callback::new()));
        assert!(queue.sink().offer(|| Ok(()), Callback::new()));

        let first = queue.take().expect("first");
        queue.terminate();
        // The single bucket is locked, so the second task is not pollable
        // yet even though it is stored.
        assert!(queue.take().is_none());
        queue.task_completed(first.context());
        assert!(queue.take().is_some());
    }

    #[test]
    fn drain_returns_tasks_from_locked_buckets_too() {
        let queue = SplittingTaskQueue::new(bucket_splitter);
        submit(&queue, 1);
        submit(&queue, 1);
        let _running = queue.take().expect("head task");
        assert_eq!(queue.drain().len(), 1);
    }
}
