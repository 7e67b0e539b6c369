use std::collections::VecDeque;

use crate::task::{Task, TaskContext};

use super::{QueueCore, TaskQueue, TaskSink};

/// FIFO task queue without a capacity limit.
///
/// [`offer`](TaskSink::offer) on its sink always succeeds while the queue is
/// running, so producers never observe backpressure.
pub struct UnboundedTaskQueue {
    core: QueueCore<VecDeque<Task>>,
    sink: TaskSink,
}

impl UnboundedTaskQueue {
    pub fn new() -> Self {
        let core = QueueCore::new(VecDeque::new());
        let sink = core.sink(|tasks, task| {
            tasks.push_back(task);
            Ok(())
        });
        Self { core, sink }
    }

    /// The sink feeding this queue.
    pub fn sink(&self) -> &TaskSink {
        &self.sink
    }
}

impl Default for UnboundedTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue for UnboundedTaskQueue {
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
