use std::collections::VecDeque;

use crate::task::{Task, TaskContext};

use super::{Discipline, QueueCore, RingBuffer, TaskQueue, TaskSink};

struct TwoLevelState {
    external: RingBuffer<Task>,
    internal: VecDeque<Task>,
}

impl Discipline for TwoLevelState {
    fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }

    // Strict priority: the internal level is served before the external one,
    // FIFO within each.
    fn poll(&mut self) -> Option<Task> {
        self.internal.pop_front().or_else(|| self.external.poll())
    }

    fn drain_into(&mut self, out: &mut Vec<Task>) {
        out.extend(self.internal.drain(..));
        out.append(&mut self.external.drain());
    }
}

/// Task queue with a bounded *external* level and an unbounded *internal*
/// level sharing one lock.
///
/// Workers always serve the internal level first. A service can thus post
/// recursive follow-up work through the internal sink without being throttled
/// by its own backpressure, while external producers stay rate-limited by the
/// bounded level.
pub struct TwoLevelTaskQueue {
    core: QueueCore<TwoLevelState>,
    external_sink: TaskSink,
    internal_sink: TaskSink,
}

impl TwoLevelTaskQueue {
    /// Creates a queue whose external level holds up to
    /// `2^external_capacity_log2` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `external_capacity_log2` exceeds
    /// [`MAX_CAPACITY_LOG2`](super::ring::MAX_CAPACITY_LOG2).
    pub fn new(external_capacity_log2: u32) -> Self {
        let core = QueueCore::new(TwoLevelState {
            external: RingBuffer::new(external_capacity_log2),
            internal: VecDeque::new(),
        });
        let external_sink = core.sink(|state, task| state.external.offer(task));
        let internal_sink = core.sink(|state, task| {
            state.internal.push_back(task);
            Ok(())
        });
        Self {
            core,
            external_sink,
            internal_sink,
        }
    }

    /// The rate-limited sink for outside producers.
    pub fn external_sink(&self) -> &TaskSink {
        &self.external_sink
    }

    /// The unbounded sink for work the service generates itself.
    pub fn internal_sink(&self) -> &TaskSink {
        &self.internal_sink
    }
}

impl TaskQueue for TwoLevelTaskQueue {
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
