use crate::task::{Task, TaskContext};

use super::{Discipline, QueueCore, RingBuffer, TaskQueue, TaskSink};

impl Discipline for RingBuffer<Task> {
    fn is_empty(&self) -> bool {
        RingBuffer::is_empty(self)
    }

    fn poll(&mut self) -> Option<Task> {
        RingBuffer::poll(self)
    }

    fn drain_into(&mut self, out: &mut Vec<Task>) {
        out.append(&mut self.drain());
    }
}

/// FIFO task queue bounded by a power-of-two capacity.
///
/// A full queue rejects [`offer`](TaskSink::offer) with `false` and parks
/// [`put`](TaskSink::put) callers until a worker frees a slot.
pub struct BoundedTaskQueue {
    core: QueueCore<RingBuffer<Task>>,
    sink: TaskSink,
}

impl BoundedTaskQueue {
    /// Creates a queue holding up to `2^capacity_log2` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity_log2` exceeds
    /// [`MAX_CAPACITY_LOG2`](super::ring::MAX_CAPACITY_LOG2).
    pub fn new(capacity_log2: u32) -> Self {
        let core = QueueCore::new(RingBuffer::new(capacity_log2));
        let sink = core.sink(RingBuffer::offer);
        Self { core, sink }
    }

    /// The sink feeding this queue.
    pub fn sink(&self) -> &TaskSink {
        &self.sink
    }
}

impl TaskQueue for BoundedTaskQueue {
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
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn offer_rejects_when_full() {
        let queue = BoundedTaskQueue::new(2);
        for _ in 0..4 {
            assert!(queue.sink().offer(|| Ok(()), Callback::new()));
        }
        // Capacity is 4; the fifth offer must bounce without touching the
        // callback.
        let touched = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&touched);
        let accepted = queue.sink().offer(
            || Ok(()),
            Callback::new()
                .on_success(|_: ()| panic!("must not run"))
                .on_terminated(move || flag.store(true, Ordering::SeqCst)),
        );
        assert!(!accepted);
        assert!(!touched.load(Ordering::SeqCst));
    }

    #[test]
    fn put_blocks_until_a_slot_frees() {
        let queue = Arc::new(BoundedTaskQueue::new(0));
        assert!(queue.sink().offer(|| Ok(()), Callback::new()));

        let submitted = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let submitted = Arc::clone(&submitted);
            thread::spawn(move || {
                queue.sink().put(|| Ok(()), Callback::new());
                submitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(
            !submitted.load(Ordering::SeqCst),
            "put must park while the queue is full"
        );

        // Taking the stored task signals not_full and releases the producer.
        assert!(queue.take().is_some());
        producer.join().unwrap();
        assert!(submitted.load(Ordering::SeqCst));
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn terminate_releases_blocked_put_with_shutdown_notice() {
        let queue = Arc::new(BoundedTaskQueue::new(0));
        assert!(queue.sink().offer(|| Ok(()), Callback::new()));

        let terminated = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let terminated = Arc::clone(&terminated);
            thread::spawn(move || {
                queue.sink().put(
                    || Ok(()),
                    Callback::new().on_terminated(move || terminated.store(true, Ordering::SeqCst)),
                );
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.terminate();
        producer.join().unwrap();
        assert!(terminated.load(Ordering::SeqCst));
        // Only the originally stored task remains.
        assert_eq!(queue.drain().len(), 1);
    }
}
