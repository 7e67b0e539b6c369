use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::callback::Callback;

/// Opaque attachment a submitter may pin to a task.
///
/// Queue disciplines that route tasks by their payload (see
/// [`SplittingTaskQueue`](crate::queue::SplittingTaskQueue)) downcast the
/// context to derive a routing key. The service itself never looks inside.
pub type TaskContext = Arc<dyn Any + Send + Sync>;

/// A submitted computation paired with its result callback.
///
/// Tasks are created by a [`TaskSink`](crate::queue::TaskSink) and travel
/// through a queue to a worker. Both terminal operations consume the task,
/// so a task either runs to completion or is told the service terminated,
/// never both, and its callback receives at most one signal.
pub struct Task {
    exec: Box<dyn Exec>,
    context: Option<TaskContext>,
}

impl Task {
    pub(crate) fn new<R, C>(
        computation: C,
        callback: Callback<R>,
        context: Option<TaskContext>,
    ) -> Self
    where
        R: Send + 'static,
        C: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        Self {
            exec: Box::new(Typed {
                computation,
                callback,
            }),
            context,
        }
    }

    /// The attachment supplied at submission, if any.
    pub fn context(&self) -> Option<&TaskContext> {
        self.context.as_ref()
    }

    /// Runs the computation and delivers `success` or `failure`.
    ///
    /// A panicking computation is caught and reported as a failure carrying
    /// the panic message.
    pub(crate) fn run(self) {
        self.exec.run();
    }

    /// Delivers the shutdown notice instead of running the computation.
    pub(crate) fn terminate(self) {
        self.exec.terminate();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

trait Exec: Send {
    fn run(self: Box<Self>);
    fn terminate(self: Box<Self>);
}

struct Typed<R, C> {
    computation: C,
    callback: Callback<R>,
}

impl<R, C> Exec for Typed<R, C>
where
    R: Send + 'static,
    C: FnOnce() -> anyhow::Result<R> + Send + 'static,
{
    fn run(self: Box<Self>) {
        let Typed {
            computation,
            callback,
        } = *self;
        match panic::catch_unwind(AssertUnwindSafe(computation)) {
            Ok(Ok(value)) => callback.success(value),
            Ok(Err(error)) => callback.failure(error),
            Err(payload) => {
                callback.failure(anyhow::anyhow!(
                    "computation panicked: {}",
                    panic_message(payload.as_ref())
                ));
            }
        }
    }

    fn terminate(self: Box<Self>) {
        self.callback.terminated();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Success(u32),
        Failure(String),
        Terminated,
    }

    fn probe() -> (Arc<Mutex<Vec<Outcome>>>, Callback<u32>) {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let on_success = Arc::clone(&outcomes);
        let on_failure = Arc::clone(&outcomes);
        let on_terminated = Arc::clone(&outcomes);
        let callback = Callback::new()
            .on_success(move |value| on_success.lock().push(Outcome::Success(value)))
            .on_failure(move |error| on_failure.lock().push(Outcome::Failure(error.to_string())))
            .on_terminated(move || on_terminated.lock().push(Outcome::Terminated));
        (outcomes, callback)
    }

    #[test]
    fn run_delivers_success() {
        let (outcomes, callback) = probe();
        Task::new(|| Ok(11), callback, None).run();
        assert_eq!(*outcomes.lock(), [Outcome::Success(11)]);
    }

    #[test]
    fn run_delivers_failure() {
        let (outcomes, callback) = probe();
        Task::new(|| Err(anyhow::anyhow!("no luck")), callback, None).run();
        assert_eq!(*outcomes.lock(), [Outcome::Failure("no luck".into())]);
    }

    #[test]
    fn run_converts_panic_into_failure() {
        let (outcomes, callback) = probe();
        Task::new(|| panic!("kaboom"), callback, None).run();
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Outcome::Failure(message) => assert!(message.contains("kaboom")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn terminate_delivers_shutdown_notice() {
        let (outcomes, callback) = probe();
        Task::new(|| Ok(11), callback, None).terminate();
        assert_eq!(*outcomes.lock(), [Outcome::Terminated]);
    }

    #[test]
    fn context_is_exposed() {
        let context: TaskContext = Arc::new("bucket-a");
        let task = Task::new(|| Ok(0u32), Callback::new(), Some(context));
        let attached = task.context().and_then(|c| c.downcast_ref::<&str>());
        assert_eq!(attached, Some(&"bucket-a"));
    }
}
