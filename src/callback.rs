use std::fmt;

type SuccessFn<R> = Box<dyn FnOnce(R) + Send>;
type FailureFn = Box<dyn FnOnce(anyhow::Error) + Send>;
type TerminatedFn = Box<dyn FnOnce() + Send>;

/// One-shot sink for the outcome of a submitted computation.
///
/// A callback is attached to a computation when it is handed to a
/// [`TaskSink`](crate::queue::TaskSink). Exactly one of the three terminal
/// operations is invoked for every accepted computation: [`success`] when the
/// computation returns a value, [`failure`] when it returns an error or
/// panics, and [`terminated`] when the service shuts down before the
/// computation could finish. Each terminal operation consumes the callback,
/// so delivering more than one signal is impossible by construction.
///
/// Handlers may run on any thread: a worker thread, the thread submitting the
/// computation (when submitting to an already-terminated queue), or the
/// thread closing the service. They must therefore be `Send` and should not
/// assume anything about their execution context.
///
/// Any handler that is not set is a silent no-op:
///
/// ```
/// use taskmill::Callback;
///
/// let callback = Callback::new()
///     .on_success(|value: u64| println!("got {value}"))
///     .on_failure(|error| eprintln!("failed: {error}"));
/// callback.success(7);
/// ```
///
/// [`success`]: Callback::success
/// [`failure`]: Callback::failure
/// [`terminated`]: Callback::terminated
pub struct Callback<R> {
    pub(crate) on_success: Option<SuccessFn<R>>,
    pub(crate) on_failure: Option<FailureFn>,
    pub(crate) on_terminated: Option<TerminatedFn>,
}

impl<R> Callback<R> {
    /// Creates a callback that ignores every signal.
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_failure: None,
            on_terminated: None,
        }
    }

    /// Sets the handler invoked when the computation completes with a value.
    pub fn on_success(mut self, handler: impl FnOnce(R) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(handler));
        self
    }

    /// Sets the handler invoked when the computation returns an error or
    /// panics.
    pub fn on_failure(mut self, handler: impl FnOnce(anyhow::Error) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(handler));
        self
    }

    /// Sets the handler invoked when the service is terminated before the
    /// computation finishes.
    pub fn on_terminated(mut self, handler: impl FnOnce() + Send + 'static) -> Self {
        self.on_terminated = Some(Box::new(handler));
        self
    }

    /// Returns a callback that routes `success` to `handler` (or to nothing
    /// when `handler` is `None`) while keeping the failure and termination
    /// handlers of this callback.
    pub fn override_success<F>(mut self, handler: Option<F>) -> Self
    where
        F: FnOnce(R) + Send + 'static,
    {
        self.on_success = handler.map(|f| Box::new(f) as SuccessFn<R>);
        self
    }

    /// Delivers the computation's value.
    pub fn success(self, value: R) {
        if let Some(handler) = self.on_success {
            handler(value);
        }
    }

    /// Delivers the computation's error.
    pub fn failure(self, error: anyhow::Error) {
        if let Some(handler) = self.on_failure {
            handler(error);
        }
    }

    /// Delivers the shutdown notice.
    pub fn terminated(self) {
        if let Some(handler) = self.on_terminated {
            handler();
        }
    }
}

impl<R> Default for Callback<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Callback<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_terminated", &self.on_terminated.is_some())
            .finish()
    }
}
