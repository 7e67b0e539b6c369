use std::sync::Arc;
use std::thread;

/// Produces configured [`thread::Builder`]s for a pool's worker threads.
///
/// Implemented by [`Threading`]; implement it yourself to control thread
/// creation beyond what `Threading` exposes.
pub trait WorkerFactory {
    fn builder(&self, index: usize) -> thread::Builder;
}

type NameFn = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Describes the thread set an [`AsyncService`](crate::service::AsyncService)
/// runs on: how many workers, how they are named, and their stack size.
///
/// ```
/// use taskmill::Threading;
///
/// let threading = Threading::named(4, |index| format!("codec-worker-{index}"))
///     .with_stack_size(512 * 1024);
/// assert_eq!(threading.thread_count(), 4);
/// ```
#[derive(Clone)]
pub struct Threading {
    thread_count: usize,
    name_fn: Option<NameFn>,
    stack_size: Option<usize>,
}

impl Threading {
    /// Uses `thread_count` workers with default thread attributes.
    ///
    /// # Panics
    ///
    /// Panics if `thread_count` is zero.
    pub fn default_threads(thread_count: usize) -> Self {
        assert!(
            thread_count >= 1,
            "thread count must be at least 1, got {thread_count}"
        );
        Self {
            thread_count,
            name_fn: None,
            stack_size: None,
        }
    }

    /// Uses `thread_count` workers named by `name_fn`, which receives the
    /// worker index from `0` to `thread_count - 1`.
    ///
    /// # Panics
    ///
    /// Panics if `thread_count` is zero.
    pub fn named(
        thread_count: usize,
        name_fn: impl Fn(usize) -> String + Send + Sync + 'static,
    ) -> Self {
        let mut threading = Self::default_threads(thread_count);
        threading.name_fn = Some(Arc::new(name_fn));
        threading
    }

    /// Uses a single worker with the given name.
    pub fn single_thread(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::named(1, move |_| name.clone())
    }

    /// Sets the stack size, in bytes, for every worker thread.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}

impl WorkerFactory for Threading {
    fn builder(&self, index: usize) -> thread::Builder {
        let mut builder = thread::Builder::new();
        if let Some(name_fn) = &self.name_fn {
            builder = builder.name(name_fn(index));
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder
    }
}
