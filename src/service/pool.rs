use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::barrier::{PhasedBarrier, RUNNING_PHASE};
use super::threading::WorkerFactory;

/// Why a pool close did not complete cleanly.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CloseError {
    /// The deadline passed before every worker wound down. The pool is
    /// force-terminated; workers exit on their own once their current body
    /// iteration returns.
    #[error("timed out waiting for worker threads to finish")]
    Timeout,

    /// The termination hook panicked. The pool is force-terminated and the
    /// terminal wait was skipped.
    #[error("termination hook panicked during close")]
    TerminateHook,
}

/// Fixed-size pool of threads looping a shared body.
///
/// Startup and shutdown are coordinated through a [`PhasedBarrier`] with one
/// party per worker plus one for the controlling thread. Construction blocks
/// until every worker is up. [`close`](WorkerPool::close) ends the running
/// phase, fires the termination hook, and waits for the workers to finish
/// their final iterations; [`close_within`](WorkerPool::close_within) puts
/// one monotonic deadline over both waits.
///
/// Closing is a single-caller protocol, which `&mut self` encodes; closing a
/// pool that is not running is a no-op.
pub struct WorkerPool {
    barrier: Arc<PhasedBarrier>,
    handles: Vec<JoinHandle<()>>,
    on_terminate: Option<Box<dyn FnOnce() + Send>>,
}

impl WorkerPool {
    /// Spawns `worker_count` threads through `factory`, each looping `body`,
    /// and waits for all of them to reach the running phase.
    ///
    /// `on_terminate` runs on the closing thread after the running phase has
    /// ended and before the pool waits for the workers' final iterations.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero.
    pub fn new<B, F, T>(
        body: B,
        worker_count: usize,
        factory: &F,
        on_terminate: T,
    ) -> io::Result<Self>
    where
        B: Fn() + Send + Sync + 'static,
        F: WorkerFactory + ?Sized,
        T: FnOnce() + Send + 'static,
    {
        assert!(
            worker_count >= 1,
            "worker count must be at least 1, got {worker_count}"
        );
        let barrier = Arc::new(PhasedBarrier::new(worker_count as u32 + 1));
        let body = Arc::new(body);
        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let spawned = factory.builder(index).spawn({
                let barrier = Arc::clone(&barrier);
                let body = Arc::clone(&body);
                move || worker_loop(&barrier, &*body)
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    // Workers that did start observe the dead barrier and
                    // exit before ever running the body.
                    barrier.force_terminate();
                    return Err(error);
                }
            }
        }
        barrier.arrive_and_await();
        Ok(Self {
            barrier,
            handles,
            on_terminate: Some(Box::new(on_terminate)),
        })
    }

    /// Closes the pool, waiting indefinitely for the workers to finish.
    pub fn close(&mut self) -> Result<(), CloseError> {
        self.close_inner(None)
    }

    /// Closes the pool, waiting at most `timeout` in total.
    pub fn close_within(&mut self, timeout: Duration) -> Result<(), CloseError> {
        self.close_inner(Some(Instant::now() + timeout))
    }

    fn close_inner(&mut self, deadline: Option<Instant>) -> Result<(), CloseError> {
        if self.barrier.phase() != RUNNING_PHASE {
            return Ok(());
        }

        // This arrival ends the running phase: the workers banked theirs at
        // startup, so the advance is normally immediate. The wait covers a
        // worker that has not banked its arrival yet.
        let closing = self.barrier.arrive();
        if !self.await_phase(closing, deadline) {
            self.run_on_terminate();
            self.barrier.force_terminate();
            return Err(CloseError::Timeout);
        }

        if !self.run_on_terminate() {
            self.barrier.force_terminate();
            return Err(CloseError::TerminateHook);
        }

        // Grace period: workers notice the phase change after their current
        // body iteration and deregister one by one.
        let draining = self.barrier.arrive_and_deregister();
        if !self.await_phase(draining, deadline) {
            self.barrier.force_terminate();
            return Err(CloseError::Timeout);
        }

        // Every worker has deregistered, so joining is near-instant.
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        tracing::trace!("worker pool closed");
        Ok(())
    }

    // True when the barrier moved past `phase` before the deadline.
    fn await_phase(&self, phase: i32, deadline: Option<Instant>) -> bool {
        match deadline {
            None => {
                self.barrier.await_advance(phase);
                true
            }
            Some(deadline) => self.barrier.await_advance_until(phase, deadline).is_ok(),
        }
    }

    // False when the hook panicked.
    fn run_on_terminate(&mut self) -> bool {
        match self.on_terminate.take() {
            None => true,
            Some(hook) => panic::catch_unwind(AssertUnwindSafe(hook)).is_ok(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn worker_loop(barrier: &PhasedBarrier, body: &(dyn Fn() + Send + Sync)) {
    if barrier.arrive_and_await() < 0 {
        // Pool construction failed before every worker came up.
        return;
    }
    tracing::trace!("worker entering run loop");

    // Bank one arrival so the controller alone can advance the barrier out
    // of the running phase when it closes the pool.
    barrier.arrive();

    while barrier.phase() == RUNNING_PHASE {
        if panic::catch_unwind(AssertUnwindSafe(body)).is_err() {
            tracing::debug!("worker body panicked; continuing");
        }
    }

    barrier.arrive_and_deregister();
    tracing::trace!("worker exiting");
}
