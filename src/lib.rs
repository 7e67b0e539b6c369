//! Thread-pool task execution with pluggable queue disciplines.
//!
//! `taskmill` runs user computations on a fixed pool of worker threads and
//! reports every outcome through a per-task [`Callback`]: `success` with the
//! computed value, `failure` with the error (or panic) the computation
//! produced, or `terminated` when the service shut down first. Every accepted
//! task gets exactly one of the three.
//!
//! Work flows producer → [`TaskSink`] → queue → worker → callback. The queue
//! decides ordering and backpressure:
//!
//! - [`UnboundedTaskQueue`]: plain FIFO, never pushes back.
//! - [`BoundedTaskQueue`]: FIFO over a power-of-two ring; full queues reject
//!   [`offer`](TaskSink::offer) and park [`put`](TaskSink::put) callers.
//! - [`TwoLevelTaskQueue`]: a bounded external level for rate-limited outside
//!   producers plus an unbounded internal level, served first, for the
//!   service's own follow-up work.
//! - [`SplittingTaskQueue`]: FIFO with bucket locking, so at most one task
//!   per bucket runs at any moment.
//!
//! Custom disciplines plug into the same locking protocol through
//! [`QueueCore`](queue::QueueCore) and [`Discipline`](queue::Discipline).
//!
//! [`AsyncChain`] composes callback-based steps into a linear pipeline with
//! per-step failure and termination overrides.

pub mod queue;
pub mod service;

mod callback;
mod chain;
mod task;

pub use callback::Callback;
pub use chain::{AsyncChain, FailureHandler, OnFailure, OnTermination, TerminationHandler};
pub use queue::{
    BoundedTaskQueue, SplittingTaskQueue, TaskQueue, TaskSink, TwoLevelTaskQueue,
    UnboundedTaskQueue,
};
pub use service::{AsyncService, CloseError, Threading, WorkerFactory, WorkerPool};
pub use task::{Task, TaskContext};
