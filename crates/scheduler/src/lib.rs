//! QuoteWatch Scheduler Crate
//!
//! A generic priority-queue executor and its result dispatcher.
//!
//! ```text
//!  submit(op, priority) --> JobQueue --> worker 1..N --> result channel
//!                                                            |
//!                          owning thread: ResultDispatcher::pump()
//!                                                            |
//!                                             on_success / on_error
//! ```
//!
//! - [`TaskScheduler`] - Worker pool with priority, timeout and cancellation
//! - [`ResultDispatcher`] - Invokes callbacks exactly once, on its owner's thread
//! - [`TaskResult`] / [`TaskError`] - What a job resolves to

mod dispatcher;
mod errors;
mod job;
mod queue;
mod scheduler;

pub use dispatcher::{CallbackBinding, ResultDispatcher, DEFAULT_DISPATCH_INTERVAL};
pub use errors::{SchedulerError, TaskError};
pub use job::{Job, JobId, Operation, Priority, TaskResult};
pub use scheduler::{ResultReceiver, SchedulerConfig, SchedulerStats, TaskScheduler};
