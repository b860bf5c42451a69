//! Worker pool executing queued jobs under priority and timeout constraints.
//!
//! Workers are tokio tasks that pull from one shared [`JobQueue`]. Each job's
//! operation is spawned as its own task so a panic is caught at the join
//! point instead of taking the worker down. Results are written to an
//! unbounded channel consumed by the `ResultDispatcher`; workers never invoke
//! callbacks themselves.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::errors::{SchedulerError, TaskError};
use crate::job::{Job, JobId, Priority, TaskResult};
use crate::queue::JobQueue;

/// Receiving end of the result channel, handed to the dispatcher.
pub type ResultReceiver<T, E> = mpsc::UnboundedReceiver<TaskResult<T, E>>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on how long an idle worker waits before re-checking for
    /// shutdown.
    pub poll_interval: Duration,
    /// Applied to jobs submitted without their own timeout.
    pub default_timeout: Option<Duration>,
    /// How long `stop` waits for workers to finish their current job.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

struct Shared<T, E> {
    queue: JobQueue<T, E>,
    results: mpsc::UnboundedSender<TaskResult<T, E>>,
    shutdown: AtomicBool,
    counters: Counters,
    config: SchedulerConfig,
}

impl<T, E> Shared<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn publish(&self, result: TaskResult<T, E>) {
        if result.is_ok() {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        let job_id = result.job_id;
        if self.results.send(result).is_err() {
            debug!("Result receiver dropped, discarding result for {}", job_id);
        }
    }

    async fn run_job(&self, job: Job<T, E>) {
        let Job {
            id,
            priority,
            operation,
            timeout,
            created_at,
        } = job;

        debug!(
            "Running {} ({}), queued for {}ms",
            id,
            priority,
            (Utc::now() - created_at).num_milliseconds()
        );
        self.counters.running.fetch_add(1, Ordering::Relaxed);

        let mut handle = tokio::spawn(operation);
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => outcome_from_join(joined),
                Err(_) => {
                    // Dropping the handle detaches the task; it is not aborted.
                    warn!(
                        "{} timed out after {:?}, leaving it to finish in the background",
                        id, limit
                    );
                    Err(TaskError::Timeout(limit))
                }
            },
            None => outcome_from_join(handle.await),
        };

        self.counters.running.fetch_sub(1, Ordering::Relaxed);
        if let Err(TaskError::Panicked(message)) = &outcome {
            error!("{} panicked: {}", id, message);
        }
        self.publish(TaskResult::new(id, outcome));
    }
}

fn outcome_from_join<T, E>(joined: Result<Result<T, E>, JoinError>) -> Result<T, TaskError<E>> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskError::Failed(e)),
        Err(join_error) if join_error.is_panic() => {
            Err(TaskError::Panicked(panic_message(join_error.into_panic())))
        }
        // Only happens when the runtime itself is shutting down.
        Err(_) => Err(TaskError::Shutdown),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Priority queue plus worker pool.
///
/// Jobs may be submitted before `start`; they wait in the queue.
pub struct TaskScheduler<T, E> {
    shared: Arc<Shared<T, E>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    started: AtomicBool,
}

impl<T, E> TaskScheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a scheduler and the receiver its results are delivered to.
    pub fn new(config: SchedulerConfig) -> (Self, ResultReceiver<T, E>) {
        let (results, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            shared: Arc::new(Shared {
                queue: JobQueue::new(),
                results,
                shutdown: AtomicBool::new(false),
                counters: Counters::default(),
                config,
            }),
            workers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
        };
        (scheduler, receiver)
    }

    /// Spawn `worker_count` workers on the current tokio runtime.
    pub fn start(&self, worker_count: usize) -> Result<(), SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::NoWorkers);
        }
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted);
        }

        let mut workers = self.lock_workers();
        for worker_id in 0..worker_count {
            let shared = Arc::clone(&self.shared);
            workers.push(tokio::spawn(worker_loop(shared, worker_id)));
        }
        info!("Task scheduler started with {} worker(s)", worker_count);
        Ok(())
    }

    /// Queue `operation` at `priority`.
    ///
    /// `timeout` overrides the configured default. The operation does not
    /// start until a worker claims it.
    pub fn submit<F>(
        &self,
        operation: F,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<JobId, SchedulerError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Job {
            id,
            priority,
            operation: operation.boxed(),
            timeout: timeout.or(self.shared.config.default_timeout),
            created_at: Utc::now(),
        };

        // The queue closes atomically with the drain in `stop`, so a job is
        // either drained there or rejected here.
        if self.shared.queue.push(job).is_err() {
            return Err(SchedulerError::ShutDown);
        }
        debug!("Submitted {} at {}", id, priority);
        Ok(id)
    }

    /// Cancel a job that is still queued.
    ///
    /// Returns false once a worker has claimed it. A cancelled job never
    /// produces a result.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.shared.queue.remove(job_id) {
            Some(_) => {
                self.shared.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!("Cancelled {}", job_id);
                true
            }
            None => false,
        }
    }

    /// Stop the pool.
    ///
    /// Queued jobs are not executed; each resolves with
    /// [`TaskError::Shutdown`]. Workers get `shutdown_grace` to finish the
    /// job they are running, after which they are left detached.
    pub async fn stop(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping task scheduler");

        let drained = self.shared.queue.close();
        if !drained.is_empty() {
            info!("Dropping {} queued job(s) on shutdown", drained.len());
        }
        for job in drained {
            self.shared
                .publish(TaskResult::new(job.id, Err(TaskError::Shutdown)));
        }

        let workers = std::mem::take(&mut *self.lock_workers());
        let deadline = tokio::time::Instant::now() + self.shared.config.shutdown_grace;
        for (worker_id, handle) in workers.into_iter().enumerate() {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Worker {} ended abnormally: {}", worker_id, e),
                Err(_) => warn!(
                    "Worker {} still busy after shutdown grace period, detaching",
                    worker_id
                ),
            }
        }
        info!("Task scheduler stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.shared.counters;
        SchedulerStats {
            queued: self.shared.queue.len(),
            running: counters.running.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
        }
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(|poisoned| {
            warn!("Worker list mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

async fn worker_loop<T, E>(shared: Arc<Shared<T, E>>, worker_id: usize)
where
    T: Send + 'static,
    E: Send + 'static,
{
    debug!("Worker {} started", worker_id);
    while !shared.shutdown.load(Ordering::SeqCst) {
        let Some(job) = shared.queue.pop_or_wait(shared.config.poll_interval).await else {
            continue;
        };
        shared.run_job(job).await;
    }
    debug!("Worker {} stopped", worker_id);
}
