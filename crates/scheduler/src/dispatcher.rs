//! Delivers job results to callbacks on the thread that owns the dispatcher.
//!
//! Callbacks do not need to be `Send`: the dispatcher is pumped by its owner
//! (a UI loop, the CLI main task) and never crosses threads. Register the
//! callbacks for a job before the next `pump` so its result cannot arrive
//! unbound.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use log::{debug, error};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::MissedTickBehavior;

use crate::errors::TaskError;
use crate::job::{JobId, TaskResult};
use crate::scheduler::ResultReceiver;

/// Default interval for [`ResultDispatcher::run`].
pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_millis(100);

type SuccessCallback<T> = Box<dyn FnOnce(T)>;
type ErrorCallback<E> = Box<dyn FnOnce(TaskError<E>)>;

/// Callbacks waiting for one job's result. Either side may be absent.
pub struct CallbackBinding<T, E> {
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback<E>>,
}

impl<T, E> Default for CallbackBinding<T, E> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T, E> CallbackBinding<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce(T) + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(TaskError<E>) + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

pub struct ResultDispatcher<T, E> {
    receiver: ResultReceiver<T, E>,
    bindings: HashMap<JobId, CallbackBinding<T, E>>,
}

impl<T, E> ResultDispatcher<T, E> {
    pub fn new(receiver: ResultReceiver<T, E>) -> Self {
        Self {
            receiver,
            bindings: HashMap::new(),
        }
    }

    /// Bind callbacks to `job_id`, replacing any existing binding.
    pub fn register(&mut self, job_id: JobId, binding: CallbackBinding<T, E>) {
        if self.bindings.insert(job_id, binding).is_some() {
            debug!("Replaced callback binding for {}", job_id);
        }
    }

    /// Drop the binding for `job_id`. Returns true if there was one.
    pub fn forget(&mut self, job_id: JobId) -> bool {
        self.bindings.remove(&job_id).is_some()
    }

    /// Number of jobs still waiting for a result.
    pub fn pending(&self) -> usize {
        self.bindings.len()
    }

    /// Drain every result available right now without blocking.
    ///
    /// Returns the number of results processed, bound or not.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(result) => {
                    self.dispatch(result);
                    processed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        processed
    }

    /// Pump every `interval` until `shutdown` resolves, then pump once more.
    pub async fn run<S>(&mut self, interval: Duration, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.pump();
                }
            }
        }
        self.pump();
        debug!("Result dispatcher stopped");
    }

    fn dispatch(&mut self, result: TaskResult<T, E>) {
        let TaskResult {
            job_id, outcome, ..
        } = result;

        let Some(binding) = self.bindings.remove(&job_id) else {
            debug!("No callbacks registered for {}, discarding result", job_id);
            return;
        };

        let invoked = match outcome {
            Ok(value) => binding
                .on_success
                .map(|callback| panic::catch_unwind(AssertUnwindSafe(|| callback(value)))),
            Err(error) => binding
                .on_error
                .map(|callback| panic::catch_unwind(AssertUnwindSafe(|| callback(error)))),
        };

        match invoked {
            Some(Ok(())) => {}
            Some(Err(_)) => error!("Callback for {} panicked", job_id),
            None => debug!("{} resolved with no matching callback", job_id),
        }
    }
}
