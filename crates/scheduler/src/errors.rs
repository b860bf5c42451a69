//! Scheduler errors.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by scheduler control operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler is shut down")]
    ShutDown,

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("Scheduler needs at least one worker")]
    NoWorkers,
}

/// Why a job did not produce a value.
///
/// `E` is the operation's own error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError<E> {
    /// The operation ran and returned an error.
    #[error("Job failed: {0}")]
    Failed(E),

    /// The job exceeded its timeout. The operation may still be running.
    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job panicked: {0}")]
    Panicked(String),

    /// The scheduler stopped before the job was picked up.
    #[error("Scheduler shut down before the job ran")]
    Shutdown,
}

impl<E> TaskError<E> {
    /// Map the operation error, keeping scheduler-side variants.
    pub fn map_failed<F, O>(self, f: O) -> TaskError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::Failed(e) => TaskError::Failed(f(e)),
            Self::Timeout(after) => TaskError::Timeout(after),
            Self::Panicked(message) => TaskError::Panicked(message),
            Self::Shutdown => TaskError::Shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err: TaskError<String> = TaskError::Failed("boom".to_string());
        assert_eq!(err.to_string(), "Job failed: boom");

        let err: TaskError<String> = TaskError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Job timed out after 2s");
    }

    #[test]
    fn test_map_failed_keeps_other_variants() {
        let err: TaskError<u32> = TaskError::Failed(7);
        assert_eq!(err.map_failed(|n| n * 2), TaskError::Failed(14));

        let err: TaskError<u32> = TaskError::Shutdown;
        assert_eq!(err.map_failed(|n| n.to_string()), TaskError::<String>::Shutdown);
    }
}
