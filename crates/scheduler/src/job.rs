use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::TaskError;

/// Job priority. Higher priorities are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Identifier handed out by the scheduler on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(crate) u64);

impl JobId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// The unit of work a worker runs.
pub type Operation<T, E> = BoxFuture<'static, Result<T, E>>;

/// A submitted job. Owned by the queue until a worker claims it.
pub struct Job<T, E> {
    pub id: JobId,
    pub priority: Priority,
    pub operation: Operation<T, E>,
    pub timeout: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

impl<T, E> fmt::Debug for Job<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Outcome of one job, produced exactly once.
#[derive(Debug)]
pub struct TaskResult<T, E> {
    pub job_id: JobId,
    pub outcome: Result<T, TaskError<E>>,
    pub completed_at: DateTime<Utc>,
}

impl<T, E> TaskResult<T, E> {
    pub(crate) fn new(job_id: JobId, outcome: Result<T, TaskError<E>>) -> Self {
        Self {
            job_id,
            outcome,
            completed_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_serde_names() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
        let parsed: Priority = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(parsed, Priority::Critical);
    }
}
