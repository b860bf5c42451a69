//! Shared priority queue the workers pull from.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::warn;
use tokio::sync::Notify;

use crate::job::{Job, JobId, Priority};

/// Queue ordering key: higher priority first, then earlier submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    priority: Priority,
    sequence: u64,
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            ordering => ordering,
        }
    }
}

struct QueueState<T, E> {
    pending: BTreeMap<QueueKey, Job<T, E>>,
    index: HashMap<JobId, QueueKey>,
    next_sequence: u64,
    closed: bool,
}

pub(crate) struct JobQueue<T, E> {
    state: Mutex<QueueState<T, E>>,
    notify: Notify,
}

impl<T, E> JobQueue<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: BTreeMap::new(),
                index: HashMap::new(),
                next_sequence: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T, E>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Job queue mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Enqueue a job. Hands the job back if the queue is closed.
    pub(crate) fn push(&self, job: Job<T, E>) -> Result<(), Job<T, E>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(job);
            }
            let key = QueueKey {
                priority: job.priority,
                sequence: state.next_sequence,
            };
            state.next_sequence += 1;
            state.index.insert(job.id, key);
            state.pending.insert(key, job);
        }
        self.notify.notify_one();
        Ok(())
    }

    pub(crate) fn pop(&self) -> Option<Job<T, E>> {
        let mut state = self.lock();
        let (_, job) = state.pending.pop_first()?;
        state.index.remove(&job.id);
        Some(job)
    }

    /// Pop the next job, waiting at most `poll` for one to arrive.
    pub(crate) async fn pop_or_wait(&self, poll: Duration) -> Option<Job<T, E>> {
        if let Some(job) = self.pop() {
            return Some(job);
        }
        let _ = tokio::time::timeout(poll, self.notify.notified()).await;
        self.pop()
    }

    /// Remove a job that has not been claimed yet.
    pub(crate) fn remove(&self, id: JobId) -> Option<Job<T, E>> {
        let mut state = self.lock();
        let key = state.index.remove(&id)?;
        state.pending.remove(&key)
    }

    /// Refuse further pushes and hand back everything still queued, in
    /// dequeue order.
    pub(crate) fn close(&self) -> Vec<Job<T, E>> {
        let drained = {
            let mut state = self.lock();
            state.closed = true;
            state.index.clear();
            std::mem::take(&mut state.pending)
        };
        self.notify.notify_waiters();
        drained.into_values().collect()
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use futures::FutureExt;

    use super::*;

    fn job(id: u64, priority: Priority) -> Job<u64, ()> {
        Job {
            id: JobId(id),
            priority,
            operation: async move { Ok(id) }.boxed(),
            timeout: None,
            created_at: Utc::now(),
        }
    }

    fn drain(queue: &JobQueue<u64, ()>) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop()).map(|j| j.id.value()).collect()
    }

    #[test]
    fn test_higher_priority_first_then_fifo() {
        let queue = JobQueue::new();
        queue.push(job(1, Priority::Normal)).unwrap();
        queue.push(job(2, Priority::Low)).unwrap();
        queue.push(job(3, Priority::Critical)).unwrap();
        queue.push(job(4, Priority::Normal)).unwrap();
        queue.push(job(5, Priority::High)).unwrap();

        assert_eq!(drain(&queue), vec![3, 5, 1, 4, 2]);
    }

    #[test]
    fn test_remove_only_while_queued() {
        let queue = JobQueue::new();
        queue.push(job(1, Priority::Normal)).unwrap();
        queue.push(job(2, Priority::Normal)).unwrap();

        assert!(queue.remove(JobId(1)).is_some());
        assert!(queue.remove(JobId(1)).is_none());
        assert_eq!(queue.pop().map(|j| j.id), Some(JobId(2)));
        assert!(queue.remove(JobId(2)).is_none());
    }

    #[test]
    fn test_close_drains_and_rejects() {
        let queue = JobQueue::new();
        queue.push(job(1, Priority::Low)).unwrap();
        queue.push(job(2, Priority::High)).unwrap();

        let drained: Vec<u64> = queue.close().into_iter().map(|j| j.id.value()).collect();
        assert_eq!(drained, vec![2, 1]);
        assert!(queue.is_closed());
        assert!(queue.push(job(3, Priority::Normal)).is_err());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_or_wait_wakes_on_push() {
        let queue = std::sync::Arc::new(JobQueue::new());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop_or_wait(Duration::from_secs(10)).await })
        };
        tokio::task::yield_now().await;
        queue.push(job(7, Priority::Normal)).unwrap();

        let popped = waiter.await.unwrap();
        assert_eq!(popped.map(|j| j.id), Some(JobId(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_or_wait_is_bounded() {
        let queue: JobQueue<u64, ()> = JobQueue::new();
        let start = tokio::time::Instant::now();
        assert!(queue.pop_or_wait(Duration::from_millis(250)).await.is_none());
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
