// SPDX-License-Identifier: MIT OR Apache-2.0
//! FIFO job queue for the BBS job subsystem (§4.F).
//!
//! Unlike a scheduling queue that owns its payloads, [`JobQueue`] holds only
//! job ids — the job records themselves live in the store under
//! `job_queue`/`jobs`. The worker pops ids in submission order and looks the
//! job up in the store to run it; per §8's quantified invariants, every id
//! left in the queue names a job whose status is `Created` or `Queued`, and
//! no terminal job ever appears here.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Errors returned by [`JobQueue`] operations.
#[derive(Debug, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has reached its maximum capacity.
    Full {
        /// Maximum number of ids the queue can hold.
        max: usize,
    },
    /// The given job id is already enqueued.
    DuplicateId(u64),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full { max } => write!(f, "job queue is full (max {max})"),
            QueueError::DuplicateId(id) => write!(f, "job {id} is already queued"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Snapshot statistics for a [`JobQueue`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of ids currently queued.
    pub total: usize,
    /// Maximum queue capacity.
    pub max: usize,
}

/// A bounded FIFO queue of pending job ids.
///
/// Ordering is strict submission order: [`dequeue`](JobQueue::dequeue)
/// always returns the id that has waited longest, with no priority
/// reordering — the original system does not prioritize jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQueue {
    entries: VecDeque<u64>,
    max_size: usize,
}

impl JobQueue {
    /// Create a new queue with the given maximum capacity. `0` means
    /// unbounded.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size,
        }
    }

    /// Add a job id to the back of the queue.
    ///
    /// Returns an error if the queue is full or the id is already present.
    pub fn enqueue(&mut self, job_id: u64) -> Result<(), QueueError> {
        if self.max_size > 0 && self.entries.len() >= self.max_size {
            return Err(QueueError::Full { max: self.max_size });
        }
        if self.entries.contains(&job_id) {
            return Err(QueueError::DuplicateId(job_id));
        }
        self.entries.push_back(job_id);
        Ok(())
    }

    /// Remove and return the oldest queued job id.
    pub fn dequeue(&mut self) -> Option<u64> {
        self.entries.pop_front()
    }

    /// Peek at the next id that would be dequeued without removing it.
    pub fn peek(&self) -> Option<u64> {
        self.entries.front().copied()
    }

    /// Return the number of queued ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` if the queue contains no ids.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return `true` if the queue has reached its maximum capacity.
    pub fn is_full(&self) -> bool {
        self.max_size > 0 && self.entries.len() >= self.max_size
    }

    /// Remove a specific job id, returning `true` if it was present.
    ///
    /// Used when a quick-mode request's job reaches a terminal state before
    /// the worker tick pops it — the job must not remain queued once it is
    /// no longer `Created`/`Queued`.
    pub fn remove(&mut self, job_id: u64) -> bool {
        if let Some(pos) = self.entries.iter().position(|id| *id == job_id) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Remove all entries from the queue.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return all currently queued ids, oldest first.
    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().copied().collect()
    }

    /// Return a snapshot of queue statistics.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total: self.entries.len(),
            max: self.max_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dequeue_is_fifo() {
        let mut q = JobQueue::new(0);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut q = JobQueue::new(0);
        q.enqueue(7).unwrap();
        assert_eq!(q.enqueue(7), Err(QueueError::DuplicateId(7)));
    }

    #[test]
    fn bounded_queue_rejects_past_capacity() {
        let mut q = JobQueue::new(2);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert_eq!(q.enqueue(3), Err(QueueError::Full { max: 2 }));
        assert!(q.is_full());
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        let mut q = JobQueue::new(0);
        for id in 0..1000 {
            q.enqueue(id).unwrap();
        }
        assert_eq!(q.len(), 1000);
        assert!(!q.is_full());
    }

    #[test]
    fn remove_drops_a_specific_id_without_disturbing_order() {
        let mut q = JobQueue::new(0);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert!(q.remove(2));
        assert!(!q.remove(2));
        assert_eq!(q.ids(), vec![1, 3]);
    }

    #[test]
    fn peek_does_not_remove() {
        let mut q = JobQueue::new(0);
        q.enqueue(5).unwrap();
        assert_eq!(q.peek(), Some(5));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn stats_reports_total_and_max() {
        let mut q = JobQueue::new(10);
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        let stats = q.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.max, 10);
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut q = JobQueue::new(0);
        q.enqueue(1).unwrap();
        q.clear();
        assert!(q.is_empty());
    }
}
