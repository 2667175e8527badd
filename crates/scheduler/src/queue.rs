//! Bounded FIFO of pending leaf jobs.
//!
//! Producers either fail fast with [`JobQueue::try_push`] or suspend in
//! [`JobQueue::push`] until a consumer frees a slot. Consumers never wait:
//! [`JobQueue::try_pop`] returns `None` on an empty queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::QueueFull;
use crate::job::Job;

pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    capacity: usize,
    /// Signalled once per pop. A permit left behind by a pop with no waiter
    /// wakes the next producer immediately, so wakeups are never lost.
    space: Notify,
    high_water: AtomicUsize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            space: Notify::new(),
            high_water: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue without waiting. A full queue hands the job back.
    pub fn try_push(&self, job: Job) -> Result<(), QueueFull> {
        let mut jobs = self.lock();
        if jobs.len() >= self.capacity {
            return Err(QueueFull(job));
        }
        jobs.push_back(job);
        self.high_water.fetch_max(jobs.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue, suspending while the queue is full.
    pub async fn push(&self, job: Job) {
        let mut job = job;
        loop {
            match self.try_push(job) {
                Ok(()) => return,
                Err(QueueFull(rejected)) => {
                    job = rejected;
                    self.space.notified().await;
                }
            }
        }
    }

    /// Dequeue the oldest job, if any.
    pub fn try_pop(&self) -> Option<Job> {
        let job = self.lock().pop_front();
        if job.is_some() {
            self.space.notify_one();
        }
        job
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest length the queue has reached.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}
