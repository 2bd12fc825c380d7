// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cooperative job queue for the worker thread.
//!
//! Jobs run one at a time. Delayed jobs wait on the runtime timer, so no
//! extra thread is involved. Jobs that are due at the same instant run in
//! the order they were posted.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Work item posted to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Job {
    /// Open the link and run the ELM327 init sequence.
    Connect,
    /// Query the fuel level on the open session.
    Poll,
}

/// A job together with the delay it was posted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub job: Job,
    pub delay: Duration,
}

impl Scheduled {
    pub fn now(job: Job) -> Self {
        Self::after(job, Duration::ZERO)
    }

    pub fn after(job: Job, delay: Duration) -> Self {
        Self { job, delay }
    }
}

/// Time-ordered queue of pending jobs.
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: BinaryHeap<Reverse<(Instant, u64, Job)>>,
    seq: u64,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a job to run as soon as the worker is free.
    pub fn post(&mut self, job: Job) {
        self.post_delayed(job, Duration::ZERO);
    }

    /// Post a job to run once `delay` has elapsed.
    pub fn post_delayed(&mut self, job: Job, delay: Duration) {
        self.seq += 1;
        self.pending
            .push(Reverse((Instant::now() + delay, self.seq, job)));
    }

    pub fn schedule(&mut self, scheduled: Scheduled) {
        self.post_delayed(scheduled.job, scheduled.delay);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for the earliest job to fall due and take it.
    ///
    /// Returns `None` when nothing is queued.
    pub async fn next(&mut self) -> Option<Job> {
        let Reverse((due, _, _)) = *self.pending.peek()?;
        sleep_until(due).await;
        self.pending.pop().map(|Reverse((_, _, job))| job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ready_jobs_run_in_post_order() {
        let mut queue = WorkQueue::new();
        queue.post(Job::Poll);
        queue.post(Job::Connect);

        assert_eq!(queue.next().await, Some(Job::Poll));
        assert_eq!(queue.next().await, Some(Job::Connect));
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_job_not_before_due() {
        let mut queue = WorkQueue::new();
        let start = Instant::now();
        queue.post_delayed(Job::Connect, Duration::from_millis(5000));

        let early = tokio::time::timeout(Duration::from_millis(4999), queue.next()).await;
        assert!(early.is_err());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.next().await, Some(Job::Connect));
        assert!(start.elapsed() >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_due_wins_over_post_order() {
        let mut queue = WorkQueue::new();
        queue.post_delayed(Job::Poll, Duration::from_secs(30));
        queue.post(Job::Connect);

        assert_eq!(queue.next().await, Some(Job::Connect));
        assert_eq!(queue.next().await, Some(Job::Poll));
    }
}
