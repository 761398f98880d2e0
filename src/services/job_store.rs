use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::models::job::{Job, JobId, JobKind, JobStatus};
use crate::models::queue::{QueueCounts, ResourceJobStatus};

/// How long, and how many, finished jobs stay visible to status queries.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub max_age: Duration,
    pub max_jobs: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(600),
            max_jobs: 1000,
        }
    }
}

/// In-memory job bookkeeping: FIFO pending list, in-flight map and a
/// bounded log of finished jobs.
///
/// Owned by the dispatcher; callers outside the queue only see it through
/// read-only snapshots.
#[derive(Debug, Default)]
pub struct JobStore {
    pending: VecDeque<Job>,
    processing: HashMap<JobId, Job>,
    finished: VecDeque<Job>,
    completed: usize,
    failed: usize,
    retention: Retention,
}

impl JobStore {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Append a new pending job and return its id. Never fails.
    pub fn enqueue(&mut self, resource_id: impl Into<String>, kind: JobKind) -> JobId {
        self.evict_expired(Utc::now());
        let job = Job::new(resource_id, kind);
        let id = job.id;
        self.pending.push_back(job);
        id
    }

    /// Pop the oldest pending job and mark it `processing`.
    ///
    /// The returned clone is what the dispatcher hands to a handler; the
    /// authoritative record stays in the processing map.
    pub fn dequeue_next(&mut self) -> Option<Job> {
        let mut job = self.pending.pop_front()?;
        if let Err(e) = job.start() {
            tracing::error!(job_id = %job.id, error = %e, "Pending job was not claimable");
            return None;
        }
        self.processing.insert(job.id, job.clone());
        Some(job)
    }

    /// Move an in-flight job into the finished log with its outcome.
    ///
    /// Returns a copy of the finished job, or `None` when the id is not in
    /// flight. The copy survives even if retention evicts the record at once.
    pub fn record_finished(&mut self, id: JobId, outcome: Result<(), String>) -> Option<Job> {
        let mut job = self.processing.remove(&id)?;
        if let Err(e) = job.finish(outcome) {
            tracing::error!(job_id = %id, error = %e, "Refusing illegal job transition");
            self.processing.insert(id, job);
            return None;
        }
        match job.status {
            JobStatus::Failed => self.failed += 1,
            _ => self.completed += 1,
        }
        let finished = job.clone();
        self.finished.push_back(job);
        self.evict_expired(Utc::now());
        Some(finished)
    }

    /// Status of the most relevant job per requested resource id.
    ///
    /// Preference: in flight, then pending, then the finished log. Among
    /// finished jobs the latest run of each kind counts, and a failure of
    /// any kind outranks a success of another.
    pub fn query_by_resource_ids(&self, ids: &[String]) -> Vec<ResourceJobStatus> {
        ids.iter().map(|id| self.lookup(id)).collect()
    }

    fn lookup(&self, resource_id: &str) -> ResourceJobStatus {
        let found = self
            .processing
            .values()
            .find(|j| j.resource_id == resource_id)
            .or_else(|| self.pending.iter().find(|j| j.resource_id == resource_id))
            .or_else(|| self.settled(resource_id));

        match found {
            Some(job) => ResourceJobStatus {
                resource_id: resource_id.to_string(),
                status: job.status.into(),
                error: job.error.clone(),
            },
            None => ResourceJobStatus::not_found(resource_id),
        }
    }

    fn settled(&self, resource_id: &str) -> Option<&Job> {
        let mut seen: Vec<JobKind> = Vec::new();
        let mut newest = None;
        for job in self.finished.iter().rev().filter(|j| j.resource_id == resource_id) {
            if seen.contains(&job.kind) {
                continue;
            }
            seen.push(job.kind);
            if job.status == JobStatus::Failed {
                return Some(job);
            }
            newest.get_or_insert(job);
        }
        newest
    }

    /// Aggregate counts. `completed`/`failed` cover jobs still retained in
    /// the finished log.
    pub fn snapshot_counts(&self) -> QueueCounts {
        let pending = self.pending.len();
        let processing = self.processing.len();
        QueueCounts {
            pending,
            processing,
            completed: self.completed,
            failed: self.failed,
            total: pending + processing + self.completed + self.failed,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn processing_len(&self) -> usize {
        self.processing.len()
    }

    /// Drop finished jobs past the retention window or over the size cap.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::from_std(self.retention.max_age)
            .unwrap_or(chrono::Duration::MAX);
        let mut evicted = 0;

        while let Some(oldest) = self.finished.front() {
            let expired = oldest
                .processed_at
                .is_some_and(|at| now.signed_duration_since(at) > max_age);
            if !expired && self.finished.len() <= self.retention.max_jobs {
                break;
            }
            if let Some(job) = self.finished.pop_front() {
                match job.status {
                    JobStatus::Failed => self.failed -= 1,
                    _ => self.completed -= 1,
                }
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::debug!(evicted, retained = self.finished.len(), "Evicted finished jobs");
        }
        evicted
    }
}
