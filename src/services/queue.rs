use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{self, JoinSet};

use crate::models::job::{JobId, JobKind, JobStatus};
use crate::models::queue::{QueueCounts, ResourceJobStatus};
use crate::services::handlers::HandlerRegistry;
use crate::services::job_store::{JobStore, Retention};

/// Dispatcher settings, fixed for the lifetime of a queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum number of jobs executing at once.
    pub concurrency: usize,
    pub finished_retention: Duration,
    pub max_finished_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let retention = Retention::default();
        Self {
            concurrency: 3,
            finished_retention: retention.max_age,
            max_finished_jobs: retention.max_jobs,
        }
    }
}

struct State {
    store: JobStore,
    running: bool,
}

struct Inner {
    state: Mutex<State>,
    handlers: HandlerRegistry,
    concurrency: usize,
    idle: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Store updates never panic midway; a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-process job queue with bounded concurrency.
///
/// Cloning yields another handle to the same queue. Enqueuing while idle
/// starts a dispatcher task on the current Tokio runtime; the dispatcher
/// exits once nothing is pending or running.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

/// Read-only view over a [`JobQueue`] for status endpoints.
#[derive(Clone)]
pub struct StatusReporter {
    inner: Arc<Inner>,
}

/// A job handed to a handler task, kept so a task that dies can still be
/// settled.
#[derive(Clone)]
struct Claim {
    id: JobId,
    kind: JobKind,
    resource_id: String,
}

struct Finished {
    claim: Claim,
    outcome: Result<(), String>,
}

impl JobQueue {
    pub fn new(config: QueueConfig, handlers: HandlerRegistry) -> Result<Self, QueueError> {
        if config.concurrency == 0 {
            return Err(QueueError::InvalidConcurrency);
        }
        let retention = Retention {
            max_age: config.finished_retention,
            max_jobs: config.max_finished_jobs,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    store: JobStore::new(retention),
                    running: false,
                }),
                handlers,
                concurrency: config.concurrency,
                idle: Notify::new(),
            }),
        })
    }

    /// Queue work for a resource. Never blocks and never fails.
    ///
    /// Must be called from within a Tokio runtime, since it may spawn the
    /// dispatcher.
    pub fn enqueue(&self, resource_id: impl Into<String>, kind: JobKind) -> JobId {
        let resource_id = resource_id.into();
        let (id, start) = {
            let mut state = self.inner.lock();
            let id = state.store.enqueue(resource_id.clone(), kind);
            let start = !state.running;
            state.running = true;
            (id, start)
        };

        metrics::counter!("media_jobs_enqueued_total", "kind" => kind.to_string()).increment(1);
        tracing::debug!(job_id = %id, resource_id = %resource_id, kind = %kind, "Job enqueued");

        if start {
            tokio::spawn(dispatch(self.inner.clone()));
        }
        id
    }

    pub fn reporter(&self) -> StatusReporter {
        StatusReporter {
            inner: self.inner.clone(),
        }
    }

    pub fn queue_status(&self) -> QueueCounts {
        self.reporter().queue_status()
    }

    pub fn jobs_by_resource_ids(&self, ids: &[String]) -> Vec<ResourceJobStatus> {
        self.reporter().jobs_by_resource_ids(ids)
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Resolve once the dispatcher has drained all work and gone idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

impl StatusReporter {
    pub fn queue_status(&self) -> QueueCounts {
        self.inner.lock().store.snapshot_counts()
    }

    pub fn jobs_by_resource_ids(&self, ids: &[String]) -> Vec<ResourceJobStatus> {
        self.inner.lock().store.query_by_resource_ids(ids)
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }
}

/// Dispatcher loop: fill free slots in FIFO order, then wait for whichever
/// running handler settles first.
async fn dispatch(inner: Arc<Inner>) {
    tracing::debug!(concurrency = inner.concurrency, "Job dispatcher started");
    let mut active: JoinSet<Finished> = JoinSet::new();
    let mut claims: HashMap<task::Id, Claim> = HashMap::new();

    loop {
        {
            let mut state = inner.lock();
            while active.len() < inner.concurrency {
                let Some(job) = state.store.dequeue_next() else {
                    break;
                };
                tracing::info!(
                    job_id = %job.id,
                    resource_id = %job.resource_id,
                    kind = %job.kind,
                    "Processing job"
                );
                let claim = Claim {
                    id: job.id,
                    kind: job.kind,
                    resource_id: job.resource_id,
                };

                match inner.handlers.get(claim.kind) {
                    Some(handler) => {
                        let task_claim = claim.clone();
                        let handle = active.spawn(async move {
                            let resource_id = task_claim.resource_id.clone();
                            let outcome = AssertUnwindSafe(async move { handler.handle(resource_id).await })
                                .catch_unwind()
                                .await;
                            let outcome = match outcome {
                                Ok(Ok(())) => Ok(()),
                                Ok(Err(e)) => Err(e.message().to_string()),
                                Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
                            };
                            Finished {
                                claim: task_claim,
                                outcome,
                            }
                        });
                        claims.insert(handle.id(), claim);
                    }
                    None => {
                        let message = format!("no handler registered for job kind '{}'", claim.kind);
                        record(
                            &mut state.store,
                            Finished {
                                claim,
                                outcome: Err(message),
                            },
                        );
                    }
                }
            }

            update_gauges(&state.store);

            if active.is_empty() {
                // Checked under the same lock enqueue takes, so a job added
                // after this point sees `running == false` and starts a new loop.
                state.running = false;
                drop(state);
                tracing::debug!("Job dispatcher idle");
                inner.idle.notify_waiters();
                return;
            }
        }

        let finished = match active.join_next_with_id().await {
            Some(Ok((task_id, finished))) => {
                claims.remove(&task_id);
                finished
            }
            Some(Err(e)) => {
                let Some(claim) = claims.remove(&e.id()) else {
                    tracing::error!(error = %e, "Unknown job task did not complete");
                    continue;
                };
                tracing::error!(job_id = %claim.id, error = %e, "Job task did not complete");
                Finished {
                    claim,
                    outcome: Err(format!("job task did not complete: {e}")),
                }
            }
            None => continue,
        };

        let mut state = inner.lock();
        record(&mut state.store, finished);
        update_gauges(&state.store);
    }
}

fn record(store: &mut JobStore, finished: Finished) {
    let Finished {
        claim: Claim {
            id,
            kind,
            resource_id,
        },
        outcome,
    } = finished;
    let Some(job) = store.record_finished(id, outcome) else {
        return;
    };
    let elapsed = job.run_time().unwrap_or_default();

    metrics::histogram!("media_job_duration_seconds", "kind" => kind.to_string())
        .record(elapsed.as_secs_f64());

    match job.status {
        JobStatus::Failed => {
            metrics::counter!("media_jobs_failed_total", "kind" => kind.to_string()).increment(1);
            tracing::warn!(
                job_id = %id,
                resource_id = %resource_id,
                kind = %kind,
                error = job.error.as_deref().unwrap_or_default(),
                "Job failed"
            );
        }
        _ => {
            metrics::counter!("media_jobs_completed_total", "kind" => kind.to_string())
                .increment(1);
            tracing::info!(
                job_id = %id,
                resource_id = %resource_id,
                kind = %kind,
                duration_ms = elapsed.as_millis() as u64,
                "Job complete"
            );
        }
    }
}

fn update_gauges(store: &JobStore) {
    metrics::gauge!("media_jobs_pending").set(store.pending_len() as f64);
    metrics::gauge!("media_jobs_processing").set(store.processing_len() as f64);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue concurrency must be at least 1")]
    InvalidConcurrency,
}
