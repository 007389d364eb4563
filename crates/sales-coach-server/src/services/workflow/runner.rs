use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use flume::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::finalize::FinalizeWorkflow;
use crate::config::WorkflowConfig;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub workflow_id: Uuid,
    pub session_id: String,
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Finalization queue is full, try again later")]
    QueueFull,

    #[error("Finalization runner is shut down")]
    Closed,
}

#[derive(Debug)]
struct FinalizeJob {
    workflow_id: Uuid,
    session_id: String,
    conversation_id: Option<Uuid>,
}

/// Bounded queue plus worker pool for finalization jobs.
///
/// Each triggered job is dequeued by exactly one worker and run once.
///
/// Finished records are kept for `record_ttl_seconds` and swept by the
/// workers after each job.
pub struct WorkflowRunner {
    /// `None` once shutdown has closed the queue.
    sender: RwLock<Option<Sender<FinalizeJob>>>,
    records: Arc<DashMap<Uuid, WorkflowRecord>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkflowRunner {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn start(workflow: Arc<FinalizeWorkflow>, config: &WorkflowConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let records = Arc::new(DashMap::new());

        // Out-of-range TTLs mean records are never pruned
        let record_ttl = i64::try_from(config.record_ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds);

        info!(
            "Initializing WorkflowRunner: queue={}, workers={}, record_ttl={}s",
            config.queue_capacity, config.worker_count, config.record_ttl_seconds
        );

        let workers = (0..config.worker_count.max(1))
            .map(|worker_id| {
                let receiver = receiver.clone();
                let workflow = workflow.clone();
                let records = records.clone();

                tokio::spawn(async move {
                    Self::worker_loop(worker_id, workflow, receiver, records, record_ttl).await;
                })
            })
            .collect();

        Self {
            sender: RwLock::new(Some(sender)),
            records,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue finalization for a session's current conversation and return
    /// the workflow id.
    pub fn trigger(
        &self,
        session_id: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<Uuid, WorkflowError> {
        let workflow_id = Uuid::new_v4();
        self.records.insert(
            workflow_id,
            WorkflowRecord {
                workflow_id,
                session_id: session_id.to_string(),
                status: WorkflowStatus::Queued,
                error: None,
                queued_at: Utc::now(),
                finished_at: None,
            },
        );

        let job = FinalizeJob {
            workflow_id,
            session_id: session_id.to_string(),
            conversation_id,
        };

        let sent = match self.sender.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(sender) => sender.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => WorkflowError::QueueFull,
                TrySendError::Disconnected(_) => WorkflowError::Closed,
            }),
            None => Err(WorkflowError::Closed),
        };

        if let Err(e) = sent {
            self.records.remove(&workflow_id);
            return Err(e);
        }

        info!("Queued finalization {} for session {}", workflow_id, session_id);
        Ok(workflow_id)
    }

    pub fn status(&self, workflow_id: &Uuid) -> Option<WorkflowRecord> {
        self.records.get(workflow_id).map(|r| r.value().clone())
    }

    /// Jobs waiting to be picked up.
    pub fn queue_len(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Sender::len)
    }

    /// Stop accepting jobs, let workers drain the queue, then wait for them.
    pub async fn shutdown(&self) {
        drop(self.sender.write().unwrap_or_else(PoisonError::into_inner).take());

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!("Workflow worker panicked: {}", e);
            }
        }
        info!("WorkflowRunner stopped");
    }

    async fn worker_loop(
        worker_id: usize,
        workflow: Arc<FinalizeWorkflow>,
        receiver: Receiver<FinalizeJob>,
        records: Arc<DashMap<Uuid, WorkflowRecord>>,
        record_ttl: Option<TimeDelta>,
    ) {
        info!("Workflow worker {} started", worker_id);

        while let Ok(job) = receiver.recv_async().await {
            Self::set_status(&records, &job.workflow_id, WorkflowStatus::Running, None);

            match workflow.run(&job.session_id, job.conversation_id).await {
                Ok(Some(_)) => {
                    Self::set_status(&records, &job.workflow_id, WorkflowStatus::Complete, None);
                }
                Ok(None) => {
                    warn!(
                        "Worker {} discarded finalization {}: session {} was reset",
                        worker_id, job.workflow_id, job.session_id
                    );
                    Self::set_status(
                        &records,
                        &job.workflow_id,
                        WorkflowStatus::Failed,
                        Some("Session was reset before finalization completed".to_string()),
                    );
                }
                Err(e) => {
                    error!(
                        "Worker {} failed finalization {} for session {}: {}",
                        worker_id, job.workflow_id, job.session_id, e
                    );
                    Self::set_status(
                        &records,
                        &job.workflow_id,
                        WorkflowStatus::Failed,
                        Some(e.to_string()),
                    );
                }
            }

            if let Some(ttl) = record_ttl {
                let pruned = Self::prune_finished(&records, ttl);
                if pruned > 0 {
                    debug!("Worker {} pruned {} finished workflow records", worker_id, pruned);
                }
            }
        }

        info!("Workflow worker {} shutting down (channel closed)", worker_id);
    }

    /// Drop records that finished longer than `ttl` ago. Returns how many went.
    fn prune_finished(records: &DashMap<Uuid, WorkflowRecord>, ttl: TimeDelta) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return 0;
        };

        let before = records.len();
        records.retain(|_, record| record.finished_at.map_or(true, |at| at > cutoff));
        before.saturating_sub(records.len())
    }

    fn set_status(
        records: &DashMap<Uuid, WorkflowRecord>,
        workflow_id: &Uuid,
        status: WorkflowStatus,
        error: Option<String>,
    ) {
        match records.get_mut(workflow_id) {
            Some(mut record) => {
                if matches!(status, WorkflowStatus::Complete | WorkflowStatus::Failed) {
                    record.finished_at = Some(Utc::now());
                }
                record.status = status;
                record.error = error;
            }
            None => warn!("Status update for unknown workflow {}", workflow_id),
        }
    }
}
