//! Sync job registry
//!
//! Tracks spawned sync jobs: their latest progress event, final report or
//! error, and the token used to cancel them.

use crate::error::SyncError;
use crate::sync::{ProgressEvent, ProgressReporter, SyncReport, SyncRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Public view of a job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub request: SyncRequest,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_event: Option<ProgressEvent>,
    pub report: Option<SyncReport>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

struct JobEntry {
    record: JobRecord,
    cancel: CancellationToken,
}

/// Finished jobs kept for inspection before the oldest are evicted
pub const DEFAULT_RETAINED_JOBS: usize = 100;

/// Registry of sync jobs
#[derive(Clone)]
pub struct JobStore {
    /// Job ID -> entry
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    retain_finished: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain_finished` finished jobs; running jobs are never evicted
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retain_finished,
        }
    }

    /// Register a running job. Fails if the same governance is already syncing.
    pub async fn start(&self, request: SyncRequest) -> Result<(Uuid, CancellationToken), Uuid> {
        let mut jobs = self.jobs.write().await;

        if let Some((id, _)) = jobs.iter().find(|(_, entry)| {
            entry.record.status == JobStatus::Running
                && entry.record.request.governance_address == request.governance_address
        }) {
            return Err(*id);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        jobs.insert(
            id,
            JobEntry {
                record: JobRecord {
                    id,
                    request,
                    status: JobStatus::Running,
                    started_at: Utc::now(),
                    finished_at: None,
                    last_event: None,
                    report: None,
                    error: None,
                    error_code: None,
                },
                cancel: cancel.clone(),
            },
        );
        Ok((id, cancel))
    }

    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).map(|e| e.record.clone())
    }

    /// All jobs, newest first
    pub async fn list(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.read().await;
        let mut records: Vec<JobRecord> = jobs.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    pub async fn record_event(&self, id: Uuid, event: ProgressEvent) {
        if let Some(entry) = self.jobs.write().await.get_mut(&id) {
            entry.record.last_event = Some(event);
        }
    }

    pub async fn finish(&self, id: Uuid, result: Result<SyncReport, SyncError>) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&id) else {
            warn!("Finished unknown job {}", id);
            return;
        };

        let record = &mut entry.record;
        record.finished_at = Some(Utc::now());
        match result {
            Ok(report) => {
                info!("Job {} completed", id);
                record.status = JobStatus::Completed;
                record.report = Some(report);
            }
            Err(SyncError::Cancelled) => {
                info!("Job {} cancelled", id);
                record.status = JobStatus::Cancelled;
                record.error_code = Some(SyncError::Cancelled.code().to_string());
            }
            Err(e) => {
                warn!("Job {} failed: {}", id, e);
                record.status = JobStatus::Failed;
                record.error_code = Some(e.code().to_string());
                record.error = Some(e.to_string());
            }
        }

        Self::evict_finished(&mut jobs, self.retain_finished);
    }

    fn evict_finished(jobs: &mut HashMap<Uuid, JobEntry>, keep: usize) {
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
            .values()
            .filter_map(|e| e.record.finished_at.map(|at| (at, e.record.id)))
            .collect();
        if finished.len() <= keep {
            return;
        }

        finished.sort();
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
        debug!("Evicted {} finished jobs", excess);
    }

    /// Request cancellation. `None` if the job is unknown.
    pub async fn cancel(&self, id: Uuid) -> Option<JobRecord> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id)?;
        if entry.record.status == JobStatus::Running {
            info!("Cancelling job {}", id);
            entry.cancel.cancel();
        }
        Some(entry.record.clone())
    }

    pub async fn cancel_all(&self) {
        let jobs = self.jobs.read().await;
        for entry in jobs.values().filter(|e| e.record.status == JobStatus::Running) {
            entry.cancel.cancel();
        }
    }
}

/// Progress sink for one job
pub struct JobReporter {
    jobs: JobStore,
    id: Uuid,
}

impl JobReporter {
    pub fn new(jobs: JobStore, id: Uuid) -> Self {
        Self { jobs, id }
    }
}

#[async_trait]
impl ProgressReporter for JobReporter {
    async fn report(&self, event: ProgressEvent) {
        if event.transition {
            info!("Job {} [{:?}] {}", self.id, event.phase, event.status);
        } else {
            debug!("Job {} [{:?}] {:.1}% {}", self.id, event.phase, event.percent, event.status);
        }
        self.jobs.record_event(self.id, event).await;
    }
}
