//! Progress reporting
//!
//! The sync job emits one discrete event per phase transition plus
//! percentage updates inside the fan-out phases. Percentages are only real
//! once enumeration has established the totals; before that they are 0.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "target", rename_all = "snake_case")]
pub enum SyncPhase {
    ResolveRealm,
    Enumerate,
    Diff,
    FetchVotes,
    FetchMembers,
    FetchTransactions,
    Serialize,
    Upload(String),
    ManifestUpdate,
    Cleanup,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: SyncPhase,
    /// 0-100 within the current phase
    pub percent: f64,
    pub status: String,
    /// `true` for a phase transition, `false` for an in-phase update
    pub transition: bool,
}

/// Sink receiving progress events
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, event: ProgressEvent);
}

/// Helper the pipeline stages use to emit events
pub struct Progress<'a> {
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Progress<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self { reporter }
    }

    pub async fn phase(&self, phase: SyncPhase, status: impl Into<String>) {
        self.reporter
            .report(ProgressEvent {
                phase,
                percent: 0.0,
                status: status.into(),
                transition: true,
            })
            .await;
    }

    pub async fn update(&self, phase: SyncPhase, percent: f64, status: impl Into<String>) {
        self.reporter
            .report(ProgressEvent {
                phase,
                percent,
                status: status.into(),
                transition: false,
            })
            .await;
    }
}

/// Monotonic completion counter over a total known up front
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    done: usize,
    total: usize,
}

impl Counter {
    pub fn new(total: usize) -> Self {
        Self { done: 0, total }
    }

    /// Record one completion and return the new percentage
    pub fn advance(&mut self) -> f64 {
        self.done = (self.done + 1).min(self.total);
        self.percent()
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

/// Reporter that keeps every event, for inspection
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    pub async fn transitions(&self) -> Vec<SyncPhase> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.transition)
            .map(|e| e.phase.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report(&self, event: ProgressEvent) {
        self.events.lock().await.push(event);
    }
}
