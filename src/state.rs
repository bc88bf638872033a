//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::codec::{Codec, DeflateCodec};
use crate::jobs::JobStore;
use crate::rpc::GovernanceRpc;
use crate::storage::StorageClient;
use crate::sync::SyncOptions;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Chain backend the sync jobs read from
    pub rpc: Arc<dyn GovernanceRpc>,

    /// Storage pool the artifacts and manifest are published to
    pub storage: Arc<dyn StorageClient>,

    pub codec: Arc<dyn Codec>,

    /// Spawned sync jobs
    pub jobs: JobStore,

    pub options: SyncOptions,
}

impl AppState {
    pub fn new(
        rpc: Arc<dyn GovernanceRpc>,
        storage: Arc<dyn StorageClient>,
        options: SyncOptions,
    ) -> Self {
        Self {
            rpc,
            storage,
            codec: Arc::new(DeflateCodec::new()),
            jobs: JobStore::new(),
            options,
        }
    }

    /// Replace the job registry with one that keeps `retain` finished jobs
    pub fn with_job_retention(mut self, retain: usize) -> Self {
        self.jobs = JobStore::with_retention(retain);
        self
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
