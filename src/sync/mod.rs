//! Governance snapshot sync pipeline
//!
//! RealmResolver -> ProposalEnumerator -> CacheDiffEngine ->
//! VoteRecordFetcher (+ QuorumCalculator) -> SnapshotSerializer ->
//! StorageUploader -> ManifestManager, driven by [`job::SyncJob`].

pub mod cache_diff;
pub mod enumerate;
pub mod job;
pub mod lifecycle;
pub mod manifest;
pub mod progress;
pub mod quorum;
pub mod realm;
pub mod serializer;
pub mod uploader;
pub mod votes;


pub use job::{ManifestOutcome, SyncJob, SyncOptions, SyncReport, SyncRequest};
pub use progress::{ProgressEvent, ProgressReporter, SyncPhase};
