//! Sync Job
//!
//! Runs one snapshot sync end to end: resolve, enumerate, diff, fetch,
//! serialize, upload the artifacts, then read-modify-write the manifest.
//! Each step's result is passed explicitly to the next.

use crate::codec::Codec;
use crate::error::SyncError;
use crate::models::{GovernanceProposal, ManifestEntry, Realm};
use crate::rpc::GovernanceRpc;
use crate::storage::StorageClient;
use crate::sync::cache_diff::{AnnotatedProposal, CacheDiffEngine, DiffSummary, FetchDecision};
use crate::sync::enumerate::{HistoryPaging, ProposalEnumerator};
use crate::sync::manifest::{LoadedManifest, ManifestManager};
use crate::sync::progress::{Progress, ProgressReporter, SyncPhase};
use crate::sync::quorum::{QuorumCalculator, QuorumInputs};
use crate::sync::realm::RealmResolver;
use crate::sync::serializer::{
    proposals_filename, ArtifactNames, SnapshotArtifact, SnapshotSerializer, MANIFEST_FILENAME,
};
use crate::sync::uploader::{format_size, StorageUploader, UploadOutcome};
use crate::sync::votes::{normalize, FailedProposal, VoteRecordFetcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One snapshot request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub governance_address: String,
    pub name: String,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Tunables shared by every sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub pool: String,
    /// Max in-flight calls in the vote and balance fan-outs
    pub concurrency: usize,
    pub paging: HistoryPaging,
    /// Mint address -> decimals
    pub known_tokens: HashMap<String, u8>,
    /// Delete the previous run's timestamped artifacts once the manifest is written
    pub prune: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pool: "governance".to_string(),
            concurrency: 8,
            paging: HistoryPaging {
                page_size: 50,
                max_pages: 200,
                retries: 0,
                retry_delay: Duration::from_millis(250),
            },
            known_tokens: HashMap::new(),
            prune: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ManifestOutcome {
    Written { version: u64 },
    /// Not attempted because an artifact it would reference is missing
    Skipped { reason: String },
    Failed { reason: String },
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub governance_address: String,
    pub timestamp: i64,
    pub diff: DiffSummary,
    /// Proposals left without vote data
    pub failed_proposals: Vec<FailedProposal>,
    /// Proposals whose quorum could not be derived
    pub quorum_failures: Vec<FailedProposal>,
    pub total_members: usize,
    pub total_transactions: usize,
    /// Transaction history stopped on a failed page
    pub partial: bool,
    pub uploads: Vec<UploadOutcome>,
    pub manifest: ManifestOutcome,
    pub pruned: Vec<String>,
}

impl SyncReport {
    pub fn version(&self) -> Option<u64> {
        match self.manifest {
            ManifestOutcome::Written { version } => Some(version),
            _ => None,
        }
    }
}

pub struct SyncJob<'a> {
    rpc: &'a dyn GovernanceRpc,
    storage: &'a dyn StorageClient,
    codec: &'a dyn Codec,
    options: &'a SyncOptions,
    reporter: &'a dyn ProgressReporter,
    cancel: CancellationToken,
}

impl<'a> SyncJob<'a> {
    pub fn new(
        rpc: &'a dyn GovernanceRpc,
        storage: &'a dyn StorageClient,
        codec: &'a dyn Codec,
        options: &'a SyncOptions,
        reporter: &'a dyn ProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rpc,
            storage,
            codec,
            options,
            reporter,
            cancel,
        }
    }

    pub async fn run(&self, request: &SyncRequest) -> Result<SyncReport, SyncError> {
        let progress = Progress::new(self.reporter);
        let governance = request.governance_address.as_str();
        info!(
            "Starting sync of {} ({}) force_refresh={}",
            request.name, governance, request.force_refresh
        );

        progress
            .phase(SyncPhase::ResolveRealm, format!("Resolving realm {}", governance))
            .await;
        let realm = RealmResolver::resolve(self.rpc, governance).await?;
        self.check_cancelled()?;

        progress
            .phase(SyncPhase::Enumerate, format!("Enumerating proposals of {}", realm.name))
            .await;
        let enumerator = ProposalEnumerator::new(self.rpc);
        let fresh = enumerator.proposals(&realm).await?;
        self.check_cancelled()?;

        progress
            .phase(SyncPhase::Diff, format!("Comparing {} proposals with cache", fresh.len()))
            .await;
        let cached = self.load_cache(governance, request.force_refresh).await?;
        let mut annotated = CacheDiffEngine::annotate(fresh, &cached, request.force_refresh);
        let diff = CacheDiffEngine::summarize(&annotated, cached.len());
        info!(
            "Diff for {}: {} to fetch, {} reused ({} cached)",
            governance, diff.to_fetch, diff.reused, diff.cached
        );

        progress
            .phase(
                SyncPhase::FetchVotes,
                format!("Fetching votes for {} proposals", diff.to_fetch),
            )
            .await;
        let fetcher = VoteRecordFetcher::new(self.rpc, &realm, &self.options.known_tokens);
        let failed_proposals = fetcher
            .fetch_all(&mut annotated, self.options.concurrency, &self.cancel, &progress)
            .await?;
        let quorum_failures = apply_quorum(&realm, &mut annotated);

        progress
            .phase(SyncPhase::FetchMembers, "Fetching members")
            .await;
        let members = enumerator
            .members(&realm, self.options.concurrency, &self.cancel, &progress)
            .await?;

        progress
            .phase(SyncPhase::FetchTransactions, "Fetching transaction history")
            .await;
        let history = enumerator
            .transactions(&realm.address, self.options.paging, &self.cancel)
            .await?;
        self.check_cancelled()?;

        progress
            .phase(SyncPhase::Serialize, "Serializing snapshot")
            .await;
        let timestamp = chrono::Utc::now().timestamp();
        let names = ArtifactNames::new(governance, timestamp);
        let proposals: Vec<GovernanceProposal> =
            annotated.into_iter().map(|a| a.proposal).collect();
        let stats = ManifestManager::stats(&realm, &proposals, &members);
        let total_members = members.len();
        let total_transactions = history.transactions.len();

        let encoded = SnapshotSerializer::encode(
            SnapshotArtifact {
                proposals,
                members,
                transactions: history.transactions,
            },
            &names,
            self.codec,
        )?;
        for (i, artifact) in encoded.artifacts().iter().enumerate() {
            progress
                .update(
                    SyncPhase::Serialize,
                    (i + 1) as f64 / 3.0 * 100.0,
                    format!(
                        "{}: {} -> {}",
                        artifact.name,
                        format_size(artifact.original_size),
                        format_size(artifact.compressed_size())
                    ),
                )
                .await;
        }

        let uploader = StorageUploader::new(self.storage, &self.options.pool, &progress);
        let mut uploads = Vec::with_capacity(4);
        for artifact in encoded.artifacts() {
            self.check_cancelled()?;
            uploads.push(uploader.upload_artifact(artifact).await);
        }

        self.check_cancelled()?;
        progress
            .phase(SyncPhase::ManifestUpdate, format!("Updating {}", MANIFEST_FILENAME))
            .await;
        let manifest_manager = ManifestManager::new(self.storage, self.codec, &self.options.pool);
        let loaded = manifest_manager.load().await?;
        let previous = match &loaded {
            LoadedManifest::Found(manifest) => manifest.find(governance).cloned(),
            LoadedManifest::NotFound => None,
        };

        let manifest = match self.unpublished(&uploads, &names).await? {
            Some(reason) => {
                warn!("Not updating manifest for {}: {}", governance, reason);
                ManifestOutcome::Skipped { reason }
            }
            None => {
                let expected = loaded.version_of(governance);
                let entry = ManifestEntry {
                    governance_address: governance.to_string(),
                    governance_name: request.name.clone(),
                    version: 0,
                    timestamp,
                    filename: names.proposals.clone(),
                    member_filename: names.members.clone(),
                    transaction_filename: names.transactions.clone(),
                    stats,
                };
                let (updated, version) = ManifestManager::upsert(loaded, entry);
                let text = ManifestManager::encode(&updated)?;
                let bytes = self.codec.compress(&text)?;

                self.check_cancelled()?;
                manifest_manager.ensure_unchanged(governance, expected).await?;

                let outcome = uploader.upload(MANIFEST_FILENAME, bytes).await;
                let manifest = if outcome.succeeded() {
                    ManifestOutcome::Written { version }
                } else {
                    ManifestOutcome::Failed {
                        reason: outcome.error.clone().unwrap_or_default(),
                    }
                };
                uploads.push(outcome);
                manifest
            }
        };

        let mut pruned = Vec::new();
        if let (true, ManifestOutcome::Written { .. }, Some(previous)) =
            (self.options.prune, &manifest, previous)
        {
            progress
                .phase(SyncPhase::Cleanup, "Removing superseded artifacts")
                .await;
            for old in [previous.member_filename, previous.transaction_filename] {
                if old != names.members && old != names.transactions && uploader.remove(&old).await
                {
                    pruned.push(old);
                }
            }
        }

        progress
            .phase(SyncPhase::Complete, format!("Sync of {} complete", request.name))
            .await;

        let report = SyncReport {
            governance_address: governance.to_string(),
            timestamp,
            diff,
            failed_proposals,
            quorum_failures,
            total_members,
            total_transactions,
            partial: history.partial,
            uploads,
            manifest,
            pruned,
        };
        info!(
            "Finished sync of {}: manifest {:?}, {} failed proposals, partial={}",
            governance,
            report.manifest,
            report.failed_proposals.len(),
            report.partial
        );
        Ok(report)
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            warn!("Sync cancelled");
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Previously published proposals; empty when forced or never published
    async fn load_cache(
        &self,
        governance: &str,
        force_refresh: bool,
    ) -> Result<Vec<GovernanceProposal>, SyncError> {
        if force_refresh {
            return Ok(Vec::new());
        }

        let name = proposals_filename(governance);
        match self.storage.fetch(&self.options.pool, &name).await? {
            Some(bytes) => SnapshotSerializer::decode_proposals(&name, &bytes, self.codec),
            None => Ok(Vec::new()),
        }
    }

    /// Why the manifest must not point at this run's artifacts, if it must not
    async fn unpublished(
        &self,
        uploads: &[UploadOutcome],
        names: &ArtifactNames,
    ) -> Result<Option<String>, SyncError> {
        let failed: Vec<&str> = uploads
            .iter()
            .filter(|u| !u.succeeded())
            .map(|u| u.name.as_str())
            .collect();
        if !failed.is_empty() {
            return Ok(Some(format!("upload failed for {}", failed.join(", "))));
        }

        let listed = self.storage.list_objects(&self.options.pool).await?;
        let missing: Vec<&str> = [&names.proposals, &names.members, &names.transactions]
            .into_iter()
            .filter(|name| !listed.contains(name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Ok(Some(format!("not listed after upload: {}", missing.join(", "))));
        }

        Ok(None)
    }
}

/// Attach quorum data to every freshly fetched proposal.
///
/// A proposal whose quorum cannot be derived keeps `quorum: None` and is
/// reported.
fn apply_quorum(realm: &Realm, annotated: &mut [AnnotatedProposal]) -> Vec<FailedProposal> {
    let mut failures = Vec::new();

    for item in annotated
        .iter_mut()
        .filter(|a| a.decision == FetchDecision::Fetch)
    {
        let proposal = &mut item.proposal;
        let Some(decimals) = proposal.vote_summary.as_ref().map(|s| s.decimals) else {
            continue;
        };

        let quorum = realm
            .threshold_for(&proposal.governance, &proposal.governing_token_mint)
            .and_then(|threshold| {
                let supply = realm.supply_for(&proposal.governing_token_mint).ok_or_else(|| {
                    SyncError::MissingGovernanceConfig(format!(
                        "no supply for mint {}",
                        proposal.governing_token_mint
                    ))
                })?;
                Ok(QuorumCalculator::calculate(QuorumInputs {
                    max_vote_weight_fraction: realm.max_vote_weight_fraction,
                    vote_threshold: threshold,
                    supply: supply.normalized(decimals),
                    yes_votes: normalize(proposal.tally.yes_weight(), decimals),
                })?)
            });

        match quorum {
            Ok(quorum) => proposal.quorum = Some(quorum),
            Err(e) => {
                warn!("No quorum for proposal {}: {}", proposal.id, e);
                proposal.quorum = None;
                failures.push(FailedProposal {
                    id: proposal.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    failures
}
