//! Manifest Manager
//!
//! The lookup manifest is one compressed JSON array stored under a fixed
//! name. It is loaded whole, updated as a value and written back whole.
//! An empty stream decompresses to `{}`, which is read as an empty
//! manifest; writes always produce an array.

use crate::codec::{Codec, EMPTY_DOCUMENT};
use crate::error::SyncError;
use crate::models::{
    GovernanceProposal, Manifest, ManifestEntry, ManifestStats, Member, ProposalState, Realm,
};
use crate::storage::StorageClient;
use crate::sync::quorum::{QuorumCalculator, QuorumInputs};
use crate::sync::serializer::MANIFEST_FILENAME;
use tracing::{debug, info};

/// Result of reading the manifest from storage
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedManifest {
    /// No manifest object exists in the pool yet
    NotFound,
    Found(Manifest),
}

impl LoadedManifest {
    pub fn version_of(&self, governance_address: &str) -> Option<u64> {
        match self {
            LoadedManifest::NotFound => None,
            LoadedManifest::Found(manifest) => {
                manifest.find(governance_address).map(|e| e.version)
            }
        }
    }
}

pub struct ManifestManager<'a> {
    storage: &'a dyn StorageClient,
    codec: &'a dyn Codec,
    pool: &'a str,
}

impl<'a> ManifestManager<'a> {
    pub fn new(storage: &'a dyn StorageClient, codec: &'a dyn Codec, pool: &'a str) -> Self {
        Self {
            storage,
            codec,
            pool,
        }
    }

    pub async fn load(&self) -> Result<LoadedManifest, SyncError> {
        let listed = self.storage.list_objects(self.pool).await?;
        if !listed.iter().any(|name| name == MANIFEST_FILENAME) {
            debug!("No {} in pool {}", MANIFEST_FILENAME, self.pool);
            return Ok(LoadedManifest::NotFound);
        }

        let Some(bytes) = self.storage.fetch(self.pool, MANIFEST_FILENAME).await? else {
            return Ok(LoadedManifest::NotFound);
        };

        Self::decode(&bytes, self.codec).map(LoadedManifest::Found)
    }

    pub fn decode(bytes: &[u8], codec: &dyn Codec) -> Result<Manifest, SyncError> {
        let text = codec
            .decompress(bytes)
            .map_err(|e| SyncError::MalformedManifest(e.to_string()))?;

        if text.trim() == EMPTY_DOCUMENT {
            return Ok(Manifest::default());
        }

        serde_json::from_str(&text).map_err(|e| SyncError::MalformedManifest(e.to_string()))
    }

    pub fn encode(manifest: &Manifest) -> Result<String, SyncError> {
        Ok(serde_json::to_string(manifest)?)
    }

    /// Insert or update the entry for `entry.governance_address`.
    ///
    /// The incoming `entry.version` is ignored: new entries start at 0 and
    /// existing ones become `old + 1`.
    pub fn upsert(loaded: LoadedManifest, entry: ManifestEntry) -> (Manifest, u64) {
        let mut manifest = match loaded {
            LoadedManifest::NotFound => {
                return (
                    Manifest {
                        entries: vec![ManifestEntry { version: 0, ..entry }],
                    },
                    0,
                );
            }
            LoadedManifest::Found(manifest) => manifest,
        };

        let position = manifest
            .entries
            .iter()
            .position(|e| e.governance_address == entry.governance_address);

        match position {
            Some(index) => {
                let version = manifest.entries[index].version + 1;
                manifest.entries[index] = ManifestEntry { version, ..entry };
                (manifest, version)
            }
            None => {
                manifest.entries.push(ManifestEntry { version: 0, ..entry });
                (manifest, 0)
            }
        }
    }

    /// Re-read the stored manifest and make sure nobody else updated this
    /// governance's entry since `expected` was observed.
    pub async fn ensure_unchanged(
        &self,
        governance_address: &str,
        expected: Option<u64>,
    ) -> Result<(), SyncError> {
        let found = self.load().await?.version_of(governance_address);
        if found != expected {
            return Err(SyncError::ManifestConflict {
                governance: governance_address.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Aggregate statistics for a realm's manifest entry
    pub fn stats(realm: &Realm, proposals: &[GovernanceProposal], members: &[Member]) -> ManifestStats {
        let total_quorum = realm.community_supply.and_then(|supply| {
            QuorumCalculator::calculate(QuorumInputs {
                max_vote_weight_fraction: realm.max_vote_weight_fraction,
                vote_threshold: realm.thresholds.community?,
                supply: supply.on_chain(),
                yes_votes: 0.0,
            })
            .ok()
            .map(|q| q.total_votes)
        });

        let stats = ManifestStats {
            total_proposals: proposals.len(),
            total_proposals_voting: proposals
                .iter()
                .filter(|p| p.state == ProposalState::Voting)
                .count(),
            total_council_proposals: proposals
                .iter()
                .filter(|p| realm.is_council_mint(&p.governing_token_mint))
                .count(),
            last_proposal_date: proposals.iter().filter_map(|p| p.draft_at).max(),
            token_supply: realm.community_supply.map(|s| s.on_chain()),
            total_quorum,
            total_members: members.len(),
        };

        info!(
            "Manifest stats for {}: {} proposals ({} voting), {} members",
            realm.address, stats.total_proposals, stats.total_proposals_voting, stats.total_members
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DeflateCodec;
    use crate::models::{MintSupply, VoteThresholds, VoteTally};
    use crate::storage::{InMemoryStorage, StorageFile};
    use pretty_assertions::assert_eq;

    fn entry(address: &str, timestamp: i64) -> ManifestEntry {
        ManifestEntry {
            governance_address: address.into(),
            governance_name: format!("{} DAO", address),
            version: 42,
            timestamp,
            filename: format!("{}.json", address),
            member_filename: format!("{}_members_{}.json", address, timestamp),
            transaction_filename: format!("{}_transactions_{}.json", address, timestamp),
            stats: ManifestStats::default(),
        }
    }

    #[test]
    fn test_not_found_creates_single_entry_at_zero() {
        let (manifest, version) = ManifestManager::upsert(LoadedManifest::NotFound, entry("a", 1));
        assert_eq!(version, 0);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries[0].version, 0);
    }

    #[test]
    fn test_existing_entry_version_increments_by_one() {
        let (first, _) = ManifestManager::upsert(LoadedManifest::NotFound, entry("a", 1));
        let (first, _) = ManifestManager::upsert(LoadedManifest::Found(first), entry("b", 1));

        let (second, version) =
            ManifestManager::upsert(LoadedManifest::Found(first.clone()), entry("a", 2));
        assert_eq!(version, 1);
        assert_eq!(second.len(), 2);

        let updated = second.find("a").unwrap();
        assert_eq!(updated.timestamp, 2);
        assert_eq!(updated.member_filename, "a_members_2.json");
        assert_eq!(second.find("b"), first.find("b"));

        let (third, version) = ManifestManager::upsert(LoadedManifest::Found(second), entry("a", 3));
        assert_eq!(version, 2);
        assert_eq!(third.entries[0].governance_address, "a");
    }

    #[test]
    fn test_new_address_appends_at_zero() {
        let (manifest, _) = ManifestManager::upsert(LoadedManifest::NotFound, entry("a", 1));
        let (manifest, version) = ManifestManager::upsert(LoadedManifest::Found(manifest), entry("c", 1));
        assert_eq!(version, 0);
        let order: Vec<_> = manifest.entries.iter().map(|e| e.governance_address.as_str()).collect();
        assert_eq!(order, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_load_distinguishes_missing_empty_and_malformed() {
        let storage = InMemoryStorage::new("host");
        let codec = DeflateCodec::new();
        let manager = ManifestManager::new(&storage, &codec, "pool");

        assert_eq!(manager.load().await.unwrap(), LoadedManifest::NotFound);

        storage
            .put("pool", MANIFEST_FILENAME, codec.compress("").unwrap())
            .await;
        assert_eq!(
            manager.load().await.unwrap(),
            LoadedManifest::Found(Manifest::default())
        );

        storage
            .put("pool", MANIFEST_FILENAME, codec.compress("[1, 2]").unwrap())
            .await;
        assert!(matches!(
            manager.load().await.unwrap_err(),
            SyncError::MalformedManifest(_)
        ));
    }

    #[tokio::test]
    async fn test_ensure_unchanged_detects_concurrent_update() {
        let storage = InMemoryStorage::new("host");
        let codec = DeflateCodec::new();
        let manager = ManifestManager::new(&storage, &codec, "pool");
        manager.ensure_unchanged("a", None).await.unwrap();

        let (manifest, _) = ManifestManager::upsert(LoadedManifest::NotFound, entry("a", 1));
        let text = ManifestManager::encode(&manifest).unwrap();
        storage
            .create("pool", StorageFile::new(MANIFEST_FILENAME, codec.compress(&text).unwrap()))
            .await
            .unwrap();

        manager.ensure_unchanged("a", Some(0)).await.unwrap();
        let err = manager.ensure_unchanged("a", None).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ManifestConflict { expected: None, found: Some(0), .. }
        ));
    }

    #[test]
    fn test_stats_aggregate_proposals() {
        let realm = Realm {
            address: "realm".into(),
            name: "DAO".into(),
            program_id: "program".into(),
            community_mint: "community".into(),
            council_mint: Some("council".into()),
            thresholds: VoteThresholds { community: Some(50.0), council: Some(60.0) },
            max_vote_weight_fraction: 10.0,
            governances: vec![],
            community_supply: Some(MintSupply { amount: 1_000_000, decimals: 0 }),
            council_supply: Some(MintSupply { amount: 5, decimals: 0 }),
        };
        let proposal = |state, mint: &str, draft_at| GovernanceProposal {
            id: String::new(),
            governance: "gov".into(),
            name: String::new(),
            state,
            governing_token_mint: mint.into(),
            tally: VoteTally::default(),
            draft_at,
            voting_results: None,
            instructions: None,
            vote_summary: None,
            quorum: None,
        };
        let proposals = vec![
            proposal(ProposalState::Voting, "community", Some(10)),
            proposal(ProposalState::Completed, "council", Some(30)),
            proposal(ProposalState::Defeated, "community", None),
        ];

        let stats = ManifestManager::stats(&realm, &proposals, &[]);
        assert_eq!(stats.total_proposals, 3);
        assert_eq!(stats.total_proposals_voting, 1);
        assert_eq!(stats.total_council_proposals, 1);
        assert_eq!(stats.last_proposal_date, Some(30));
        assert_eq!(stats.total_quorum, Some(50_000.0));
        assert_eq!(stats.total_members, 0);
    }
}
