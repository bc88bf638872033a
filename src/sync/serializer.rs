//! Snapshot Serializer
//!
//! Assembles the proposal, member and transaction collections, serializes
//! each to JSON and compresses each independently.

use crate::codec::{Codec, EMPTY_DOCUMENT};
use crate::error::SyncError;
use crate::models::{GovernanceProposal, Member, RawTx};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed name of the lookup manifest
pub const MANIFEST_FILENAME: &str = "governance_lookup.json";

/// File names for one sync run's artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactNames {
    pub proposals: String,
    pub members: String,
    pub transactions: String,
}

impl ArtifactNames {
    pub fn new(governance_address: &str, unix_timestamp: i64) -> Self {
        Self {
            proposals: proposals_filename(governance_address),
            members: format!("{}_members_{}.json", governance_address, unix_timestamp),
            transactions: format!("{}_transactions_{}.json", governance_address, unix_timestamp),
        }
    }
}

/// Proposals artifact name; stable across runs so it doubles as the cache key
pub fn proposals_filename(governance_address: &str) -> String {
    format!("{}.json", governance_address)
}

/// The three collections published by a sync run
#[derive(Debug, Clone, Default)]
pub struct SnapshotArtifact {
    pub proposals: Vec<GovernanceProposal>,
    pub members: Vec<Member>,
    pub transactions: Vec<RawTx>,
}

/// One compressed artifact ready for upload
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub original_size: usize,
    /// Hex sha-256 of `bytes`
    pub checksum: String,
}

impl EncodedArtifact {
    pub fn compressed_size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub proposals: EncodedArtifact,
    pub members: EncodedArtifact,
    pub transactions: EncodedArtifact,
}

impl EncodedSnapshot {
    pub fn artifacts(&self) -> [&EncodedArtifact; 3] {
        [&self.proposals, &self.members, &self.transactions]
    }
}

pub struct SnapshotSerializer;

impl SnapshotSerializer {
    /// Newest draft first; proposals without `draft_at` count as 0 and
    /// therefore sort last. Ties keep their input order.
    pub fn sort_proposals(proposals: &mut [GovernanceProposal]) {
        proposals.sort_by(|a, b| b.draft_at.unwrap_or(0).cmp(&a.draft_at.unwrap_or(0)));
    }

    pub fn encode(
        mut artifact: SnapshotArtifact,
        names: &ArtifactNames,
        codec: &dyn Codec,
    ) -> Result<EncodedSnapshot, SyncError> {
        Self::sort_proposals(&mut artifact.proposals);

        Ok(EncodedSnapshot {
            proposals: Self::encode_one(&names.proposals, &artifact.proposals, codec)?,
            members: Self::encode_one(&names.members, &artifact.members, codec)?,
            transactions: Self::encode_one(&names.transactions, &artifact.transactions, codec)?,
        })
    }

    pub fn encode_one<T: Serialize>(
        name: &str,
        value: &T,
        codec: &dyn Codec,
    ) -> Result<EncodedArtifact, SyncError> {
        let text = serde_json::to_string(value)?;
        let bytes = codec.compress(&text)?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));

        Ok(EncodedArtifact {
            name: name.to_string(),
            original_size: text.len(),
            bytes,
            checksum,
        })
    }

    /// Decode a previously published proposals artifact.
    ///
    /// The empty-document convention (`{}`) reads as no proposals; any
    /// other non-array content is a malformed cache.
    pub fn decode_proposals(
        name: &str,
        bytes: &[u8],
        codec: &dyn Codec,
    ) -> Result<Vec<GovernanceProposal>, SyncError> {
        let malformed = |reason: String| SyncError::MalformedCache {
            file: name.to_string(),
            reason,
        };

        let text = codec.decompress(bytes).map_err(|e| malformed(e.to_string()))?;
        if text.trim() == EMPTY_DOCUMENT {
            return Ok(Vec::new());
        }

        serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DeflateCodec;
    use crate::models::{ProposalState, VoteTally};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn proposal(id: &str, draft_at: Option<i64>) -> GovernanceProposal {
        GovernanceProposal {
            id: id.into(),
            governance: "gov".into(),
            name: String::new(),
            state: ProposalState::Completed,
            governing_token_mint: "mint".into(),
            tally: VoteTally::default(),
            draft_at,
            voting_results: None,
            instructions: None,
            vote_summary: None,
            quorum: None,
        }
    }

    #[test]
    fn test_artifact_names_follow_convention() {
        let names = ArtifactNames::new("By2sVGZXwfQq6rAiAM3rNPJ9iQfb5e2QhnF4YjJ4Bip", 1_700_000_000);
        assert_eq!(names.proposals, "By2sVGZXwfQq6rAiAM3rNPJ9iQfb5e2QhnF4YjJ4Bip.json");
        assert_eq!(
            names.members,
            "By2sVGZXwfQq6rAiAM3rNPJ9iQfb5e2QhnF4YjJ4Bip_members_1700000000.json"
        );
        assert_eq!(
            names.transactions,
            "By2sVGZXwfQq6rAiAM3rNPJ9iQfb5e2QhnF4YjJ4Bip_transactions_1700000000.json"
        );
    }

    proptest! {
        #[test]
        fn prop_sort_is_newest_first_with_missing_last(
            drafts in proptest::collection::vec(proptest::option::of(1i64..4_000_000_000), 0..40)
        ) {
            let mut proposals: Vec<_> = drafts
                .iter()
                .enumerate()
                .map(|(i, draft_at)| proposal(&i.to_string(), *draft_at))
                .collect();
            SnapshotSerializer::sort_proposals(&mut proposals);

            let first_missing = proposals
                .iter()
                .position(|p| p.draft_at.is_none())
                .unwrap_or(proposals.len());
            prop_assert!(proposals[first_missing..].iter().all(|p| p.draft_at.is_none()));
            prop_assert!(proposals[..first_missing]
                .windows(2)
                .all(|w| w[0].draft_at >= w[1].draft_at));

            // ties keep input order
            for w in proposals.windows(2) {
                if w[0].draft_at.unwrap_or(0) == w[1].draft_at.unwrap_or(0) {
                    let a: usize = w[0].id.parse().unwrap();
                    let b: usize = w[1].id.parse().unwrap();
                    prop_assert!(a < b);
                }
            }
        }
    }

    #[test]
    fn test_missing_draft_at_sorts_last() {
        let mut proposals = vec![
            proposal("none-1", None),
            proposal("old", Some(100)),
            proposal("none-2", None),
            proposal("new", Some(300)),
            proposal("mid", Some(200)),
        ];
        SnapshotSerializer::sort_proposals(&mut proposals);

        let ids: Vec<_> = proposals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old", "none-1", "none-2"]);
    }

    #[test]
    fn test_encode_sorts_and_compresses_each_collection() {
        let codec = DeflateCodec::new();
        let artifact = SnapshotArtifact {
            proposals: vec![proposal("a", None), proposal("b", Some(5))],
            members: vec![],
            transactions: vec![],
        };
        let names = ArtifactNames::new("gov", 1);
        let encoded = SnapshotSerializer::encode(artifact, &names, &codec).unwrap();

        assert_eq!(encoded.proposals.name, "gov.json");
        assert_eq!(encoded.proposals.checksum.len(), 64);
        assert_eq!(codec.decompress(&encoded.members.bytes).unwrap(), "[]");

        let decoded =
            SnapshotSerializer::decode_proposals("gov.json", &encoded.proposals.bytes, &codec)
                .unwrap();
        let ids: Vec<_> = decoded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_decode_empty_document_is_no_proposals() {
        let codec = DeflateCodec::new();
        let empty = codec.compress("").unwrap();
        let decoded = SnapshotSerializer::decode_proposals("gov.json", &empty, &codec).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_malformed_cache_is_typed_error() {
        let codec = DeflateCodec::new();
        let bytes = codec.compress(r#"{"not":"an array"}"#).unwrap();
        let err = SnapshotSerializer::decode_proposals("gov.json", &bytes, &codec).unwrap_err();
        assert!(matches!(err, SyncError::MalformedCache { ref file, .. } if file == "gov.json"));

        let err = SnapshotSerializer::decode_proposals("gov.json", b"garbage", &codec).unwrap_err();
        assert!(matches!(err, SyncError::MalformedCache { .. }));
    }
}
