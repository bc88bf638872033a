//! Governance lookup manifest models
//!
//! The manifest indexes every realm that has been snapshotted, pointing at
//! its latest artifacts. It is always read and written as one document.

use serde::{Deserialize, Serialize};

/// Aggregate statistics published alongside a realm's artifacts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStats {
    pub total_proposals: usize,
    pub total_proposals_voting: usize,
    pub total_council_proposals: usize,
    #[serde(default)]
    pub last_proposal_date: Option<i64>,
    #[serde(default)]
    pub token_supply: Option<f64>,
    #[serde(default)]
    pub total_quorum: Option<f64>,
    pub total_members: usize,
}

/// One realm's entry, keyed by governance address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub governance_address: String,
    pub governance_name: String,
    pub version: u64,
    /// Unix seconds of the sync run that produced this entry
    pub timestamp: i64,
    pub filename: String,
    pub member_filename: String,
    pub transaction_filename: String,
    #[serde(flatten)]
    pub stats: ManifestStats,
}

/// The full lookup document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn find(&self, governance_address: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|e| e.governance_address == governance_address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
