//! Realm configuration model

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// Vote threshold percentages (0-100) per voting population
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteThresholds {
    #[serde(default)]
    pub community: Option<f64>,
    #[serde(default)]
    pub council: Option<f64>,
}

/// A governance (rule-set) under the realm and its thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceConfig {
    pub address: String,
    pub thresholds: VoteThresholds,
}

/// Raw supply of a governing mint with its on-chain decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintSupply {
    pub amount: u64,
    pub decimals: u8,
}

impl MintSupply {
    /// Supply scaled by `decimals`. Quorum math must pass the decimals the
    /// vote weights were scaled by, not the mint's own.
    pub fn normalized(&self, decimals: u8) -> f64 {
        self.amount as f64 / 10f64.powi(i32::from(decimals))
    }

    /// Supply scaled by the mint's on-chain decimals
    pub fn on_chain(&self) -> f64 {
        self.normalized(self.decimals)
    }
}

/// Realm configuration resolved once per sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub address: String,
    pub name: String,
    pub program_id: String,
    pub community_mint: String,
    pub council_mint: Option<String>,
    /// Realm-level defaults, used when a proposal's governance is unknown
    pub thresholds: VoteThresholds,
    /// Max vote weight as a percentage (0-100) of the community supply
    pub max_vote_weight_fraction: f64,
    pub governances: Vec<GovernanceConfig>,
    pub community_supply: Option<MintSupply>,
    pub council_supply: Option<MintSupply>,
}

impl Realm {
    pub fn is_council_mint(&self, mint: &str) -> bool {
        self.council_mint.as_deref() == Some(mint)
    }

    /// Raw supply of whichever governing mint `mint` is
    pub fn supply_for(&self, mint: &str) -> Option<MintSupply> {
        if self.is_council_mint(mint) {
            self.council_supply
        } else if mint == self.community_mint {
            self.community_supply
        } else {
            None
        }
    }

    /// Vote threshold percentage that applies to a proposal.
    ///
    /// The parent governance wins over realm-level defaults; council mints
    /// select the council threshold.
    pub fn threshold_for(&self, governance: &str, mint: &str) -> Result<f64, SyncError> {
        let council = self.is_council_mint(mint);
        let pick = |t: &VoteThresholds| if council { t.council } else { t.community };

        self.governances
            .iter()
            .find(|g| g.address == governance)
            .and_then(|g| pick(&g.thresholds))
            .or_else(|| pick(&self.thresholds))
            .ok_or_else(|| {
                SyncError::MissingGovernanceConfig(format!(
                    "no {} vote threshold for governance {} in realm {}",
                    if council { "council" } else { "community" },
                    governance,
                    self.address
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> Realm {
        Realm {
            address: "realm".into(),
            name: "Test DAO".into(),
            program_id: "GovER5Lthms3bLBqWub97yVrMmEogzX7xNjdXpPPCVZw".into(),
            community_mint: "community".into(),
            council_mint: Some("council".into()),
            thresholds: VoteThresholds { community: Some(60.0), council: None },
            max_vote_weight_fraction: 100.0,
            governances: vec![GovernanceConfig {
                address: "gov-a".into(),
                thresholds: VoteThresholds { community: Some(50.0), council: Some(66.0) },
            }],
            community_supply: Some(MintSupply { amount: 1_000_000, decimals: 3 }),
            council_supply: Some(MintSupply { amount: 5, decimals: 0 }),
        }
    }

    #[test]
    fn test_governance_threshold_wins_over_realm_default() {
        let realm = realm();
        assert_eq!(realm.threshold_for("gov-a", "community").unwrap(), 50.0);
        assert_eq!(realm.threshold_for("gov-a", "council").unwrap(), 66.0);
        assert_eq!(realm.threshold_for("gov-unknown", "community").unwrap(), 60.0);
    }

    #[test]
    fn test_missing_threshold_is_typed_error() {
        let realm = realm();
        let err = realm.threshold_for("gov-unknown", "council").unwrap_err();
        assert!(matches!(err, SyncError::MissingGovernanceConfig(_)));
    }

    #[test]
    fn test_supply_for_mint() {
        let realm = realm();
        assert_eq!(realm.supply_for("community").map(|s| s.on_chain()), Some(1_000.0));
        assert_eq!(realm.supply_for("council").map(|s| s.on_chain()), Some(5.0));
        assert_eq!(realm.supply_for("other"), None);
    }

    #[test]
    fn test_supply_normalized_with_caller_decimals() {
        let supply = MintSupply { amount: 10_000_000, decimals: 6 };
        assert_eq!(supply.on_chain(), 10.0);
        assert_eq!(supply.normalized(0), 10_000_000.0);
    }
}
