//! Realm Resolver

use crate::error::SyncError;
use crate::models::{GovernanceConfig, MintSupply, Realm};
use crate::rpc::GovernanceRpc;
use tracing::{info, warn};

pub struct RealmResolver;

impl RealmResolver {
    /// Fetch the realm, its governances and governing-mint supplies
    pub async fn resolve(rpc: &dyn GovernanceRpc, address: &str) -> Result<Realm, SyncError> {
        let account = rpc
            .get_realm(address)
            .await?
            .ok_or_else(|| SyncError::RealmNotFound(address.to_string()))?;

        let fraction = account.max_vote_weight_fraction;
        if !fraction.is_finite() || !(0.0..=100.0).contains(&fraction) {
            return Err(SyncError::MissingGovernanceConfig(format!(
                "realm {} has invalid max vote weight fraction {}",
                address, fraction
            )));
        }

        let governances: Vec<GovernanceConfig> = rpc
            .get_governances(&account.address)
            .await?
            .into_iter()
            .map(|g| GovernanceConfig {
                address: g.address,
                thresholds: g.thresholds,
            })
            .collect();

        let community_supply = Self::supply(rpc, &account.community_mint).await;
        let council_supply = match &account.council_mint {
            Some(mint) => Self::supply(rpc, mint).await,
            None => None,
        };

        info!(
            "Resolved realm {} ({}): {} governances, council mint: {}",
            account.name,
            account.address,
            governances.len(),
            account.council_mint.is_some()
        );

        Ok(Realm {
            address: account.address,
            name: account.name,
            program_id: account.program_id,
            community_mint: account.community_mint,
            council_mint: account.council_mint,
            thresholds: account.thresholds,
            max_vote_weight_fraction: fraction,
            governances,
            community_supply,
            council_supply,
        })
    }

    async fn supply(rpc: &dyn GovernanceRpc, mint: &str) -> Option<MintSupply> {
        match rpc.get_token_supply(mint).await {
            Ok(supply) => supply.map(|s| MintSupply {
                amount: s.amount,
                decimals: s.decimals,
            }),
            Err(e) => {
                warn!("Could not fetch supply of {}: {}", mint, e);
                None
            }
        }
    }
}
