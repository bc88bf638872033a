//! Blockchain RPC boundary
//!
//! The governance program's account layouts and the transport are owned by
//! the chain SDK. This module pins down the queries the sync pipeline needs
//! and the already-decoded shapes it expects back. Absence is `Ok(None)`;
//! `Err` always means the query itself failed.

pub mod memory;

pub use memory::{ChainFixture, InMemoryChain};

use crate::models::{ProposalInstruction, ProposalState, RawTx, VoteThresholds, VoteTally};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Failed to decode {account}: {reason}")]
    Decode { account: String, reason: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),
}

/// Realm account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmAccount {
    pub address: String,
    pub name: String,
    pub program_id: String,
    pub community_mint: String,
    #[serde(default)]
    pub council_mint: Option<String>,
    #[serde(default)]
    pub thresholds: VoteThresholds,
    /// Percentage (0-100) of community supply that counts as max vote weight
    pub max_vote_weight_fraction: f64,
}

/// Governance account under a realm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceAccount {
    pub address: String,
    pub realm: String,
    pub thresholds: VoteThresholds,
}

/// Proposal account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAccount {
    pub address: String,
    pub governance: String,
    #[serde(default)]
    pub name: String,
    pub state: ProposalState,
    pub governing_token_mint: String,
    pub tally: VoteTally,
    #[serde(default)]
    pub draft_at: Option<i64>,
}

/// Token owner record: one per (owner, governing mint)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOwnerRecordAccount {
    pub address: String,
    pub governing_token_owner: String,
    pub governing_token_mint: String,
    pub governing_token_deposit_amount: u64,
}

/// Vote cast with an explicit choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CastVote {
    Approve,
    Deny,
    Choice { index: u16 },
}

/// The two vote record layouts seen on chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "camelCase")]
pub enum RecordedVote {
    /// Current layout: explicit vote type plus voter weight
    #[serde(rename_all = "camelCase")]
    Explicit { vote: CastVote, voter_weight: u64 },
    /// Legacy layout: only a yes or no weight is populated
    #[serde(rename_all = "camelCase")]
    Legacy {
        #[serde(default)]
        yes_weight: Option<u64>,
        #[serde(default)]
        no_weight: Option<u64>,
    },
}

/// Vote record account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecordAccount {
    pub address: String,
    pub proposal: String,
    pub governing_token_owner: String,
    pub vote: RecordedVote,
}

/// Raw mint supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSupply {
    pub amount: u64,
    pub decimals: u8,
}

/// Parsed payload of a generic account fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParsedAccount {
    Mint { decimals: u8, supply: u64 },
    Unknown,
}

/// Generic account info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub owner: String,
    pub lamports: u64,
    pub parsed: ParsedAccount,
}

/// One page of transaction history, newest first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<RawTx>,
    pub has_more: bool,
}

/// Queries the sync pipeline issues against the chain
#[async_trait]
pub trait GovernanceRpc: Send + Sync {
    async fn get_realm(&self, address: &str) -> Result<Option<RealmAccount>, RpcError>;

    async fn get_governances(&self, realm: &str) -> Result<Vec<GovernanceAccount>, RpcError>;

    async fn get_proposals(&self, realm: &str) -> Result<Vec<ProposalAccount>, RpcError>;

    async fn get_token_owner_records(
        &self,
        realm: &str,
    ) -> Result<Vec<TokenOwnerRecordAccount>, RpcError>;

    async fn get_vote_records(&self, proposal: &str) -> Result<Vec<VoteRecordAccount>, RpcError>;

    async fn get_proposal_instructions(
        &self,
        proposal: &str,
    ) -> Result<Vec<ProposalInstruction>, RpcError>;

    async fn get_token_supply(&self, mint: &str) -> Result<Option<TokenSupply>, RpcError>;

    /// Parsed token balance of `owner` for `mint`, already decimal-normalized
    async fn get_wallet_balance(&self, owner: &str, mint: &str) -> Result<Option<f64>, RpcError>;

    async fn get_account_info(&self, address: &str) -> Result<Option<AccountInfo>, RpcError>;

    /// History page strictly older than `before`
    async fn get_transactions(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<TransactionPage, RpcError>;
}
