//! Fixture-backed chain
//!
//! Serves governance state from a JSON fixture held in memory. Used for
//! local runs (`CHAIN_FIXTURE_PATH`) and as the RPC double in tests, where
//! it also counts calls and can be told to fail specific queries.

use super::{
    AccountInfo, GovernanceAccount, GovernanceRpc, ProposalAccount, RealmAccount, RpcError,
    TokenOwnerRecordAccount, TokenSupply, TransactionPage, VoteRecordAccount,
};
use crate::models::{ProposalInstruction, RawTx};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Complete chain state for one or more realms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFixture {
    #[serde(default)]
    pub realms: Vec<RealmAccount>,
    #[serde(default)]
    pub governances: Vec<GovernanceAccount>,
    #[serde(default)]
    pub proposals: Vec<ProposalAccount>,
    /// Realm address -> records
    #[serde(default)]
    pub token_owner_records: HashMap<String, Vec<TokenOwnerRecordAccount>>,
    /// Proposal address -> records
    #[serde(default)]
    pub vote_records: HashMap<String, Vec<VoteRecordAccount>>,
    /// Proposal address -> instructions
    #[serde(default)]
    pub instructions: HashMap<String, Vec<ProposalInstruction>>,
    /// Mint -> supply
    #[serde(default)]
    pub supplies: HashMap<String, TokenSupply>,
    /// Owner -> (mint -> normalized balance)
    #[serde(default)]
    pub balances: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub accounts: HashMap<String, AccountInfo>,
    /// Address -> history, newest first
    #[serde(default)]
    pub transactions: HashMap<String, Vec<RawTx>>,
}

#[derive(Debug, Default)]
struct CallLog {
    vote_records: HashMap<String, usize>,
    instructions: HashMap<String, usize>,
    balances: usize,
    transaction_pages: usize,
}

#[derive(Debug, Default)]
struct FailurePlan {
    vote_records: HashSet<String>,
    transactions_after_pages: Option<usize>,
}

/// In-memory implementation of [`GovernanceRpc`]
pub struct InMemoryChain {
    fixture: RwLock<ChainFixture>,
    calls: Mutex<CallLog>,
    failures: RwLock<FailurePlan>,
}

impl InMemoryChain {
    pub fn new(fixture: ChainFixture) -> Self {
        Self {
            fixture: RwLock::new(fixture),
            calls: Mutex::new(CallLog::default()),
            failures: RwLock::new(FailurePlan::default()),
        }
    }

    /// Load a fixture document from disk
    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let fixture: ChainFixture = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        info!(
            "Loaded chain fixture from {}: {} realms, {} proposals",
            path.display(),
            fixture.realms.len(),
            fixture.proposals.len()
        );
        Ok(Self::new(fixture))
    }

    /// Replace the fixture state, e.g. to simulate chain progress between runs
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ChainFixture),
    {
        let mut fixture = self.fixture.write().await;
        f(&mut fixture);
    }

    pub async fn vote_record_fetches(&self, proposal: &str) -> usize {
        self.calls
            .lock()
            .await
            .vote_records
            .get(proposal)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_vote_record_fetches(&self) -> usize {
        self.calls.lock().await.vote_records.values().sum()
    }

    pub async fn instruction_fetches(&self, proposal: &str) -> usize {
        self.calls
            .lock()
            .await
            .instructions
            .get(proposal)
            .copied()
            .unwrap_or(0)
    }

    pub async fn balance_fetches(&self) -> usize {
        self.calls.lock().await.balances
    }

    pub async fn transaction_page_fetches(&self) -> usize {
        self.calls.lock().await.transaction_pages
    }

    pub async fn reset_calls(&self) {
        *self.calls.lock().await = CallLog::default();
    }

    pub async fn fail_vote_records_for(&self, proposal: &str) {
        self.failures
            .write()
            .await
            .vote_records
            .insert(proposal.to_string());
    }

    /// Make every transaction page request after the first `pages` fail
    pub async fn fail_transactions_after(&self, pages: usize) {
        self.failures.write().await.transactions_after_pages = Some(pages);
    }
}

#[async_trait]
impl GovernanceRpc for InMemoryChain {
    async fn get_realm(&self, address: &str) -> Result<Option<RealmAccount>, RpcError> {
        let fixture = self.fixture.read().await;
        Ok(fixture.realms.iter().find(|r| r.address == address).cloned())
    }

    async fn get_governances(&self, realm: &str) -> Result<Vec<GovernanceAccount>, RpcError> {
        let fixture = self.fixture.read().await;
        Ok(fixture
            .governances
            .iter()
            .filter(|g| g.realm == realm)
            .cloned()
            .collect())
    }

    async fn get_proposals(&self, realm: &str) -> Result<Vec<ProposalAccount>, RpcError> {
        let fixture = self.fixture.read().await;
        let governances: HashSet<&str> = fixture
            .governances
            .iter()
            .filter(|g| g.realm == realm)
            .map(|g| g.address.as_str())
            .collect();

        Ok(fixture
            .proposals
            .iter()
            .filter(|p| governances.contains(p.governance.as_str()))
            .cloned()
            .collect())
    }

    async fn get_token_owner_records(
        &self,
        realm: &str,
    ) -> Result<Vec<TokenOwnerRecordAccount>, RpcError> {
        let fixture = self.fixture.read().await;
        Ok(fixture
            .token_owner_records
            .get(realm)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_vote_records(&self, proposal: &str) -> Result<Vec<VoteRecordAccount>, RpcError> {
        *self
            .calls
            .lock()
            .await
            .vote_records
            .entry(proposal.to_string())
            .or_insert(0) += 1;

        if self.failures.read().await.vote_records.contains(proposal) {
            return Err(RpcError::Transport(format!(
                "vote record query for {} timed out",
                proposal
            )));
        }

        debug!("Serving vote records for {}", proposal);
        let fixture = self.fixture.read().await;
        Ok(fixture
            .vote_records
            .get(proposal)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_proposal_instructions(
        &self,
        proposal: &str,
    ) -> Result<Vec<ProposalInstruction>, RpcError> {
        *self
            .calls
            .lock()
            .await
            .instructions
            .entry(proposal.to_string())
            .or_insert(0) += 1;

        let fixture = self.fixture.read().await;
        Ok(fixture
            .instructions
            .get(proposal)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_token_supply(&self, mint: &str) -> Result<Option<TokenSupply>, RpcError> {
        let fixture = self.fixture.read().await;
        Ok(fixture.supplies.get(mint).copied())
    }

    async fn get_wallet_balance(&self, owner: &str, mint: &str) -> Result<Option<f64>, RpcError> {
        self.calls.lock().await.balances += 1;

        let fixture = self.fixture.read().await;
        Ok(fixture
            .balances
            .get(owner)
            .and_then(|by_mint| by_mint.get(mint))
            .copied())
    }

    async fn get_account_info(&self, address: &str) -> Result<Option<AccountInfo>, RpcError> {
        let fixture = self.fixture.read().await;
        Ok(fixture.accounts.get(address).cloned())
    }

    async fn get_transactions(
        &self,
        address: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<TransactionPage, RpcError> {
        let served = {
            let mut calls = self.calls.lock().await;
            calls.transaction_pages += 1;
            calls.transaction_pages - 1
        };

        if let Some(allowed) = self.failures.read().await.transactions_after_pages {
            if served >= allowed {
                return Err(RpcError::Transport(format!(
                    "signature query for {} failed",
                    address
                )));
            }
        }

        let fixture = self.fixture.read().await;
        let history = fixture
            .transactions
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let start = match before {
            Some(signature) => history
                .iter()
                .position(|tx| tx.signature == signature)
                .map(|i| i + 1)
                .unwrap_or(history.len()),
            None => 0,
        };
        let end = (start + limit).min(history.len());

        Ok(TransactionPage {
            transactions: history[start..end].to_vec(),
            has_more: end < history.len(),
        })
    }
}
