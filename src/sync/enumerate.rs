//! Proposal Enumerator
//!
//! Enumerates proposals and members of a realm, snapshots member wallet
//! balances and pages through the realm's transaction history.

use crate::error::SyncError;
use crate::models::{GovernanceProposal, Member, RawTx, Realm};
use crate::rpc::{GovernanceRpc, ProposalAccount, RpcError, TransactionPage};
use crate::sync::progress::{Counter, Progress, SyncPhase};
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl From<ProposalAccount> for GovernanceProposal {
    fn from(account: ProposalAccount) -> Self {
        Self {
            id: account.address,
            governance: account.governance,
            name: account.name,
            state: account.state,
            governing_token_mint: account.governing_token_mint,
            tally: account.tally,
            draft_at: account.draft_at,
            voting_results: None,
            instructions: None,
            vote_summary: None,
            quorum: None,
        }
    }
}

/// Pagination settings for transaction history
#[derive(Debug, Clone, Copy)]
pub struct HistoryPaging {
    pub page_size: usize,
    pub max_pages: usize,
    /// Extra attempts per failed page; 0 ends the walk on the first failure
    pub retries: u32,
    pub retry_delay: Duration,
}

/// Transaction history and whether it may be incomplete
#[derive(Debug, Clone, Default)]
pub struct TransactionHistory {
    pub transactions: Vec<RawTx>,
    pub pages: usize,
    /// A page request failed and the walk stopped early
    pub partial: bool,
}

pub struct ProposalEnumerator<'a> {
    rpc: &'a dyn GovernanceRpc,
}

impl<'a> ProposalEnumerator<'a> {
    pub fn new(rpc: &'a dyn GovernanceRpc) -> Self {
        Self { rpc }
    }

    /// All proposals of the realm, unique by id (first occurrence wins)
    pub async fn proposals(&self, realm: &Realm) -> Result<Vec<GovernanceProposal>, SyncError> {
        let accounts = self.rpc.get_proposals(&realm.address).await?;
        let total = accounts.len();

        let mut seen = HashSet::new();
        let proposals: Vec<GovernanceProposal> = accounts
            .into_iter()
            .filter(|a| seen.insert(a.address.clone()))
            .map(GovernanceProposal::from)
            .collect();

        if proposals.len() != total {
            warn!(
                "Dropped {} duplicate proposal accounts for realm {}",
                total - proposals.len(),
                realm.address
            );
        }
        info!("Enumerated {} proposals for realm {}", proposals.len(), realm.address);
        Ok(proposals)
    }

    /// Members merged by owner, with wallet balances fetched concurrently.
    ///
    /// Ordered by community deposit descending, then owner.
    pub async fn members(
        &self,
        realm: &Realm,
        concurrency: usize,
        cancel: &CancellationToken,
        progress: &Progress<'_>,
    ) -> Result<Vec<Member>, SyncError> {
        let records = self.rpc.get_token_owner_records(&realm.address).await?;

        let mut by_owner: BTreeMap<String, Member> = BTreeMap::new();
        for record in records {
            let council = realm.is_council_mint(&record.governing_token_mint);
            if !council && record.governing_token_mint != realm.community_mint {
                debug!(
                    "Ignoring token owner record {} for foreign mint {}",
                    record.address, record.governing_token_mint
                );
                continue;
            }

            let member = by_owner
                .entry(record.governing_token_owner.clone())
                .or_insert_with(|| Member {
                    governing_token_owner: record.governing_token_owner.clone(),
                    governing_token_deposit_amount: 0,
                    council_deposit_amount: None,
                    wallet_balance: None,
                });

            if council {
                *member.council_deposit_amount.get_or_insert(0) +=
                    record.governing_token_deposit_amount;
            } else {
                member.governing_token_deposit_amount += record.governing_token_deposit_amount;
            }
        }

        let mut members: Vec<Member> = by_owner.into_values().collect();
        let mut counter = Counter::new(members.len());
        let mint = realm.community_mint.as_str();

        let owners: Vec<String> = members.iter().map(|m| m.governing_token_owner.clone()).collect();
        let mut balances = stream::iter(owners.into_iter().enumerate())
            .map(|(index, owner)| async move {
                (index, self.rpc.get_wallet_balance(&owner, mint).await)
            })
            .buffer_unordered(concurrency.max(1));

        let mut fetched = Vec::with_capacity(members.len());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                next = balances.next() => next,
            };
            let Some((index, balance)) = next else { break };
            let percent = counter.advance();
            progress
                .update(SyncPhase::FetchMembers, percent, "Fetching member balances")
                .await;
            fetched.push((index, balance));
        }
        drop(balances);

        for (index, balance) in fetched {
            match balance {
                Ok(balance) => members[index].wallet_balance = balance,
                Err(e) => warn!(
                    "Balance lookup failed for {}: {}",
                    members[index].governing_token_owner, e
                ),
            }
        }

        members.sort_by(|a, b| {
            b.governing_token_deposit_amount
                .cmp(&a.governing_token_deposit_amount)
                .then_with(|| a.governing_token_owner.cmp(&b.governing_token_owner))
        });

        info!("Enumerated {} members for realm {}", members.len(), realm.address);
        Ok(members)
    }

    /// Walk the realm's transaction history page by page.
    ///
    /// Stops when the backend reports no further pages, the page cap is
    /// reached, or a page keeps failing after the configured retries; the
    /// last case marks the history `partial`.
    pub async fn transactions(
        &self,
        address: &str,
        paging: HistoryPaging,
        cancel: &CancellationToken,
    ) -> Result<TransactionHistory, SyncError> {
        let mut history = TransactionHistory::default();
        let mut before: Option<String> = None;

        while history.pages < paging.max_pages {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = match self.page_with_retry(address, before.as_deref(), paging, cancel).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Transaction history for {} stopped after {} pages: {}",
                        address, history.pages, e
                    );
                    history.partial = true;
                    break;
                }
            };

            history.pages += 1;
            before = page.transactions.last().map(|tx| tx.signature.clone());
            history.transactions.extend(page.transactions);

            if !page.has_more || before.is_none() {
                break;
            }
        }

        debug!(
            "Fetched {} transactions in {} pages for {} (partial: {})",
            history.transactions.len(),
            history.pages,
            address,
            history.partial
        );
        Ok(history)
    }

    async fn page_with_retry(
        &self,
        address: &str,
        before: Option<&str>,
        paging: HistoryPaging,
        cancel: &CancellationToken,
    ) -> Result<TransactionPage, RpcError> {
        let mut attempt = 0;
        loop {
            match self.rpc.get_transactions(address, before, paging.page_size).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < paging.retries && !cancel.is_cancelled() => {
                    attempt += 1;
                    let delay = backoff(paging.retry_delay, attempt);
                    debug!("Retrying history page for {} in {:?}: {}", address, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff with up to 25% jitter
fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(6).saturating_sub(1));
    let jitter_ms = (exp.as_millis() as u64) / 4;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ms)
    };
    exp + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProposalState, VoteThresholds, VoteTally};
    use crate::rpc::{ChainFixture, GovernanceAccount, InMemoryChain, TokenOwnerRecordAccount};
    use crate::sync::progress::RecordingReporter;

    fn realm() -> Realm {
        Realm {
            address: "realm".into(),
            name: "Test DAO".into(),
            program_id: "gov-program".into(),
            community_mint: "community".into(),
            council_mint: Some("council".into()),
            thresholds: VoteThresholds::default(),
            max_vote_weight_fraction: 100.0,
            governances: vec![],
            community_supply: None,
            council_supply: None,
        }
    }

    fn tor(owner: &str, mint: &str, amount: u64) -> TokenOwnerRecordAccount {
        TokenOwnerRecordAccount {
            address: format!("tor-{}-{}", owner, mint),
            governing_token_owner: owner.into(),
            governing_token_mint: mint.into(),
            governing_token_deposit_amount: amount,
        }
    }

    fn tx(i: usize) -> RawTx {
        RawTx {
            signature: format!("sig-{:03}", i),
            slot: 1_000 - i as u64,
            block_time: None,
            failed: false,
            memo: None,
        }
    }

    fn paging(retries: u32) -> HistoryPaging {
        HistoryPaging {
            page_size: 50,
            max_pages: 10,
            retries,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_duplicate_proposals_are_dropped() {
        let mut fixture = ChainFixture::default();
        fixture.governances.push(GovernanceAccount {
            address: "gov".into(),
            realm: "realm".into(),
            thresholds: VoteThresholds::default(),
        });
        let account = ProposalAccount {
            address: "p1".into(),
            governance: "gov".into(),
            name: "first".into(),
            state: ProposalState::Voting,
            governing_token_mint: "community".into(),
            tally: VoteTally::default(),
            draft_at: Some(10),
        };
        let mut duplicate = account.clone();
        duplicate.name = "second".into();
        fixture.proposals = vec![account, duplicate];

        let chain = InMemoryChain::new(fixture);
        let proposals = ProposalEnumerator::new(&chain).proposals(&realm()).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].name, "first");
    }

    #[tokio::test]
    async fn test_members_merge_by_owner_with_balances() {
        let mut fixture = ChainFixture::default();
        fixture.token_owner_records.insert(
            "realm".into(),
            vec![
                tor("alice", "community", 10),
                tor("bob", "community", 50),
                tor("alice", "council", 1),
                tor("carol", "other-mint", 99),
            ],
        );
        fixture
            .balances
            .insert("bob".into(), [("community".to_string(), 3.5)].into_iter().collect());
        let chain = InMemoryChain::new(fixture);

        let reporter = RecordingReporter::new();
        let members = ProposalEnumerator::new(&chain)
            .members(&realm(), 2, &CancellationToken::new(), &Progress::new(&reporter))
            .await
            .unwrap();

        let owners: Vec<_> = members.iter().map(|m| m.governing_token_owner.as_str()).collect();
        // carol only deposited a foreign mint
        assert_eq!(owners, vec!["bob", "alice"]);
        assert_eq!(members[0].wallet_balance, Some(3.5));
        assert_eq!(members[1].council_deposit_amount, Some(1));
        assert_eq!(members[1].governing_token_deposit_amount, 10);
        assert_eq!(chain.balance_fetches().await, 2);
    }

    #[tokio::test]
    async fn test_history_follows_continuation() {
        let mut fixture = ChainFixture::default();
        fixture
            .transactions
            .insert("realm".into(), (0..120).map(tx).collect());
        let chain = InMemoryChain::new(fixture);

        let history = ProposalEnumerator::new(&chain)
            .transactions("realm", paging(0), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(history.transactions.len(), 120);
        assert_eq!(history.pages, 3);
        assert!(!history.partial);
        assert_eq!(history.transactions[50].signature, "sig-050");
    }

    #[tokio::test]
    async fn test_failed_page_ends_walk_as_partial() {
        let mut fixture = ChainFixture::default();
        fixture
            .transactions
            .insert("realm".into(), (0..120).map(tx).collect());
        let chain = InMemoryChain::new(fixture);
        chain.fail_transactions_after(1).await;

        let history = ProposalEnumerator::new(&chain)
            .transactions("realm", paging(0), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(history.transactions.len(), 50);
        assert!(history.partial);
        assert_eq!(chain.transaction_page_fetches().await, 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut fixture = ChainFixture::default();
        fixture
            .transactions
            .insert("realm".into(), (0..120).map(tx).collect());
        let chain = InMemoryChain::new(fixture);
        chain.fail_transactions_after(1).await;

        let history = ProposalEnumerator::new(&chain)
            .transactions("realm", paging(2), &CancellationToken::new())
            .await
            .unwrap();
        assert!(history.partial);
        // first page + one failing page attempted three times
        assert_eq!(chain.transaction_page_fetches().await, 4);
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        let base = Duration::from_millis(100);
        let first = backoff(base, 1);
        let third = backoff(base, 3);
        assert!(first >= base && first <= Duration::from_millis(125));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
    }
}
