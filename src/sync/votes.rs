//! Vote Record Fetcher
//!
//! Pulls vote records and instructions for every proposal marked `Fetch`,
//! resolves the governing mint's decimals, normalizes and orders the
//! records. Fan-out is bounded; results are put back by input index so the
//! output order never depends on completion order.

use crate::error::SyncError;
use crate::models::{
    GovernanceProposal, ProposalInstruction, Realm, VoteDirection, VoteRecord, VoteSummary,
    VoteType,
};
use crate::rpc::{CastVote, GovernanceRpc, ParsedAccount, RecordedVote, RpcError};
use crate::sync::cache_diff::{AnnotatedProposal, FetchDecision};
use crate::sync::progress::{Counter, Progress, SyncPhase};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Decimals assumed for mints that are neither known nor resolvable (NFT governance)
pub const NFT_FALLBACK_DECIMALS: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintDecimals {
    pub decimals: u8,
    pub vote_type: VoteType,
}

/// A proposal whose vote data could not be fetched in this run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedProposal {
    pub id: String,
    pub reason: String,
}

/// Vote data fetched for one proposal
#[derive(Debug, Clone)]
pub struct FetchedVotes {
    pub records: Vec<VoteRecord>,
    pub summary: VoteSummary,
    pub instructions: Vec<ProposalInstruction>,
}

/// Direction and raw weight of a recorded vote.
///
/// The explicit vote field wins; legacy records count a positive yes
/// weight as yes and anything else as no.
pub fn interpret_vote(vote: &RecordedVote) -> (VoteDirection, u64) {
    match vote {
        RecordedVote::Explicit { vote, voter_weight } => {
            let direction = match vote {
                CastVote::Approve => VoteDirection::Yes,
                CastVote::Deny => VoteDirection::No,
                CastVote::Choice { index } => VoteDirection::Choice { index: *index },
            };
            (direction, *voter_weight)
        }
        RecordedVote::Legacy {
            yes_weight,
            no_weight,
        } => match yes_weight {
            Some(weight) if *weight > 0 => (VoteDirection::Yes, *weight),
            _ => (VoteDirection::No, no_weight.unwrap_or(0)),
        },
    }
}

pub fn normalize(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(decimals))
}

pub struct VoteRecordFetcher<'a> {
    rpc: &'a dyn GovernanceRpc,
    realm: &'a Realm,
    known_tokens: &'a HashMap<String, u8>,
    resolved: RwLock<HashMap<String, MintDecimals>>,
}

impl<'a> VoteRecordFetcher<'a> {
    pub fn new(
        rpc: &'a dyn GovernanceRpc,
        realm: &'a Realm,
        known_tokens: &'a HashMap<String, u8>,
    ) -> Self {
        Self {
            rpc,
            realm,
            known_tokens,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Council mint, then known-token map, then the mint account itself,
    /// then the NFT fallback.
    pub async fn resolve_decimals(&self, mint: &str) -> MintDecimals {
        if self.realm.is_council_mint(mint) {
            return MintDecimals {
                decimals: 0,
                vote_type: VoteType::Council,
            };
        }

        if let Some(decimals) = self.known_tokens.get(mint) {
            return MintDecimals {
                decimals: *decimals,
                vote_type: VoteType::Token,
            };
        }

        if let Some(cached) = self.resolved.read().await.get(mint) {
            return *cached;
        }

        let resolved = match self.rpc.get_account_info(mint).await {
            Ok(Some(info)) => match info.parsed {
                ParsedAccount::Mint { decimals, .. } => MintDecimals {
                    decimals,
                    vote_type: VoteType::Token,
                },
                _ => Self::nft_fallback(mint, "account is not a mint"),
            },
            Ok(None) => Self::nft_fallback(mint, "mint account not found"),
            Err(e) => Self::nft_fallback(mint, &e.to_string()),
        };

        self.resolved
            .write()
            .await
            .insert(mint.to_string(), resolved);
        resolved
    }

    fn nft_fallback(mint: &str, reason: &str) -> MintDecimals {
        debug!(
            "No token metadata for {} ({}), assuming NFT governance",
            mint, reason
        );
        MintDecimals {
            decimals: NFT_FALLBACK_DECIMALS,
            vote_type: VoteType::Nft,
        }
    }

    /// Fetch, normalize and order the vote data of one proposal
    pub async fn fetch_one(&self, proposal: &GovernanceProposal) -> Result<FetchedVotes, RpcError> {
        let mint = &proposal.governing_token_mint;
        let MintDecimals {
            decimals,
            vote_type,
        } = self.resolve_decimals(mint).await;

        let raw = self.rpc.get_vote_records(&proposal.id).await?;

        let mut yes_voters = HashSet::new();
        let mut no_voters = HashSet::new();
        let mut records: Vec<VoteRecord> = raw
            .into_iter()
            .map(|record| {
                let (vote, raw_weight) = interpret_vote(&record.vote);
                match vote {
                    VoteDirection::No => no_voters.insert(record.governing_token_owner.clone()),
                    VoteDirection::Yes | VoteDirection::Choice { .. } => {
                        yes_voters.insert(record.governing_token_owner.clone())
                    }
                };
                VoteRecord {
                    voter: record.governing_token_owner,
                    proposal: proposal.id.clone(),
                    governing_token_mint: mint.clone(),
                    vote,
                    raw_weight,
                    decimals,
                    weight: normalize(raw_weight, decimals),
                }
            })
            .collect();

        // stable: equal weights keep enumeration order
        records.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let instructions = self.rpc.get_proposal_instructions(&proposal.id).await?;

        Ok(FetchedVotes {
            records,
            summary: VoteSummary {
                vote_type,
                decimals,
                unique_yes: yes_voters.len(),
                unique_no: no_voters.len(),
            },
            instructions,
        })
    }

    /// Fetch every `Fetch`-marked proposal with at most `concurrency` calls
    /// in flight. Failed proposals are returned without vote data.
    pub async fn fetch_all(
        &self,
        annotated: &mut [AnnotatedProposal],
        concurrency: usize,
        cancel: &CancellationToken,
        progress: &Progress<'_>,
    ) -> Result<Vec<FailedProposal>, SyncError> {
        let targets: Vec<(usize, GovernanceProposal)> = annotated
            .iter()
            .enumerate()
            .filter(|(_, a)| a.decision == FetchDecision::Fetch)
            .map(|(i, a)| (i, a.proposal.clone()))
            .collect();

        let mut counter = Counter::new(targets.len());
        let mut results = stream::iter(targets)
            .map(|(index, proposal)| async move {
                let outcome = self.fetch_one(&proposal).await;
                (index, outcome)
            })
            .buffer_unordered(concurrency.max(1));

        let mut collected = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                next = results.next() => next,
            };
            let Some((index, outcome)) = next else { break };

            let percent = counter.advance();
            progress
                .update(
                    SyncPhase::FetchVotes,
                    percent,
                    format!("Fetched votes for {}", annotated[index].proposal.id),
                )
                .await;
            collected.push((index, outcome));
        }

        collected.sort_by_key(|(index, _)| *index);

        let mut failed = Vec::new();
        for (index, outcome) in collected {
            let proposal = &mut annotated[index].proposal;
            match outcome {
                Ok(fetched) => {
                    proposal.voting_results = Some(fetched.records);
                    proposal.instructions = Some(fetched.instructions);
                    proposal.vote_summary = Some(fetched.summary);
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch votes for proposal {}: {} (continuing)",
                        proposal.id, e
                    );
                    proposal.voting_results = None;
                    proposal.instructions = None;
                    proposal.vote_summary = None;
                    failed.push(FailedProposal {
                        id: proposal.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(failed)
    }
}
