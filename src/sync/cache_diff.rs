//! Cache Diff Engine
//!
//! Merges freshly enumerated proposals against the previously published
//! proposals artifact and decides, per proposal, whether its vote data must
//! be fetched again. No network calls happen here.

use crate::models::GovernanceProposal;
use crate::sync::lifecycle::{classify, LifecycleClass};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDecision {
    Fetch,
    Skip,
}

/// A fresh proposal together with its fetch decision
#[derive(Debug, Clone)]
pub struct AnnotatedProposal {
    pub proposal: GovernanceProposal,
    pub decision: FetchDecision,
}

/// Counts produced by a diff pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub to_fetch: usize,
    pub reused: usize,
    pub cached: usize,
}

pub struct CacheDiffEngine;

impl CacheDiffEngine {
    /// Annotate `fresh` in order. Cached vote data is copied onto every
    /// proposal marked `Skip`.
    pub fn annotate(
        fresh: Vec<GovernanceProposal>,
        cached: &[GovernanceProposal],
        force_refresh: bool,
    ) -> Vec<AnnotatedProposal> {
        let by_id: HashMap<&str, &GovernanceProposal> =
            cached.iter().map(|p| (p.id.as_str(), p)).collect();

        fresh
            .into_iter()
            .map(|mut proposal| {
                let reusable = by_id
                    .get(proposal.id.as_str())
                    .filter(|_| !force_refresh)
                    .filter(|c| Self::is_reusable(&proposal, c));

                match reusable {
                    Some(cached) => {
                        proposal.voting_results = cached.voting_results.clone();
                        proposal.instructions = cached.instructions.clone();
                        proposal.vote_summary = cached.vote_summary.clone();
                        proposal.quorum = cached.quorum.clone();
                        AnnotatedProposal {
                            proposal,
                            decision: FetchDecision::Skip,
                        }
                    }
                    None => AnnotatedProposal {
                        proposal,
                        decision: FetchDecision::Fetch,
                    },
                }
            })
            .collect()
    }

    fn is_reusable(fresh: &GovernanceProposal, cached: &GovernanceProposal) -> bool {
        classify(cached.state) == LifecycleClass::Reusable
            && classify(fresh.state) == LifecycleClass::Reusable
            && cached.has_voting_results()
    }

    pub fn summarize(annotated: &[AnnotatedProposal], cached: usize) -> DiffSummary {
        let to_fetch = annotated
            .iter()
            .filter(|a| a.decision == FetchDecision::Fetch)
            .count();
        DiffSummary {
            to_fetch,
            reused: annotated.len() - to_fetch,
            cached,
        }
    }
}
