//! Proposal lifecycle classification

use crate::models::ProposalState;
use serde::{Deserialize, Serialize};

/// Whether a proposal's cached result can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleClass {
    /// Still changing; always fetched live
    Active,
    /// Terminal or paused; cached results are stable
    Reusable,
}

pub fn classify(state: ProposalState) -> LifecycleClass {
    match state {
        ProposalState::Draft | ProposalState::Voting => LifecycleClass::Active,
        ProposalState::SigningOff
        | ProposalState::Succeeded
        | ProposalState::Executing
        | ProposalState::Completed
        | ProposalState::Cancelled
        | ProposalState::Defeated
        | ProposalState::ExecutingWithErrors => LifecycleClass::Reusable,
    }
}
