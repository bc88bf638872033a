//! Proposal and vote record models
//!
//! These are the shapes written into the proposals artifact. Chain-side
//! account shapes live in `crate::rpc` and are converted on enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a governance proposal
///
/// Serialized as the on-chain numeric code so cached artifacts stay
/// compatible with readers that only know the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProposalState {
    Draft,
    SigningOff,
    Voting,
    Succeeded,
    Executing,
    Completed,
    Cancelled,
    Defeated,
    ExecutingWithErrors,
}

impl ProposalState {
    pub const ALL: [ProposalState; 9] = [
        ProposalState::Draft,
        ProposalState::SigningOff,
        ProposalState::Voting,
        ProposalState::Succeeded,
        ProposalState::Executing,
        ProposalState::Completed,
        ProposalState::Cancelled,
        ProposalState::Defeated,
        ProposalState::ExecutingWithErrors,
    ];

    pub fn code(self) -> u8 {
        match self {
            ProposalState::Draft => 0,
            ProposalState::SigningOff => 1,
            ProposalState::Voting => 2,
            ProposalState::Succeeded => 3,
            ProposalState::Executing => 4,
            ProposalState::Completed => 5,
            ProposalState::Cancelled => 6,
            ProposalState::Defeated => 7,
            ProposalState::ExecutingWithErrors => 8,
        }
    }
}

/// Returned when a state code is outside the known range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStateCode(pub u8);

impl fmt::Display for UnknownStateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown proposal state code {}", self.0)
    }
}

impl TryFrom<u8> for ProposalState {
    type Error = UnknownStateCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ProposalState::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or(UnknownStateCode(code))
    }
}

impl From<ProposalState> for u8 {
    fn from(state: ProposalState) -> Self {
        state.code()
    }
}

/// Weight cast for one option of a multi-choice proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub label: String,
    pub vote_weight: u64,
}

/// Aggregate vote weights as stored on the proposal account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VoteTally {
    #[serde(rename_all = "camelCase")]
    YesNo { yes_weight: u64, no_weight: u64 },
    #[serde(rename_all = "camelCase")]
    MultiChoice {
        options: Vec<OptionTally>,
        #[serde(default)]
        deny_weight: Option<u64>,
    },
}

impl VoteTally {
    /// Raw weight counted towards quorum.
    ///
    /// For multi-choice proposals this is the leading option.
    pub fn yes_weight(&self) -> u64 {
        match self {
            VoteTally::YesNo { yes_weight, .. } => *yes_weight,
            VoteTally::MultiChoice { options, .. } => {
                options.iter().map(|o| o.vote_weight).max().unwrap_or(0)
            }
        }
    }
}

impl Default for VoteTally {
    fn default() -> Self {
        VoteTally::YesNo {
            yes_weight: 0,
            no_weight: 0,
        }
    }
}

/// Direction of a single recorded vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VoteDirection {
    Yes,
    No,
    Choice { index: u16 },
}

/// One voter's recorded choice, normalized for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter: String,
    pub proposal: String,
    pub governing_token_mint: String,
    pub vote: VoteDirection,
    pub raw_weight: u64,
    pub decimals: u8,
    /// `raw_weight` scaled down by `decimals`
    pub weight: f64,
}

/// Label describing how voting power was denominated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    Council,
    Token,
    #[serde(rename = "NFT")]
    Nft,
}

/// Per-proposal voting metadata computed during a fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub vote_type: VoteType,
    pub decimals: u8,
    pub unique_yes: usize,
    pub unique_no: usize,
}

/// Quorum figures derived for one proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumSummary {
    pub total_votes: f64,
    pub total_votes_needed: f64,
    pub quorum_target_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded_quorum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded_quorum_percentage: Option<f64>,
}

/// An instruction attached to a proposal transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInstruction {
    pub address: String,
    pub program_id: String,
    pub index: u16,
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Opaque encoded instruction payload
    pub data: String,
    #[serde(default)]
    pub executed_at: Option<i64>,
}

/// A proposal as published in the proposals artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceProposal {
    pub id: String,
    pub governance: String,
    #[serde(default)]
    pub name: String,
    pub state: ProposalState,
    pub governing_token_mint: String,
    #[serde(default)]
    pub tally: VoteTally,
    #[serde(default)]
    pub draft_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_results: Option<Vec<VoteRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<ProposalInstruction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_summary: Option<VoteSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum: Option<QuorumSummary>,
}

impl GovernanceProposal {
    pub fn has_voting_results(&self) -> bool {
        self.voting_results.as_ref().is_some_and(|r| !r.is_empty())
    }
}
