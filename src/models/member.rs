//! Member (token owner record) and transaction models

use serde::{Deserialize, Serialize};

/// A wallet's deposited voting power within the realm, unique by owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub governing_token_owner: String,
    /// Raw community-mint deposit
    pub governing_token_deposit_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council_deposit_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_balance: Option<f64>,
}

/// A transaction touching the realm, as returned by history queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTx {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub memo: Option<String>,
}
