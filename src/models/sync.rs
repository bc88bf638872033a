//! Sync job request/response DTOs

use crate::sync::SyncRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

static BASE58_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("address pattern is valid")
});

/// Request to start a snapshot sync
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSyncRequest {
    #[validate(custom(function = "validate_address"))]
    pub governance_address: String,
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[serde(default)]
    pub force_refresh: bool,
}

impl From<StartSyncRequest> for SyncRequest {
    fn from(request: StartSyncRequest) -> Self {
        Self {
            governance_address: request.governance_address,
            name: request.name.trim().to_string(),
            force_refresh: request.force_refresh,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStartedResponse {
    pub job_id: Uuid,
}

/// Validate a base58 account address
fn validate_address(address: &str) -> Result<(), validator::ValidationError> {
    if !BASE58_ADDRESS.is_match(address) {
        let mut err = validator::ValidationError::new("invalid_address");
        err.message = Some("Governance address must be a base58 account address".into());
        return Err(err);
    }
    Ok(())
}

/// Validate the display name as it will be stored, i.e. trimmed
fn validate_name(name: &str) -> Result<(), validator::ValidationError> {
    let length = name.trim().chars().count();
    if !(1..=128).contains(&length) {
        let mut err = validator::ValidationError::new("length");
        err.message = Some("Name must be between 1 and 128 characters".into());
        return Err(err);
    }
    Ok(())
}
