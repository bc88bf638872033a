//! Data models and DTOs (Data Transfer Objects)
//!
//! Snapshot artifact shapes plus the generic API response envelope.

pub mod manifest;
pub mod member;
pub mod proposal;
pub mod realm;
pub mod sync;

// Re-export commonly used types
pub use manifest::*;
pub use member::*;
pub use proposal::*;
pub use realm::*;
pub use sync::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
