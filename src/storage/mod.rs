//! Decentralized storage boundary
//!
//! Artifacts live in a storage pool addressed by key. Objects are reachable
//! at `https://<host>/<pool>/<file>`; replace and delete calls are addressed
//! by that URL plus a storage-format version tag.

pub mod local;
pub mod memory;

pub use local::LocalDirectoryStorage;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage-format version tag sent with replace and delete calls
pub const STORAGE_FORMAT_VERSION: &str = "v2";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object URL: {0}")]
    InvalidUrl(String),

    #[error("Storage backend rejected request: {0}")]
    Rejected(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named blob ready for upload
#[derive(Debug, Clone)]
pub struct StorageFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl StorageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Acknowledgement returned by create/replace calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub url: String,
    pub bytes: usize,
}

/// Build the public URL of an object
pub fn object_url(host: &str, pool: &str, name: &str) -> String {
    format!("https://{}/{}/{}", host, pool, name)
}

/// Split an object URL back into `(pool, name)`
pub fn parse_object_url(url: &str) -> Result<(String, String), StorageError> {
    let parsed = url::Url::parse(url).map_err(|_| StorageError::InvalidUrl(url.to_string()))?;
    let mut segments = parsed
        .path_segments()
        .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;

    match (segments.next(), segments.next(), segments.next()) {
        (Some(pool), Some(name), None) if !pool.is_empty() && !name.is_empty() => {
            Ok((pool.to_string(), name.to_string()))
        }
        _ => Err(StorageError::InvalidUrl(url.to_string())),
    }
}

/// Operations exposed by the storage backend
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Host used to build object URLs
    fn host(&self) -> &str;

    async fn list_objects(&self, pool: &str) -> Result<Vec<String>, StorageError>;

    async fn create(&self, pool: &str, file: StorageFile) -> Result<UploadReceipt, StorageError>;

    async fn replace(
        &self,
        pool: &str,
        existing_url: &str,
        file: StorageFile,
        format_version: &str,
    ) -> Result<UploadReceipt, StorageError>;

    async fn delete(
        &self,
        pool: &str,
        file_url: &str,
        format_version: &str,
    ) -> Result<(), StorageError>;

    /// Read an object through its public URL. `Ok(None)` when absent.
    async fn fetch(&self, pool: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
