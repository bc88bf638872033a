//! Storage Uploader
//!
//! Create-or-replace publication of one compressed blob. Every artifact and
//! the manifest go through `upload` independently; a failure is returned as
//! an outcome rather than an error so the caller can keep going.

use crate::storage::{object_url, StorageClient, StorageFile, STORAGE_FORMAT_VERSION};
use crate::sync::progress::{Progress, SyncPhase};
use crate::sync::serializer::EncodedArtifact;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Created,
    Replaced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub name: String,
    pub status: UploadStatus,
    pub bytes: usize,
    /// Hex sha-256 of the uploaded bytes, for snapshot artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        self.status != UploadStatus::Failed
    }

    fn failed(name: &str, bytes: usize, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            status: UploadStatus::Failed,
            bytes,
            checksum: None,
            url: None,
            error: Some(error.to_string()),
        }
    }
}

/// Human readable byte size, e.g. `1.5 KB`
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub struct StorageUploader<'a> {
    storage: &'a dyn StorageClient,
    pool: &'a str,
    progress: &'a Progress<'a>,
}

impl<'a> StorageUploader<'a> {
    pub fn new(storage: &'a dyn StorageClient, pool: &'a str, progress: &'a Progress<'a>) -> Self {
        Self {
            storage,
            pool,
            progress,
        }
    }

    /// Upload a serialized artifact, carrying its checksum into the outcome
    pub async fn upload_artifact(&self, artifact: &EncodedArtifact) -> UploadOutcome {
        let mut outcome = self.upload(&artifact.name, artifact.bytes.clone()).await;
        outcome.checksum = Some(artifact.checksum.clone());
        outcome
    }

    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> UploadOutcome {
        let size = bytes.len();

        let exists = match self.storage.list_objects(self.pool).await {
            Ok(listed) => listed.iter().any(|n| n == name),
            Err(e) => {
                warn!("Could not list pool {} before uploading {}: {}", self.pool, name, e);
                self.progress
                    .phase(
                        SyncPhase::Upload(name.to_string()),
                        format!("Skipping {} ({}): pool listing failed", name, format_size(size)),
                    )
                    .await;
                return UploadOutcome::failed(name, size, e);
            }
        };

        let verb = if exists { "Replacing" } else { "Adding" };
        self.progress
            .phase(
                SyncPhase::Upload(name.to_string()),
                format!("{} {} ({})", verb, name, format_size(size)),
            )
            .await;

        let file = StorageFile::new(name, bytes);
        let result = if exists {
            let url = object_url(self.storage.host(), self.pool, name);
            self.storage
                .replace(self.pool, &url, file, STORAGE_FORMAT_VERSION)
                .await
                .map(|r| (UploadStatus::Replaced, r))
        } else {
            self.storage
                .create(self.pool, file)
                .await
                .map(|r| (UploadStatus::Created, r))
        };

        match result {
            Ok((status, receipt)) => {
                info!("{:?} {} ({})", status, name, format_size(receipt.bytes));
                UploadOutcome {
                    name: name.to_string(),
                    status,
                    bytes: receipt.bytes,
                    checksum: None,
                    url: Some(receipt.url),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", name, e);
                UploadOutcome::failed(name, size, e)
            }
        }
    }

    /// Best-effort removal of an artifact that is no longer referenced
    pub async fn remove(&self, name: &str) -> bool {
        let url = object_url(self.storage.host(), self.pool, name);
        match self.storage.delete(self.pool, &url, STORAGE_FORMAT_VERSION).await {
            Ok(()) => {
                info!("Deleted superseded artifact {}", name);
                true
            }
            Err(e) => {
                warn!("Could not delete superseded artifact {}: {}", name, e);
                false
            }
        }
    }
}
