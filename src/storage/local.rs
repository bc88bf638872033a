//! Filesystem-backed storage pool
//!
//! Mirrors the decentralized storage contract on local disk: each pool is a
//! directory under `root`, each object a file. Create refuses to overwrite,
//! replace refuses to create.

use super::{
    object_url, parse_object_url, StorageClient, StorageError, StorageFile, UploadReceipt,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalDirectoryStorage {
    root: PathBuf,
    host: String,
}

impl LocalDirectoryStorage {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
        }
    }

    fn pool_dir(&self, pool: &str) -> PathBuf {
        self.root.join(pool)
    }

    fn object_path(&self, pool: &str, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(StorageError::Rejected(format!("invalid object name: {}", name)));
        }
        Ok(self.pool_dir(pool).join(name))
    }

    fn resolve_url(&self, pool: &str, url: &str) -> Result<PathBuf, StorageError> {
        let (url_pool, name) = parse_object_url(url)?;
        if url_pool != pool {
            return Err(StorageError::Rejected(format!(
                "object {} does not belong to pool {}",
                url, pool
            )));
        }
        self.object_path(pool, &name)
    }

    async fn exists(path: &Path) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

#[async_trait]
impl StorageClient for LocalDirectoryStorage {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_objects(&self, pool: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.pool_dir(pool);
        if !Self::exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn create(&self, pool: &str, file: StorageFile) -> Result<UploadReceipt, StorageError> {
        let path = self.object_path(pool, &file.name)?;
        if Self::exists(&path).await? {
            return Err(StorageError::AlreadyExists(file.name));
        }

        tokio::fs::create_dir_all(self.pool_dir(pool)).await?;
        tokio::fs::write(&path, &file.bytes).await?;
        debug!("Created {} ({} bytes)", path.display(), file.bytes.len());

        Ok(UploadReceipt {
            url: object_url(&self.host, pool, &file.name),
            bytes: file.bytes.len(),
        })
    }

    async fn replace(
        &self,
        pool: &str,
        existing_url: &str,
        file: StorageFile,
        _format_version: &str,
    ) -> Result<UploadReceipt, StorageError> {
        let path = self.resolve_url(pool, existing_url)?;
        if !Self::exists(&path).await? {
            return Err(StorageError::NotFound(existing_url.to_string()));
        }

        tokio::fs::write(&path, &file.bytes).await?;
        debug!("Replaced {} ({} bytes)", path.display(), file.bytes.len());

        Ok(UploadReceipt {
            url: existing_url.to_string(),
            bytes: file.bytes.len(),
        })
    }

    async fn delete(
        &self,
        pool: &str,
        file_url: &str,
        _format_version: &str,
    ) -> Result<(), StorageError> {
        let path = self.resolve_url(pool, file_url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, pool: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.object_path(pool, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_then_replace_then_delete() {
        let root = tempdir().unwrap();
        let storage = LocalDirectoryStorage::new(root.path(), "storage.test");

        assert!(storage.list_objects("pool").await.unwrap().is_empty());

        let receipt = storage
            .create("pool", StorageFile::new("a.json", b"one".to_vec()))
            .await
            .unwrap();
        assert_eq!(receipt.url, "https://storage.test/pool/a.json");
        assert_eq!(storage.list_objects("pool").await.unwrap(), vec!["a.json"]);

        let dup = storage
            .create("pool", StorageFile::new("a.json", b"two".to_vec()))
            .await;
        assert!(matches!(dup, Err(StorageError::AlreadyExists(_))));

        storage
            .replace("pool", &receipt.url, StorageFile::new("a.json", b"two".to_vec()), "v2")
            .await
            .unwrap();
        assert_eq!(storage.fetch("pool", "a.json").await.unwrap(), Some(b"two".to_vec()));

        storage.delete("pool", &receipt.url, "v2").await.unwrap();
        assert_eq!(storage.fetch("pool", "a.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_missing_object_fails() {
        let root = tempdir().unwrap();
        let storage = LocalDirectoryStorage::new(root.path(), "storage.test");
        let result = storage
            .replace(
                "pool",
                "https://storage.test/pool/missing.json",
                StorageFile::new("missing.json", vec![]),
                "v2",
            )
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let root = tempdir().unwrap();
        let storage = LocalDirectoryStorage::new(root.path(), "storage.test");
        let result = storage
            .create("pool", StorageFile::new("../escape.json", vec![]))
            .await;
        assert!(matches!(result, Err(StorageError::Rejected(_))));
    }
}
