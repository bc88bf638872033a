//! In-memory storage pool with an operation log and failure injection

use super::{
    object_url, parse_object_url, StorageClient, StorageError, StorageFile, UploadReceipt,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// A storage call as observed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Create(String),
    Replace(String),
    Delete(String),
}

#[derive(Default)]
struct Inner {
    pools: HashMap<String, BTreeMap<String, Vec<u8>>>,
    ops: Vec<StorageOp>,
    failing: HashSet<String>,
    listing_fails: bool,
}

pub struct InMemoryStorage {
    host: String,
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn ops(&self) -> Vec<StorageOp> {
        self.inner.read().await.ops.clone()
    }

    pub async fn clear_ops(&self) {
        self.inner.write().await.ops.clear();
    }

    /// Reject every create/replace of `name` until cleared
    pub async fn fail_uploads_of(&self, name: &str) {
        self.inner.write().await.failing.insert(name.to_string());
    }

    /// Make every listing fail until cleared
    pub async fn fail_listing(&self) {
        self.inner.write().await.listing_fails = true;
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.write().await;
        inner.failing.clear();
        inner.listing_fails = false;
    }

    /// Write an object directly, bypassing the op log
    pub async fn put(&self, pool: &str, name: &str, bytes: Vec<u8>) {
        self.inner
            .write()
            .await
            .pools
            .entry(pool.to_string())
            .or_default()
            .insert(name.to_string(), bytes);
    }

    fn check_url(pool: &str, url: &str) -> Result<String, StorageError> {
        let (url_pool, name) = parse_object_url(url)?;
        if url_pool != pool {
            return Err(StorageError::Rejected(format!(
                "object {} does not belong to pool {}",
                url, pool
            )));
        }
        Ok(name)
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_objects(&self, pool: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.read().await;
        if inner.listing_fails {
            return Err(StorageError::Rejected(format!("listing of {} refused", pool)));
        }
        Ok(inner
            .pools
            .get(pool)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn create(&self, pool: &str, file: StorageFile) -> Result<UploadReceipt, StorageError> {
        let mut inner = self.inner.write().await;
        inner.ops.push(StorageOp::Create(file.name.clone()));

        if inner.failing.contains(&file.name) {
            return Err(StorageError::Rejected(format!("upload of {} refused", file.name)));
        }

        let objects = inner.pools.entry(pool.to_string()).or_default();
        if objects.contains_key(&file.name) {
            return Err(StorageError::AlreadyExists(file.name));
        }

        let bytes = file.bytes.len();
        let url = object_url(&self.host, pool, &file.name);
        objects.insert(file.name, file.bytes);
        Ok(UploadReceipt { url, bytes })
    }

    async fn replace(
        &self,
        pool: &str,
        existing_url: &str,
        file: StorageFile,
        _format_version: &str,
    ) -> Result<UploadReceipt, StorageError> {
        let name = Self::check_url(pool, existing_url)?;
        let mut inner = self.inner.write().await;
        inner.ops.push(StorageOp::Replace(name.clone()));

        if inner.failing.contains(&name) {
            return Err(StorageError::Rejected(format!("replace of {} refused", name)));
        }

        let objects = inner.pools.entry(pool.to_string()).or_default();
        if !objects.contains_key(&name) {
            return Err(StorageError::NotFound(existing_url.to_string()));
        }

        let bytes = file.bytes.len();
        objects.insert(name, file.bytes);
        Ok(UploadReceipt {
            url: existing_url.to_string(),
            bytes,
        })
    }

    async fn delete(
        &self,
        pool: &str,
        file_url: &str,
        _format_version: &str,
    ) -> Result<(), StorageError> {
        let name = Self::check_url(pool, file_url)?;
        let mut inner = self.inner.write().await;
        inner.ops.push(StorageOp::Delete(name.clone()));

        inner
            .pools
            .get_mut(pool)
            .and_then(|objects| objects.remove(&name))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(file_url.to_string()))
    }

    async fn fetch(&self, pool: &str, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .pools
            .get(pool)
            .and_then(|objects| objects.get(name))
            .cloned())
    }
}
