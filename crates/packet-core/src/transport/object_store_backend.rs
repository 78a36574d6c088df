//! Transport backed by `object_store`.
//!
//! Supports a local directory (`file://`), an in-memory store (`memory://`)
//! and S3 or S3-compatible services (`s3://bucket[/prefix]`).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use tracing::{debug, info};
use url::Url;

use super::{remote_join, RemoteEntry, Transport};
use crate::config::RemoteConfig;
use crate::error::{PacketError, PacketResult, TransportOp};

/// Remote store over any `object_store` backend.
pub struct ObjectStoreTransport {
    inner: Arc<dyn ObjectStore>,
    label: String,
    closed: AtomicBool,
}

impl ObjectStoreTransport {
    /// Open the store named by `config.url`.
    ///
    /// Credentials for S3 come only from `config`, never from the environment.
    pub fn connect(config: &RemoteConfig) -> PacketResult<Self> {
        let url = Url::parse(&config.url).map_err(|e| {
            PacketError::config_with(format!("invalid remote URL '{}'", config.url), e)
        })?;

        let inner: Arc<dyn ObjectStore> = match url.scheme() {
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            "file" => {
                let root = url.to_file_path().map_err(|()| {
                    PacketError::config(format!("remote URL '{}' is not a local path", config.url))
                })?;
                std::fs::create_dir_all(&root).map_err(|e| {
                    PacketError::transport(TransportOp::Connect, "", config.url.as_str(), e)
                })?;
                Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(&root).map_err(|e| {
                        PacketError::transport(TransportOp::Connect, "", config.url.as_str(), e)
                    })?,
                )
            }
            "s3" => Self::s3(&url, config)?,
            scheme => {
                return Err(PacketError::config(format!(
                    "unsupported remote scheme '{scheme}' (expected file, memory or s3)"
                )))
            }
        };

        info!(remote = %config.url, "connected to remote store");
        Ok(Self::from_store(inner, config.url.clone()))
    }

    fn s3(url: &Url, config: &RemoteConfig) -> PacketResult<Arc<dyn ObjectStore>> {
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| PacketError::config("s3 remote URL must include a bucket name"))?;

        let mut builder = object_store::aws::AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build().map_err(|e| {
            PacketError::transport(TransportOp::Connect, "", config.url.as_str(), e)
        })?;

        let prefix = url.path().trim_matches('/');
        if prefix.is_empty() {
            Ok(Arc::new(store))
        } else {
            Ok(Arc::new(object_store::prefix::PrefixStore::new(
                store, prefix,
            )))
        }
    }

    /// Empty in-memory store.
    pub fn memory() -> Self {
        Self::from_store(Arc::new(object_store::memory::InMemory::new()), "memory://")
    }

    /// Wrap an existing store.
    pub fn from_store(inner: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self, op: TransportOp, from: &str, to: &str) -> PacketResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PacketError::transport(
                op,
                from,
                to,
                anyhow::anyhow!("transport to {} is closed", self.label),
            ));
        }
        Ok(())
    }

    fn object_path(
        &self,
        op: TransportOp,
        from: &str,
        to: &str,
        remote: &str,
    ) -> PacketResult<ObjectPath> {
        ObjectPath::parse(remote.trim_matches('/'))
            .map_err(|e| PacketError::transport(op, from, to, e))
    }
}

#[async_trait]
impl Transport for ObjectStoreTransport {
    async fn upload(&self, local: &Path, remote: &str) -> PacketResult<()> {
        let from = local.display().to_string();
        let op = TransportOp::Upload;
        self.ensure_open(op, &from, remote)?;
        let key = self.object_path(op, &from, remote, remote)?;

        let data = tokio::fs::read(local)
            .await
            .map_err(|e| PacketError::transport(op, from.as_str(), remote, e))?;
        let size = data.len();
        self.inner
            .put(&key, PutPayload::from_bytes(Bytes::from(data)))
            .await
            .map_err(|e| PacketError::transport(op, from.as_str(), remote, e))?;

        debug!(local = %from, remote, size, "uploaded");
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> PacketResult<()> {
        let to = local.display().to_string();
        let op = TransportOp::Download;
        self.ensure_open(op, remote, &to)?;
        let key = self.object_path(op, remote, &to, remote)?;

        let bytes = self
            .inner
            .get(&key)
            .await
            .map_err(|e| PacketError::transport(op, remote, to.as_str(), e))?
            .bytes()
            .await
            .map_err(|e| PacketError::transport(op, remote, to.as_str(), e))?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PacketError::transport(op, remote, to.as_str(), e))?;
        }
        tokio::fs::write(local, &bytes)
            .await
            .map_err(|e| PacketError::transport(op, remote, to.as_str(), e))?;

        debug!(remote, local = %to, size = bytes.len(), "downloaded");
        Ok(())
    }

    async fn list_directory(&self, remote: &str) -> PacketResult<Vec<RemoteEntry>> {
        let op = TransportOp::List;
        self.ensure_open(op, remote, "")?;

        let dir = remote.trim_matches('/');
        let prefix = if dir.is_empty() {
            None
        } else {
            Some(self.object_path(op, remote, "", dir)?)
        };

        let listing = self
            .inner
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| PacketError::transport(op, remote, "", e))?;

        let mut entries: Vec<RemoteEntry> = listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(RemoteEntry::file))
            .collect();
        for sub in &listing.common_prefixes {
            if let Some(name) = sub.filename() {
                if !entries.iter().any(|e| e.is_directory && e.name == name) {
                    entries.push(RemoteEntry::directory(name));
                }
            }
        }

        debug!(
            remote = %remote_join(&self.label, dir),
            entries = entries.len(),
            "listed remote directory"
        );
        Ok(entries)
    }

    async fn close(&self) -> PacketResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(remote = %self.label, "transport closed");
        }
        Ok(())
    }
}
