use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{RemoteEntry, Transport};
use crate::error::PacketResult;

/// Runs every call of the wrapped transport under one lock.
///
/// For sessions that cannot serve concurrent requests. Pipelines still run
/// in parallel; only their transport calls queue up.
pub struct SerializedTransport<T> {
    inner: T,
    lock: Mutex<()>,
}

impl<T: Transport> SerializedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for SerializedTransport<T> {
    async fn upload(&self, local: &Path, remote: &str) -> PacketResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.upload(local, remote).await
    }

    async fn download(&self, remote: &str, local: &Path) -> PacketResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.download(remote, local).await
    }

    async fn list_directory(&self, remote: &str) -> PacketResult<Vec<RemoteEntry>> {
        let _guard = self.lock.lock().await;
        self.inner.list_directory(remote).await
    }

    async fn close(&self) -> PacketResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.close().await
    }
}
