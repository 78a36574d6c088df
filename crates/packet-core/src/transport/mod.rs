//! Remote store facade.
//!
//! The orchestrator only ever talks to a [`Transport`]: four operations over
//! an already-authenticated remote file system. Backends:
//!
//! - [`ObjectStoreTransport`]: local directory, in-memory or S3 via `object_store`
//! - [`SerializedTransport`]: wraps any transport and runs one call at a time
//!
//! Remote paths use `/` separators and are relative to the store root.

mod object_store_backend;
mod serialized;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PacketResult;

pub use object_store_backend::ObjectStoreTransport;
pub use serialized::SerializedTransport;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Base name, no directory part.
    pub name: String,
    pub is_directory: bool,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
        }
    }
}

/// Capability interface over the remote store.
///
/// Implementations shared by concurrent pipelines must be safe to call from
/// several tasks at once; wrap them in [`SerializedTransport`] otherwise.
/// Every failure is reported as [`PacketError::Transport`](crate::PacketError::Transport).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Copy a local file to `remote`, replacing any existing object.
    async fn upload(&self, local: &Path, remote: &str) -> PacketResult<()>;

    /// Copy `remote` into the local file `local`, creating parent directories.
    async fn download(&self, remote: &str, local: &Path) -> PacketResult<()>;

    /// Immediate children of the remote directory, in backend order.
    async fn list_directory(&self, remote: &str) -> PacketResult<Vec<RemoteEntry>>;

    /// Release the session. Later calls fail.
    async fn close(&self) -> PacketResult<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn upload(&self, local: &Path, remote: &str) -> PacketResult<()> {
        (**self).upload(local, remote).await
    }

    async fn download(&self, remote: &str, local: &Path) -> PacketResult<()> {
        (**self).download(remote, local).await
    }

    async fn list_directory(&self, remote: &str) -> PacketResult<Vec<RemoteEntry>> {
        (**self).list_directory(remote).await
    }

    async fn close(&self) -> PacketResult<()> {
        (**self).close().await
    }
}

/// Join a remote directory and a file name with a single `/`.
pub fn remote_join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("", "a-1.0.0.zip"), "a-1.0.0.zip");
        assert_eq!(remote_join("packets/", "a-1.0.0.zip"), "packets/a-1.0.0.zip");
        assert_eq!(remote_join("x/y", "z"), "x/y/z");
    }
}
