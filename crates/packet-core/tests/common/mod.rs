//! Shared test double for orchestrator tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use packet_core::{
    archive, ArchiveFormat, PacketError, PacketResult, RemoteEntry, Transport, TransportOp,
};

/// In-process transport with a fixed listing, injected failures and a
/// concurrency gauge.
///
/// Downloads materialize a small archive built from `payload` under the
/// requested remote name, so resolve pipelines can extract real content.
pub struct ScriptedTransport {
    listing: Vec<RemoteEntry>,
    failing: HashSet<String>,
    delay: Duration,
    payload: PathBuf,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub uploads: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(payload: &Path) -> Self {
        Self {
            listing: Vec::new(),
            failing: HashSet::new(),
            delay: Duration::from_millis(0),
            payload: payload.to_path_buf(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_listing(mut self, names: &[&str]) -> Self {
        self.listing = names.iter().map(|n| RemoteEntry::file(*n)).collect();
        self
    }

    pub fn with_entry(mut self, entry: RemoteEntry) -> Self {
        self.listing.push(entry);
        self
    }

    /// Any upload or download whose remote path ends with `suffix` fails.
    pub fn failing(mut self, suffix: &str) -> Self {
        self.failing.insert(suffix.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, remote: &str) -> bool {
        self.failing.iter().any(|suffix| remote.ends_with(suffix.as_str()))
    }

    async fn track<T>(&self, work: impl std::future::Future<Output = T>) -> T {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let out = work.await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn upload(&self, local: &Path, remote: &str) -> PacketResult<()> {
        self.track(async {
            if self.should_fail(remote) {
                return Err(PacketError::Transport {
                    operation: TransportOp::Upload,
                    from: local.display().to_string(),
                    to: remote.to_string(),
                    source: anyhow::anyhow!("injected upload failure"),
                });
            }
            self.uploads.lock().unwrap().push(remote.to_string());
            Ok(())
        })
        .await
    }

    async fn download(&self, remote: &str, local: &Path) -> PacketResult<()> {
        self.track(async {
            if self.should_fail(remote) {
                return Err(PacketError::Transport {
                    operation: TransportOp::Download,
                    from: remote.to_string(),
                    to: local.display().to_string(),
                    source: anyhow::anyhow!("injected download failure"),
                });
            }
            let name = local.file_name().unwrap().to_string_lossy().into_owned();
            let format = ArchiveFormat::from_file_name(&name).unwrap();
            // Entry names are relative to the archive's directory, so stage the payload there.
            let staged = local.with_file_name(self.payload.file_name().unwrap());
            std::fs::copy(&self.payload, &staged).unwrap();
            archive::create(format, &[staged.clone()], local)?;
            std::fs::remove_file(staged).unwrap();
            self.downloads.lock().unwrap().push(remote.to_string());
            Ok(())
        })
        .await
    }

    async fn list_directory(&self, _remote: &str) -> PacketResult<Vec<RemoteEntry>> {
        self.track(async { Ok(self.listing.clone()) }).await
    }

    async fn close(&self) -> PacketResult<()> {
        Ok(())
    }
}
