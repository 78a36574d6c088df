//! Concurrent publish and resolve pipelines.
//!
//! Every dependent (publish) or requested package (resolve) runs as its own
//! pipeline. At most [`MAX_CONCURRENT_TRANSFERS`] pipelines hold a permit at
//! once; the rest wait in arrival order. A failing pipeline never cancels its
//! siblings. Once all have finished the run either returns every report or a
//! [`TransferFailures`] holding every individual error.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::archive::{self, archive_file_name, ArchiveFormat};
use crate::bundle;
use crate::config::{PackageRequest, PackagesConfig, PacketConfig};
use crate::error::{PacketError, PacketResult, TransferFailures};
use crate::transport::{remote_join, SerializedTransport, Transport};
use crate::version::{parse_version, Constraint, VersionedName};

/// Pipelines allowed to run at the same time.
pub const MAX_CONCURRENT_TRANSFERS: usize = 5;

/// One uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub name: String,
    pub version: String,
    pub local: PathBuf,
    pub remote: String,
}

/// Result of [`Orchestrator::publish_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub main: Published,
    /// Completion order.
    pub dependents: Vec<Published>,
}

/// One installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub name: String,
    pub version: String,
    /// Remote file name that was selected.
    pub archive: String,
    pub dest: PathBuf,
    pub entries: usize,
}

/// Drives publish and resolve runs against one remote directory.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    remote_dir: String,
}

impl Orchestrator {
    /// The transport is shared by all pipelines and must tolerate concurrent calls.
    pub fn new(transport: Arc<dyn Transport>, remote_dir: impl Into<String>) -> Self {
        Self {
            transport,
            remote_dir: remote_dir.into(),
        }
    }

    /// Wrap a transport that cannot serve concurrent calls.
    pub fn serialized<T: Transport + 'static>(transport: T, remote_dir: impl Into<String>) -> Self {
        Self::new(Arc::new(SerializedTransport::new(transport)), remote_dir)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    /// Build every archive of `descriptor`, upload its own archive, then fan
    /// out the dependents.
    ///
    /// Build failures and the upload of the main archive are fatal for the
    /// whole run; dependent failures are aggregated.
    pub async fn publish_bundle(
        &self,
        descriptor: &PacketConfig,
        format: ArchiveFormat,
        work_dir: &Path,
    ) -> PacketResult<PublishReport> {
        let built = {
            let descriptor = descriptor.clone();
            let work_dir = work_dir.to_path_buf();
            let name = descriptor.name.clone();
            tokio::task::spawn_blocking(move || bundle::build_all(&descriptor, format, &work_dir))
                .await
                .map_err(|e| PacketError::Aborted {
                    pipeline: name,
                    reason: e.to_string(),
                })??
        };

        let file_name = descriptor.archive_name(format);
        let remote = remote_join(&self.remote_dir, &file_name);
        info!(
            packet = %descriptor.name,
            version = %descriptor.version,
            remote = %remote,
            "uploading archive"
        );
        self.transport.upload(&built.main.path, &remote).await?;

        let main = Published {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            local: built.main.path,
            remote,
        };
        let dependents = self.publish(descriptor, format, work_dir).await?;
        Ok(PublishReport { main, dependents })
    }

    /// Upload the pre-built archive of every nested dependent of `descriptor`.
    ///
    /// Archives are looked up in `local_dir` under their canonical name. Each
    /// dependent's version must be a valid semantic version.
    pub async fn publish(
        &self,
        descriptor: &PacketConfig,
        format: ArchiveFormat,
        local_dir: &Path,
    ) -> PacketResult<Vec<Published>> {
        let jobs = descriptor
            .dependents()
            .into_iter()
            .map(|dependent| {
                let label = format!("{}@{}", dependent.name, dependent.version);
                let job = publish_one(
                    self.transport.clone(),
                    self.remote_dir.clone(),
                    dependent.name.clone(),
                    dependent.version.clone(),
                    format,
                    local_dir.to_path_buf(),
                );
                (label, job)
            })
            .collect();

        self.fan_out("publish", jobs).await
    }

    /// Install one matching archive per request into `<dest_root>/<name>/`.
    ///
    /// The first listed archive whose version satisfies the constraint wins,
    /// even when a later entry carries a higher version. Names must be unique,
    /// since each pipeline owns its install directory.
    pub async fn resolve(
        &self,
        requests: &[PackageRequest],
        dest_root: &Path,
    ) -> PacketResult<Vec<Installed>> {
        PackagesConfig {
            packages: requests.to_vec(),
        }
        .validate()?;

        let jobs = requests
            .iter()
            .map(|request| {
                let job = resolve_one(
                    self.transport.clone(),
                    self.remote_dir.clone(),
                    request.clone(),
                    dest_root.to_path_buf(),
                );
                (request.name.clone(), job)
            })
            .collect();

        self.fan_out("resolve", jobs).await
    }

    async fn fan_out<T, Fut>(&self, run: &'static str, jobs: Vec<(String, Fut)>) -> PacketResult<Vec<T>>
    where
        T: Send + 'static,
        Fut: Future<Output = PacketResult<T>> + Send + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            debug!(run, "nothing to do");
            return Ok(Vec::new());
        }
        info!(run, pipelines = total, limit = MAX_CONCURRENT_TRANSFERS, "starting pipelines");

        let sem = Arc::new(Semaphore::new(MAX_CONCURRENT_TRANSFERS));
        let mut join_set = JoinSet::new();

        for (label, job) in jobs {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PacketError::Aborted {
                    pipeline: label.clone(),
                    reason: e.to_string(),
                })?;
            join_set.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(job).catch_unwind().await;
                (label, outcome)
            });
        }

        let mut done = Vec::with_capacity(total);
        let mut errors = Vec::new();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((label, Ok(Ok(item)))) => {
                    debug!(run, pipeline = %label, "pipeline finished");
                    done.push(item);
                }
                Ok((label, Ok(Err(e)))) => {
                    error!(run, pipeline = %label, error = %e, "pipeline failed");
                    errors.push(e);
                }
                Ok((label, Err(panic))) => {
                    let reason = panic_message(panic.as_ref());
                    error!(run, pipeline = %label, reason = %reason, "pipeline panicked");
                    errors.push(PacketError::Aborted {
                        pipeline: label,
                        reason,
                    });
                }
                Err(e) => {
                    error!(run, error = %e, "pipeline task lost");
                    errors.push(PacketError::Aborted {
                        pipeline: "unknown".into(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            info!(run, pipelines = total, "all pipelines succeeded");
            Ok(done)
        } else {
            warn!(
                run,
                failed = errors.len(),
                succeeded = done.len(),
                "some pipelines failed"
            );
            Err(TransferFailures::new(errors, done.len()).into())
        }
    }
}

async fn publish_one(
    transport: Arc<dyn Transport>,
    remote_dir: String,
    name: String,
    version: String,
    format: ArchiveFormat,
    local_dir: PathBuf,
) -> PacketResult<Published> {
    parse_version(&version).map_err(|e| PacketError::version(version.as_str(), "", Some(e)))?;

    let file_name = archive_file_name(&name, &version, format);
    let local = local_dir.join(&file_name);
    let remote = remote_join(&remote_dir, &file_name);

    info!(packet = %name, version = %version, remote = %remote, "uploading dependent");
    transport.upload(&local, &remote).await?;

    Ok(Published {
        name,
        version,
        local,
        remote,
    })
}

async fn resolve_one(
    transport: Arc<dyn Transport>,
    remote_dir: String,
    request: PackageRequest,
    dest_root: PathBuf,
) -> PacketResult<Installed> {
    let name = request.name;
    let constraint = Constraint::parse(&request.constraint)?;
    let entries = transport.list_directory(&remote_dir).await?;
    debug!(packet = %name, candidates = entries.len(), "remote listing fetched");

    for entry in entries.iter().filter(|e| !e.is_directory) {
        let Some(candidate) = VersionedName::parse(&entry.name) else {
            continue;
        };
        if !candidate.belongs_to(&name) {
            continue;
        }
        if candidate.version.is_empty() {
            debug!(packet = %name, archive = %entry.name, "no version in archive name, skipping");
            continue;
        }
        match constraint.check(candidate.version) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    packet = %name,
                    archive = %entry.name,
                    constraint = %constraint,
                    "version does not satisfy constraint"
                );
                continue;
            }
            Err(e) => {
                warn!(packet = %name, archive = %entry.name, error = %e, "skipping candidate");
                continue;
            }
        }

        info!(
            packet = %name,
            version = %candidate.version,
            archive = %entry.name,
            "selected archive"
        );

        let staging = tempfile::tempdir().map_err(|source| PacketError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let local = staging.path().join(&entry.name);
        transport
            .download(&remote_join(&remote_dir, &entry.name), &local)
            .await?;

        let dest = dest_root.join(&name);
        let format = candidate.format;
        let extracted = {
            let dest = dest.clone();
            tokio::task::spawn_blocking(move || archive::extract_as(format, &local, &dest))
                .await
                .map_err(|e| PacketError::Aborted {
                    pipeline: name.clone(),
                    reason: e.to_string(),
                })??
        };

        info!(packet = %name, dest = %dest.display(), entries = extracted, "package installed");
        return Ok(Installed {
            version: candidate.version.to_string(),
            archive: entry.name.clone(),
            name,
            dest,
            entries: extracted,
        });
    }

    Err(PacketError::NotFound {
        name,
        constraint: request.constraint,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
