//! Local archive building for a descriptor tree.

use std::path::Path;

use tracing::info;

use crate::archive::{self, Archive, ArchiveFormat};
use crate::collect::collect;
use crate::config::PacketConfig;
use crate::error::PacketResult;

/// Archives produced for one descriptor and all of its dependents.
#[derive(Debug, Clone)]
pub struct BuiltBundle {
    pub main: Archive,
    /// Depth-first, same order as [`PacketConfig::dependents`].
    pub dependents: Vec<Archive>,
}

impl BuiltBundle {
    pub fn archives(&self) -> impl Iterator<Item = &Archive> {
        std::iter::once(&self.main).chain(self.dependents.iter())
    }
}

/// Collect the descriptor's targets and write `<name>-<version><ext>` into `work_dir`.
pub fn build_archive(
    descriptor: &PacketConfig,
    format: ArchiveFormat,
    work_dir: &Path,
) -> PacketResult<Archive> {
    let files = collect(&descriptor.targets)?;
    let output = work_dir.join(descriptor.archive_name(format));
    archive::create(format, &files.files, &output)
}

/// Build the descriptor's archive and one per nested dependent.
///
/// Stops at the first failure; archives already written stay on disk.
pub fn build_all(
    descriptor: &PacketConfig,
    format: ArchiveFormat,
    work_dir: &Path,
) -> PacketResult<BuiltBundle> {
    let main = build_archive(descriptor, format, work_dir)?;
    let dependents = descriptor
        .dependents()
        .into_iter()
        .map(|dependent| build_archive(dependent, format, work_dir))
        .collect::<PacketResult<Vec<_>>>()?;

    info!(
        packet = %descriptor.name,
        version = %descriptor.version,
        archives = dependents.len() + 1,
        "bundle built"
    );
    Ok(BuiltBundle { main, dependents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSpec;
    use crate::error::PacketError;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(root: &Path) -> PacketConfig {
        let pattern = |p: &str| TargetSpec::new(format!("{}/{p}", root.display()));
        PacketConfig {
            name: "app".into(),
            version: "1.0.0".into(),
            targets: vec![pattern("app/*")],
            packets: vec![PacketConfig {
                name: "plugin".into(),
                version: "0.2.0".into(),
                targets: vec![pattern("plugin/*")],
                packets: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_build_all_writes_every_archive() {
        let dir = TempDir::new().unwrap();
        for rel in ["app/main.txt", "plugin/ext.txt"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel).unwrap();
        }

        let built = build_all(&descriptor(dir.path()), ArchiveFormat::TarGz, dir.path()).unwrap();
        assert_eq!(built.main.path, dir.path().join("app-1.0.0.tar.gz"));
        assert_eq!(built.dependents.len(), 1);
        assert_eq!(
            built.dependents[0].path,
            dir.path().join("plugin-0.2.0.tar.gz")
        );
        assert!(built.archives().all(|a| a.path.exists()));
    }

    #[test]
    fn test_build_all_fails_on_empty_dependent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/main.txt"), "x").unwrap();

        let err = build_all(&descriptor(dir.path()), ArchiveFormat::Zip, dir.path()).unwrap_err();
        assert!(matches!(err, PacketError::Collection { .. }));
        assert!(dir.path().join("app-1.0.0.zip").exists());
    }
}
