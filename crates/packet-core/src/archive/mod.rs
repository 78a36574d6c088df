//! Archive codec: file set ↔ on-disk bundle.
//!
//! Two interchangeable formats are supported:
//!
//! - `zip`: random-access container, deflate per entry
//! - `tar.gz` / `tgz`: tar stream with trailing gzip compression
//!
//! Entry names are always relative to the directory that contains the
//! archive itself, with POSIX separators, so both formats extract to the
//! same tree. Extraction is not transactional: a failure part-way through
//! leaves whatever was already written in place.

mod tar_codec;
mod zip_codec;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{CreationCause, PacketError, PacketResult};

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Same container as `TarGz`, different file extension.
    #[serde(rename = "tgz")]
    Tgz,
}

impl ArchiveFormat {
    /// Suffix checks run in this order so `.tar.gz` wins over shorter matches.
    pub const ALL: [ArchiveFormat; 3] = [Self::TarGz, Self::Tgz, Self::Zip];

    /// Format identifier as accepted by [`FromStr`].
    pub fn id(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::Tgz => "tgz",
        }
    }

    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
            Self::Tgz => ".tgz",
        }
    }

    /// Detect the format from a file name suffix.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::split_file_name(file_name).map(|(_, format)| format)
    }

    /// Split `file_name` into its stem and format, stripping exactly one suffix.
    pub fn split_file_name(file_name: &str) -> Option<(&str, Self)> {
        Self::ALL.iter().find_map(|format| {
            file_name
                .strip_suffix(format.extension())
                .map(|stem| (stem, *format))
        })
    }

    fn is_tar(self) -> bool {
        matches!(self, Self::TarGz | Self::Tgz)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ArchiveFormat {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match id.as_str() {
            "zip" => Ok(Self::Zip),
            "tar.gz" => Ok(Self::TarGz),
            "tgz" => Ok(Self::Tgz),
            _ => Err(PacketError::config(format!(
                "unknown archive format '{s}' (expected zip, tar.gz or tgz)"
            ))),
        }
    }
}

/// Archive file name for a packet: `<name>-<version><ext>`.
pub fn archive_file_name(name: &str, version: &str, format: ArchiveFormat) -> String {
    format!("{name}-{version}{}", format.extension())
}

/// A created archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub format: ArchiveFormat,
    /// Number of entries written, duplicates included.
    pub entries: usize,
}

/// Source file paired with its entry name inside the archive.
#[derive(Debug, Clone)]
pub(crate) struct EntrySource {
    pub source: PathBuf,
    pub name: String,
}

/// Create an archive at `output` holding `files`.
///
/// Fails with [`CreationCause::EmptyInput`] rather than writing an empty
/// archive. On failure the partially written output is removed.
pub fn create(format: ArchiveFormat, files: &[PathBuf], output: &Path) -> PacketResult<Archive> {
    info!(
        output = %output.display(),
        format = %format,
        files = files.len(),
        "creating archive"
    );

    let fail = |source: CreationCause| {
        error!(output = %output.display(), error = %source, "archive creation failed");
        PacketError::Creation {
            output: output.to_path_buf(),
            files: files.to_vec(),
            source,
        }
    };

    if files.is_empty() {
        return Err(fail(CreationCause::EmptyInput));
    }

    let entries = relativize(files, output).map_err(fail)?;
    let written = if format.is_tar() {
        tar_codec::write(output, &entries)
    } else {
        zip_codec::write(output, &entries)
    };

    if let Err(cause) = written {
        let _ = fs::remove_file(output);
        return Err(fail(cause));
    }

    info!(
        output = %output.display(),
        entries = entries.len(),
        "archive created"
    );
    Ok(Archive {
        path: output.to_path_buf(),
        format,
        entries: entries.len(),
    })
}

/// Extract `archive` into `dest`, detecting the format from its file name.
///
/// An unrecognized suffix is a configuration error raised before the file is
/// opened. Returns the number of entries processed.
pub fn extract(archive: &Path, dest: &Path) -> PacketResult<usize> {
    let file_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = ArchiveFormat::from_file_name(&file_name).ok_or_else(|| {
        PacketError::config(format!(
            "cannot determine archive format of {}",
            archive.display()
        ))
    })?;
    extract_as(format, archive, dest)
}

/// Extract `archive` into `dest` using an explicit format.
pub fn extract_as(format: ArchiveFormat, archive: &Path, dest: &Path) -> PacketResult<usize> {
    info!(
        archive = %archive.display(),
        dest = %dest.display(),
        format = %format,
        "extracting archive"
    );

    let result = if format.is_tar() {
        tar_codec::extract(archive, dest)
    } else {
        zip_codec::extract(archive, dest)
    };

    match &result {
        Ok(count) => info!(
            archive = %archive.display(),
            dest = %dest.display(),
            entries = count,
            "archive extracted"
        ),
        Err(e) => error!(archive = %archive.display(), error = %e, "archive extraction failed"),
    }
    result
}

/// Name every file relative to the directory containing `output`.
fn relativize(files: &[PathBuf], output: &Path) -> Result<Vec<EntrySource>, CreationCause> {
    let root = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let root = lexical_absolute(root)?;

    files
        .iter()
        .map(|file| {
            let absolute = lexical_absolute(file)?;
            let relative =
                absolute
                    .strip_prefix(&root)
                    .map_err(|_| CreationCause::OutsideRoot {
                        file: file.clone(),
                        root: root.clone(),
                    })?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.is_empty() {
                return Err(CreationCause::OutsideRoot {
                    file: file.clone(),
                    root: root.clone(),
                });
            }
            debug!(file = %file.display(), entry = %name, "archive entry");
            Ok(EntrySource {
                source: file.clone(),
                name,
            })
        })
        .collect()
}

/// Absolute path with `.` and `..` folded without touching the filesystem.
fn lexical_absolute(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }
    Ok(folded)
}

/// Join an archive entry name onto `dest`, refusing absolute names and `..`.
pub(crate) fn safe_join(dest: &Path, entry: &str) -> io::Result<PathBuf> {
    let normalized = entry.replace('\\', "/");
    if normalized.starts_with('/') || normalized.contains(':') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("absolute entry name {entry:?}"),
        ));
    }

    let mut target = dest.to_path_buf();
    let mut depth = 0usize;
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("entry {entry:?} escapes the destination"),
                ))
            }
            part => {
                target.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("empty entry name {entry:?}"),
        ));
    }
    Ok(target)
}

/// Write one regular file, creating parents and applying the stored mode.
pub(crate) fn write_file<R: Read>(target: &Path, reader: &mut R, mode: Option<u32>) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(reader, &mut out)?;
    apply_mode(target, mode)
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Permission bits of a source file.
#[cfg(unix)]
pub(crate) fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(crate) fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
