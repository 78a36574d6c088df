use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tar::{EntryType, Header};
use tracing::{debug, warn};

use super::{file_mode, safe_join, write_file, EntrySource};
use crate::error::{CreationCause, PacketError, PacketResult};

/// Write a gzip-compressed tar with fixed mtime and ownership.
pub(super) fn write(output: &Path, entries: &[EntrySource]) -> Result<(), CreationCause> {
    let file = File::create(output)?;
    let encoder = GzBuilder::new()
        .mtime(0)
        .write(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let meta = fs::metadata(&entry.source)?;
        let mut header = Header::new_gnu();
        header.set_size(meta.len());
        header.set_mode(file_mode(&meta));
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_entry_type(EntryType::Regular);

        let source = File::open(&entry.source)?;
        builder.append_data(&mut header, &entry.name, source)?;
    }

    builder.into_inner()?.finish()?.flush()?;
    Ok(())
}

pub(super) fn extract(archive: &Path, dest: &Path) -> PacketResult<usize> {
    let open_err = |source: anyhow::Error| PacketError::ArchiveOpen {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(|e| open_err(e.into()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let entries = tar.entries().map_err(|e| open_err(e.into()))?;

    let mut count = 0usize;
    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            // A broken stream before any entry means the container itself is unreadable.
            Err(e) if count == 0 => return Err(open_err(e.into())),
            Err(e) => {
                return Err(PacketError::Extraction {
                    archive: archive.to_path_buf(),
                    dest: dest.to_path_buf(),
                    entry: format!("#{count}"),
                    source: e,
                })
            }
        };
        count += 1;

        let name = entry
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extract_err = |source: io::Error| PacketError::Extraction {
            archive: archive.to_path_buf(),
            dest: dest.to_path_buf(),
            entry: name.clone(),
            source,
        };

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            let target = safe_join(dest, &name).map_err(extract_err)?;
            debug!(entry = %name, "creating directory");
            fs::create_dir_all(&target).map_err(extract_err)?;
            continue;
        }
        if !kind.is_file() {
            warn!(entry = %name, kind = ?kind, "skipping non-regular tar entry");
            continue;
        }

        let target = safe_join(dest, &name).map_err(extract_err)?;
        let mode = entry.header().mode().ok();
        debug!(entry = %name, target = %target.display(), "writing file");
        write_file(&target, &mut entry, mode).map_err(extract_err)?;
    }

    Ok(count)
}
