use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{file_mode, safe_join, write_file, EntrySource};
use crate::error::{CreationCause, PacketError, PacketResult};

pub(super) fn write(output: &Path, entries: &[EntrySource]) -> Result<(), CreationCause> {
    let file = File::create(output)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for entry in entries {
        let meta = fs::metadata(&entry.source)?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&meta));
        let mut source = File::open(&entry.source)?;
        zip.start_file(entry.name.as_str(), options)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?.flush()?;
    Ok(())
}

pub(super) fn extract(archive: &Path, dest: &Path) -> PacketResult<usize> {
    let open_err = |source: anyhow::Error| PacketError::ArchiveOpen {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(|e| open_err(e.into()))?;
    let mut zip = ZipArchive::new(file).map_err(|e| open_err(e.into()))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| open_err(e.into()))?;
        let name = entry.name().to_string();
        let extract_err = |source: io::Error| PacketError::Extraction {
            archive: archive.to_path_buf(),
            dest: dest.to_path_buf(),
            entry: name.clone(),
            source,
        };

        let target = safe_join(dest, &name).map_err(extract_err)?;
        if entry.is_dir() {
            debug!(entry = %name, "creating directory");
            fs::create_dir_all(&target).map_err(extract_err)?;
            continue;
        }

        debug!(entry = %name, target = %target.display(), "writing file");
        let mode = entry.unix_mode();
        write_file(&target, &mut entry, mode).map_err(extract_err)?;
    }

    Ok(zip.len())
}
