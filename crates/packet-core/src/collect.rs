//! Target pattern expansion.
//!
//! Turns a list of [`TargetSpec`]s into the ordered file list handed to the
//! archive codec. Patterns are expanded independently and in input order; a
//! file matched by two patterns is listed twice.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::TargetSpec;
use crate::error::{PacketError, PacketResult};

/// Result of a collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    /// Matched regular files, first-seen order, duplicates kept.
    pub files: Vec<PathBuf>,
    /// Patterns that matched nothing.
    pub unmatched: Vec<String>,
}

impl FileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Expand every target into a file list.
///
/// An unmatched pattern is only a warning. Errors are an invalid pattern or
/// exclude glob ([`PacketError::Config`]) and an overall empty result
/// ([`PacketError::Collection`]).
pub fn collect(targets: &[TargetSpec]) -> PacketResult<FileSet> {
    let mut set = FileSet::default();

    for target in targets {
        let exclude = target
            .exclude
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(compile_exclude)
            .transpose()?;

        let matches = expand(&target.path)?;
        if matches.is_empty() {
            warn!(pattern = %target.path, "pattern matched no files");
            set.unmatched.push(target.path.clone());
            continue;
        }

        for path in matches {
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat match, skipping");
                    continue;
                }
            };
            if meta.is_dir() {
                continue;
            }
            if let Some(exclude) = &exclude {
                let excluded = path
                    .file_name()
                    .map(|name| exclude.is_match(name))
                    .unwrap_or(false);
                if excluded {
                    debug!(path = %path.display(), "excluded");
                    continue;
                }
            }
            set.files.push(path);
        }
    }

    if !set.unmatched.is_empty() {
        warn!(
            patterns = ?set.unmatched,
            "{} of {} pattern(s) matched no files",
            set.unmatched.len(),
            targets.len()
        );
    }

    if set.files.is_empty() {
        error!(patterns = targets.len(), "no files collected");
        return Err(PacketError::Collection {
            patterns: targets.len(),
            unmatched: set.unmatched,
        });
    }

    info!(files = set.files.len(), patterns = targets.len(), "files collected");
    Ok(set)
}

fn compile_exclude(glob: &str) -> PacketResult<GlobMatcher> {
    Glob::new(glob)
        .map(|g| g.compile_matcher())
        .map_err(|e| PacketError::config_with(format!("invalid exclude glob '{glob}'"), e))
}

fn has_meta(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}

/// Expand one pattern into matching paths in lexical order.
fn expand(pattern: &str) -> PacketResult<Vec<PathBuf>> {
    if pattern.is_empty() {
        return Err(PacketError::config("empty target pattern"));
    }

    let parts: Vec<&str> = pattern.split('/').collect();
    let Some(first_meta) = parts.iter().position(|p| has_meta(p)) else {
        let literal = PathBuf::from(pattern);
        return Ok(if fs::symlink_metadata(&literal).is_ok() {
            vec![literal]
        } else {
            Vec::new()
        });
    };

    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| PacketError::config_with(format!("invalid glob pattern '{pattern}'"), e))?
        .compile_matcher();

    let prefix = parts[..first_meta].join("/");
    let (base, implicit_base) = match prefix.as_str() {
        "" if pattern.starts_with('/') => (PathBuf::from("/"), false),
        "" => (PathBuf::from("."), true),
        other => (PathBuf::from(other), false),
    };
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&base).min_depth(1).follow_links(true);
    if !parts[first_meta..].iter().any(|p| p.contains("**")) {
        walker = walker.max_depth(parts.len() - first_meta);
    }

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(pattern, error = %e, "skipping unreadable path");
                continue;
            }
        };
        let path = if implicit_base {
            entry
                .path()
                .strip_prefix(".")
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf())
        } else {
            entry.path().to_path_buf()
        };
        if matcher.is_match(&path) {
            found.push(path);
        }
    }

    found.sort();
    debug!(pattern, matches = found.len(), "pattern expanded");
    Ok(found)
}
