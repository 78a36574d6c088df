//! Error types for packet distribution.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

/// Transport operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Connect,
    Upload,
    Download,
    List,
    Close,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::List => "list",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Why an archive could not be created.
#[derive(Debug, thiserror::Error)]
pub enum CreationCause {
    /// No files were handed to the codec.
    #[error("file list is empty")]
    EmptyInput,

    /// File cannot be named relative to the archive's directory without `..`.
    #[error("{} is outside the archive root {}", file.display(), root.display())]
    OutsideRoot { file: PathBuf, root: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Packet errors.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// Bad glob syntax, unknown archive format, invalid config. Raised before any I/O.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Every target pattern together produced zero files.
    #[error("no files matched the {patterns} target pattern(s)")]
    Collection {
        patterns: usize,
        unmatched: Vec<String>,
    },

    /// Archive creation failed.
    #[error("failed to create archive {}", output.display())]
    Creation {
        output: PathBuf,
        files: Vec<PathBuf>,
        #[source]
        source: CreationCause,
    },

    /// Archive container could not be opened or parsed.
    #[error("failed to open archive {}", archive.display())]
    ArchiveOpen {
        archive: PathBuf,
        dest: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// An archive entry could not be written.
    #[error("failed to extract {entry} from {} into {}", archive.display(), dest.display())]
    Extraction {
        archive: PathBuf,
        dest: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote transfer failed.
    #[error("transport {operation} failed: {from} -> {to}")]
    Transport {
        operation: TransportOp,
        from: String,
        to: String,
        #[source]
        source: anyhow::Error,
    },

    /// Version or constraint could not be parsed.
    #[error("version check failed: {version:?} against {constraint:?}")]
    Version {
        version: String,
        constraint: String,
        #[source]
        source: Option<semver::Error>,
    },

    /// No remote archive satisfied the requested package and constraint.
    #[error("no remote archive for {name} satisfies {constraint:?}")]
    NotFound { name: String, constraint: String },

    /// Local filesystem error outside the archive codec.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline task panicked or was cancelled by the runtime.
    #[error("pipeline {pipeline} aborted: {reason}")]
    Aborted { pipeline: String, reason: String },

    /// One or more pipelines of a fan-out run failed.
    #[error(transparent)]
    Transfers(#[from] TransferFailures),
}

impl PacketError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn config_with(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn transport(
        operation: TransportOp,
        from: impl Into<String>,
        to: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Transport {
            operation,
            from: from.into(),
            to: to.into(),
            source: source.into(),
        }
    }

    pub(crate) fn version(
        version: impl Into<String>,
        constraint: impl Into<String>,
        source: Option<semver::Error>,
    ) -> Self {
        Self::Version {
            version: version.into(),
            constraint: constraint.into(),
            source,
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Collection { .. } => 1,
            Self::Creation { .. } | Self::ArchiveOpen { .. } | Self::Extraction { .. } => 2,
            Self::Io { .. } => 2,
            Self::Transport { .. } => 3,
            Self::Version { .. } | Self::NotFound { .. } => 4,
            Self::Aborted { .. } | Self::Transfers(_) => 5,
        }
    }

    /// Whether the error is fatal before any I/O happens.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_version(&self) -> bool {
        matches!(self, Self::Version { .. })
    }

    /// Returns the aggregate if this error came from a fan-out run.
    pub fn as_transfers(&self) -> Option<&TransferFailures> {
        match self {
            Self::Transfers(failures) => Some(failures),
            _ => None,
        }
    }
}

/// Aggregate failure of a fan-out run.
///
/// Holds every individual pipeline error, in completion order, along with the
/// number of pipelines that finished successfully.
#[derive(Debug, Default)]
pub struct TransferFailures {
    errors: Vec<PacketError>,
    succeeded: usize,
}

impl TransferFailures {
    pub fn new(errors: Vec<PacketError>, succeeded: usize) -> Self {
        Self { errors, succeeded }
    }

    /// Number of failed pipelines.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of pipelines that completed successfully.
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn errors(&self) -> &[PacketError] {
        &self.errors
    }

    pub fn iter(&self) -> impl Iterator<Item = &PacketError> {
        self.errors.iter()
    }

    pub fn into_errors(self) -> Vec<PacketError> {
        self.errors
    }
}

impl fmt::Display for TransferFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} pipeline(s) failed",
            self.errors.len(),
            self.errors.len() + self.succeeded
        )?;
        for err in &self.errors {
            write!(f, "\n  - {err}")?;
            let mut cause = StdError::source(err);
            while let Some(inner) = cause {
                write!(f, ": {inner}")?;
                cause = inner.source();
            }
        }
        Ok(())
    }
}

impl StdError for TransferFailures {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.errors
            .first()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

/// Result type for packet operations.
pub type PacketResult<T> = Result<T, PacketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_taxonomy() {
        assert_eq!(PacketError::config("bad glob").exit_code(), 1);
        assert_eq!(
            PacketError::NotFound {
                name: "app".into(),
                constraint: ">=1.0".into()
            }
            .exit_code(),
            4
        );
        let failures = TransferFailures::new(vec![PacketError::config("x")], 3);
        assert_eq!(PacketError::from(failures).exit_code(), 5);
    }

    #[test]
    fn test_creation_error_unwraps_to_root_cause() {
        let err = PacketError::Creation {
            output: PathBuf::from("out.zip"),
            files: vec![PathBuf::from("a.txt")],
            source: CreationCause::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )),
        };
        let cause = err.source().expect("creation error has a cause");
        assert_eq!(cause.to_string(), "denied");
    }

    #[test]
    fn test_transfer_failures_lists_every_error() {
        let failures = TransferFailures::new(
            vec![
                PacketError::NotFound {
                    name: "a".into(),
                    constraint: String::new(),
                },
                PacketError::transport(
                    TransportOp::Upload,
                    "b.zip",
                    "remote/b.zip",
                    anyhow::anyhow!("connection reset"),
                ),
            ],
            8,
        );
        assert_eq!(failures.len(), 2);
        assert_eq!(failures.succeeded(), 8);

        let rendered = failures.to_string();
        assert!(rendered.starts_with("2 of 10 pipeline(s) failed"));
        assert!(rendered.contains("no remote archive for a"));
        assert!(rendered.contains("connection reset"));
    }
}
