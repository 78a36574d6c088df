//! Versioned file bundles: build, publish and resolve.
//!
//! A packet is a named, versioned set of files plus optional nested
//! dependents. Publishing collects each packet's files, writes a
//! `<name>-<version>` archive and uploads it to a remote store. Resolving
//! scans that store, picks one archive per requested package and extracts
//! it locally. Both directions run one pipeline per package under a fixed
//! concurrency cap.

pub mod archive;
pub mod bundle;
pub mod collect;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod transport;
pub mod version;

pub use archive::{archive_file_name, Archive, ArchiveFormat};
pub use bundle::{build_all, build_archive, BuiltBundle};
pub use collect::{collect, FileSet};
pub use config::{PackageRequest, PackagesConfig, PacketConfig, RemoteConfig, TargetSpec};
pub use error::{CreationCause, PacketError, PacketResult, TransferFailures, TransportOp};
pub use orchestrator::{
    Installed, Orchestrator, PublishReport, Published, MAX_CONCURRENT_TRANSFERS,
};
pub use transport::{
    remote_join, ObjectStoreTransport, RemoteEntry, SerializedTransport, Transport,
};
pub use version::{extract_version, matches, parse_version, Constraint, VersionedName};

/// Parse and validate a constraint expression without checking any version.
pub fn parse_constraint(expr: &str) -> PacketResult<Constraint> {
    Constraint::parse(expr)
}
