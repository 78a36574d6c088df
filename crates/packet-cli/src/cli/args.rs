use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use packet_core::{ArchiveFormat, RemoteConfig};

#[derive(Parser, Debug)]
#[command(
    name = "packet",
    version,
    about = "Build, publish and install versioned file bundles"
)]
pub struct Cli {
    /// Minimum severity to log (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive a packet and its dependents, then upload them
    ///
    /// Archives are written to the working directory and every collected file
    /// must live under it: entries are named relative to that directory, so
    /// targets such as ../shared/* are rejected.
    Create(CreateArgs),
    /// Install the packages listed in a request file
    Update(UpdateArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Zip,
    #[value(name = "tar.gz")]
    TarGz,
    Tgz,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Zip => ArchiveFormat::Zip,
            FormatArg::TarGz => ArchiveFormat::TarGz,
            FormatArg::Tgz => ArchiveFormat::Tgz,
        }
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Packet descriptor (JSON, or YAML by .yaml/.yml extension)
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Zip)]
    pub format: FormatArg,

    /// Build archives in the working directory without uploading
    #[arg(long)]
    pub no_upload: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Package request list (JSON, or YAML by .yaml/.yml extension)
    pub config: PathBuf,

    /// Root directory; each package is extracted into <dest>/<name>
    #[arg(long, default_value = ".")]
    pub dest: PathBuf,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Remote store URL: file:///path, memory:// or s3://bucket[/prefix]
    #[arg(long, env = "PACKET_REMOTE")]
    pub remote: Option<String>,

    /// Directory inside the remote store holding the archives
    #[arg(long, env = "PACKET_REMOTE_DIR", default_value = "")]
    pub remote_dir: String,

    #[arg(long, env = "PACKET_REMOTE_REGION")]
    pub region: Option<String>,

    /// Custom S3 endpoint (MinIO, R2, ...)
    #[arg(long, env = "PACKET_REMOTE_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, env = "PACKET_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "PACKET_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,
}

impl RemoteArgs {
    pub fn to_config(&self) -> anyhow::Result<RemoteConfig> {
        let url = self
            .remote
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no remote store given (use --remote or PACKET_REMOTE)"))?;

        Ok(RemoteConfig {
            url: url.to_string(),
            dir: self.remote_dir.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        })
    }
}
