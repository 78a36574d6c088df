//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::cli::args::{LogFormat, LogLevel};

/// Install the global subscriber. Events go to stderr; `RUST_LOG` overrides `level`.
pub fn init(level: LogLevel, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("warning: logging already initialized: {e}");
    }
}
