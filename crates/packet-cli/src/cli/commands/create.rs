use std::sync::Arc;

use anyhow::Context;
use packet_core::{bundle, ArchiveFormat, ObjectStoreTransport, Orchestrator, PacketConfig};
use tracing::info;

use crate::cli::args::CreateArgs;
use crate::exit_codes;

pub async fn run(args: CreateArgs) -> anyhow::Result<i32> {
    let format = ArchiveFormat::from(args.format);
    let descriptor = PacketConfig::load(&args.config)?;
    let work_dir = std::env::current_dir().context("cannot determine working directory")?;
    info!(
        config = %args.config.display(),
        packet = %descriptor.name,
        version = %descriptor.version,
        format = %format,
        "create"
    );

    if args.no_upload {
        let built = tokio::task::spawn_blocking(move || {
            bundle::build_all(&descriptor, format, &work_dir)
        })
        .await??;
        for archive in built.archives() {
            println!("created {}", archive.path.display());
        }
        return Ok(exit_codes::SUCCESS);
    }

    let remote = args.remote.to_config()?;
    let transport = ObjectStoreTransport::connect(&remote)?;
    let orchestrator = Orchestrator::new(Arc::new(transport), remote.dir.clone());

    let result = orchestrator
        .publish_bundle(&descriptor, format, &work_dir)
        .await;
    orchestrator.transport().close().await?;
    let report = result?;

    println!("published {}", report.main.remote);
    for dependent in &report.dependents {
        println!("published {}", dependent.remote);
    }
    Ok(exit_codes::SUCCESS)
}
