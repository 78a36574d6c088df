use std::sync::Arc;

use packet_core::{ObjectStoreTransport, Orchestrator, PackagesConfig};
use tracing::info;

use crate::cli::args::UpdateArgs;
use crate::exit_codes;

pub async fn run(args: UpdateArgs) -> anyhow::Result<i32> {
    let packages = PackagesConfig::load(&args.config)?;
    let remote = args.remote.to_config()?;
    info!(
        config = %args.config.display(),
        packages = packages.packages.len(),
        dest = %args.dest.display(),
        "update"
    );

    let transport = ObjectStoreTransport::connect(&remote)?;
    let orchestrator = Orchestrator::new(Arc::new(transport), remote.dir.clone());

    let result = orchestrator.resolve(&packages.packages, &args.dest).await;
    orchestrator.transport().close().await?;
    let installed = result?;

    for package in &installed {
        println!(
            "installed {} {} -> {}",
            package.name,
            package.version,
            package.dest.display()
        );
    }
    Ok(exit_codes::SUCCESS)
}
