use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};
use crate::metrics;

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;
    if cli.metrics {
        metrics::register_metrics();
    }
    info!("Starting promptcast v{}", env!("CARGO_PKG_VERSION"));
    debug!(build = env!("BUILD_DATE"), git = env!("GIT_HASH"), "build info");

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let ctx = CliContext::new(config, path, cli.output);

    let outcome = dispatch(cli.command, &ctx).await;
    ctx.shutdown().await;
    if cli.metrics {
        eprint!("{}", metrics::render());
    }

    match outcome {
        Ok(()) => {
            debug!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
