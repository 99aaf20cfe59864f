use anyhow::Result;

use super::check::cmd_check;
use super::commands::Commands;
use super::config::cmd_config;
use super::context::CliContext;
use super::history::cmd_history;
use super::send::cmd_send;
use super::sites::cmd_sites;

pub async fn dispatch(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Send(args) => cmd_send(args, ctx).await,
        Commands::Check(args) => cmd_check(args, ctx).await,
        Commands::Sites(args) => cmd_sites(args, ctx).await,
        Commands::History(args) => cmd_history(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
