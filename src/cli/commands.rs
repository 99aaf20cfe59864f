use clap::Subcommand;

use super::check::CheckArgs;
use super::config::ConfigArgs;
use super::history::HistoryArgs;
use super::send::SendArgs;
use super::sites::SitesArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Send one prompt to every enabled chat site
    Send(SendArgs),

    /// Report whether each site's tab is ready to receive a prompt
    Check(CheckArgs),

    /// List, enable, disable or reorder sites
    Sites(SitesArgs),

    /// Show or clear previously sent prompts
    History(HistoryArgs),

    /// Inspect or reset the configuration file
    Config(ConfigArgs),
}
