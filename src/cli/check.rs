use anyhow::{bail, Result};
use broadcast_orchestrator::{BroadcastError, SiteReadiness};
use clap::Args;

use super::context::CliContext;
use super::output::print_json;
use super::send::site_ids;

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Only check these site ids (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub sites: Vec<String>,
}

pub async fn cmd_check(args: CheckArgs, ctx: &CliContext) -> Result<()> {
    let subset = site_ids(&args.sites);
    let subset = (!subset.is_empty()).then_some(subset.as_slice());
    if ctx.registry()?.eligible_sites(subset)?.is_empty() {
        bail!(BroadcastError::NoSites);
    }

    let broadcaster = ctx.broadcaster(ctx.config().batch.clone()).await?;
    let report = broadcaster.check(subset).await?;
    if ctx.output().is_json() {
        return print_json(&report);
    }
    for entry in &report {
        println!("{}", describe(entry));
    }
    let ready = report.iter().filter(|entry| entry.readiness.ready).count();
    println!("{ready} of {} sites ready.", report.len());
    Ok(())
}

fn describe(entry: &SiteReadiness) -> String {
    let readiness = &entry.readiness;
    let tab = entry
        .tab_id
        .map(|tab| tab.to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = if readiness.ready { "[ready]" } else { "[not ready]" };
    let mut line = format!("{status:<11} {:<12} {tab:<7}", entry.site_id.as_str());
    if let Some(details) = &readiness.details {
        if let Some(selector) = &details.selector {
            line.push_str(&format!(" input {selector}"));
        }
        line.push_str(&format!(" ({})", details.page.url));
    }
    if let Some(reason) = &readiness.reason {
        line.push_str(&format!(" {reason}"));
    }
    line
}
