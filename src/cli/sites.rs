use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use promptcast_sites::{SiteConfig, SiteRegistry};
use serde_json::json;

use super::context::CliContext;
use super::output::{print_json, OutputFormat};
use super::send::site_ids;

#[derive(Args, Clone, Debug)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub action: SitesAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SitesAction {
    /// List every known site in send order
    List,

    /// Include sites in broadcasts
    Enable {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Exclude sites from broadcasts
    Disable {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Move the given sites to the front, in this order
    Order {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
}

pub async fn cmd_sites(args: SitesArgs, ctx: &CliContext) -> Result<()> {
    let registry = ctx.registry()?;
    match args.action {
        SitesAction::List => {}
        SitesAction::Enable { ids } => set_enabled(&registry, &ids, true)?,
        SitesAction::Disable { ids } => set_enabled(&registry, &ids, false)?,
        SitesAction::Order { ids } => {
            let ids = site_ids(&ids);
            if ids.is_empty() {
                bail!("no site ids given");
            }
            registry.set_order(&ids)?;
        }
    }
    list(&registry, ctx.output())
}

fn set_enabled(registry: &SiteRegistry, raw: &[String], enabled: bool) -> Result<()> {
    for id in site_ids(raw) {
        registry.set_enabled(&id, enabled)?;
    }
    Ok(())
}

fn list(registry: &SiteRegistry, output: OutputFormat) -> Result<()> {
    let sites = registry.all_sites()?;
    if output.is_json() {
        let entries: Vec<_> = sites.iter().map(site_json).collect();
        return print_json(&entries);
    }
    for (index, site) in sites.iter().enumerate() {
        let mark = if site.enabled { "x" } else { " " };
        println!(
            "{:>2}. [{mark}] {:<12} {:<12} {}",
            index + 1,
            site.id.as_str(),
            site.name,
            site.url
        );
    }
    Ok(())
}

fn site_json(site: &SiteConfig) -> serde_json::Value {
    json!({
        "id": site.id,
        "name": site.name,
        "url": site.url,
        "color": site.color,
        "enabled": site.enabled,
    })
}
