use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use broadcast_orchestrator::{BatchSummary, BroadcastError, Delivery, SiteFailure};
use chrono::Utc;
use clap::Args;
use page_injector::{Injector, PageInjector, SubmissionMethod};
use promptcast_core_types::SiteId;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::context::CliContext;
use super::output::print_json;

#[derive(Args, Clone, Debug)]
pub struct SendArgs {
    /// Prompt text; read from stdin when omitted
    pub message: Option<String>,

    /// Read the prompt from a file
    #[arg(short, long, value_name = "FILE", conflicts_with = "message")]
    pub file: Option<PathBuf>,

    /// Only send to these site ids (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub sites: Vec<String>,

    /// Attempts per tab, overriding `batch.max_retries`
    #[arg(long)]
    pub retries: Option<u32>,

    /// Do not record the prompt in history
    #[arg(long)]
    pub no_history: bool,
}

pub async fn cmd_send(args: SendArgs, ctx: &CliContext) -> Result<()> {
    let message = read_message(&args).await?;
    PageInjector::new(ctx.config().injection.clone()).validate_message(&message)?;

    let subset = site_ids(&args.sites);
    let subset = (!subset.is_empty()).then_some(subset.as_slice());
    let eligible = ctx.registry()?.eligible_sites(subset)?;
    if eligible.is_empty() {
        bail!(BroadcastError::NoSites);
    }

    let mut policy = ctx.config().batch.clone();
    if let Some(retries) = args.retries {
        policy.max_retries = retries;
    }
    let broadcaster = ctx.broadcaster(policy).await?;
    let outcome = broadcaster.send(&message, subset).await;

    if !args.no_history && sent_anything(&outcome) {
        let mut history = ctx.history().await?;
        let sites = eligible.into_iter().map(|site| site.id).collect();
        history.record(&message, sites, Utc::now());
        if let Err(err) = history.save().await {
            warn!(target: "history", "could not save history: {err:#}");
        }
    }

    match outcome {
        Ok(delivery) => {
            if ctx.output().is_json() {
                print_json(&delivery)
            } else {
                print_delivery(&delivery);
                Ok(())
            }
        }
        Err(BroadcastError::TotalBatchFailure { total, failures }) => {
            if ctx.output().is_json() {
                print_json(&json!({ "status": "failed", "total": total, "failures": failures }))?;
            } else {
                for failure in &failures {
                    print_failure(failure);
                }
            }
            bail!("the message did not reach any of {total} sites")
        }
        Err(err) => Err(err.into()),
    }
}

fn sent_anything(outcome: &Result<Delivery, BroadcastError>) -> bool {
    matches!(
        outcome,
        Ok(_) | Err(BroadcastError::TotalBatchFailure { .. })
    )
}

async fn read_message(args: &SendArgs) -> Result<String> {
    if let Some(message) = &args.message {
        return Ok(message.clone());
    }
    if let Some(path) = &args.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buffer = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buffer)
        .await
        .context("reading the prompt from stdin")?;
    Ok(buffer)
}

pub(crate) fn site_ids(raw: &[String]) -> Vec<SiteId> {
    raw.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(SiteId::from)
        .collect()
}

fn print_delivery(delivery: &Delivery) {
    for entry in &delivery.report.results {
        let result = &entry.result;
        if result.success {
            let how = match result.details.submission {
                Some(SubmissionMethod::Click) => "clicked send",
                Some(SubmissionMethod::EnterKey) => "pressed enter",
                None => "not submitted",
            };
            println!(
                "[ok]     {:<12} {:<7} {} (attempt {}, {}ms)",
                entry.site_id.as_str(),
                entry.tab_id.to_string(),
                how,
                result.details.attempt,
                result.details.timing.total_ms
            );
        }
    }
    for failure in delivery.summary.failures() {
        print_failure(failure);
    }
    match &delivery.summary {
        BatchSummary::AllSucceeded { total } => println!("Delivered to all {total} sites."),
        BatchSummary::Partial {
            total, succeeded, ..
        } => println!("Delivered to {succeeded} of {total} sites."),
    }
}

fn print_failure(failure: &SiteFailure) {
    let tab = failure
        .tab
        .map(|tab| tab.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("[failed] {:<12} {:<7} {}", failure.site.as_str(), tab, failure.error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_ids_ignore_blanks() {
        let ids = site_ids(&["claude".into(), " ".into(), " grok ".into()]);
        assert_eq!(ids, vec![SiteId::new("claude"), SiteId::new("grok")]);
    }

    #[test]
    fn only_hard_errors_skip_history() {
        assert!(!sent_anything(&Err(BroadcastError::NoSites)));
        assert!(sent_anything(&Err(BroadcastError::TotalBatchFailure {
            total: 1,
            failures: Vec::new(),
        })));
    }
}
