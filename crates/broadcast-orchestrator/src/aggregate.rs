use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{BroadcastError, SiteFailure};
use crate::model::BroadcastReport;

/// Overall verdict of a broadcast that did not fail outright.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchSummary {
    AllSucceeded {
        total: usize,
    },
    /// Some sites received the message. Logged as a warning, never raised.
    Partial {
        total: usize,
        succeeded: usize,
        failures: Vec<SiteFailure>,
    },
}

impl BatchSummary {
    pub fn failures(&self) -> &[SiteFailure] {
        match self {
            BatchSummary::AllSucceeded { .. } => &[],
            BatchSummary::Partial { failures, .. } => failures,
        }
    }
}

/// Fold a report into a verdict. Only a batch where every site failed is an error.
pub fn summarize(report: &BroadcastReport) -> Result<BatchSummary, BroadcastError> {
    let failures = failures(report);
    let total = report.total();
    if total == 0 {
        return Err(BroadcastError::NoSites);
    }
    if failures.len() == total {
        return Err(BroadcastError::TotalBatchFailure { total, failures });
    }
    if failures.is_empty() {
        info!(target: "broadcast", total, "message delivered to every site");
        return Ok(BatchSummary::AllSucceeded { total });
    }
    let succeeded = total - failures.len();
    warn!(
        target: "broadcast",
        total,
        succeeded,
        failed = failures.len(),
        sites = %failures.iter().map(|f| f.site.as_str()).collect::<Vec<_>>().join(","),
        "partial batch failure"
    );
    Ok(BatchSummary::Partial {
        total,
        succeeded,
        failures,
    })
}

fn failures(report: &BroadcastReport) -> Vec<SiteFailure> {
    let unresolved = report.unresolved.iter().map(|site| SiteFailure {
        site: site.site_id.clone(),
        tab: None,
        error: site.error.clone(),
    });
    let failed = report
        .results
        .iter()
        .filter(|entry| !entry.result.success)
        .map(|entry| SiteFailure {
            site: entry.site_id.clone(),
            tab: Some(entry.tab_id),
            error: entry
                .result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    unresolved.chain(failed).collect()
}
