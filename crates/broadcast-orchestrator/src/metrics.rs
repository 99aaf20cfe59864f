use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref INJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "promptcast_injections_total",
            "Terminal injection outcomes per site"
        ),
        &["site", "outcome"]
    )
    .unwrap();
    static ref INJECTION_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "promptcast_injection_attempts_total",
            "Injection attempts per site, retries included"
        ),
        &["site"]
    )
    .unwrap();
    static ref BATCHES_TOTAL: IntCounter =
        IntCounter::new("promptcast_batches_total", "Broadcast batches executed").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register broadcast metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, INJECTIONS_TOTAL.clone());
    register(registry, INJECTION_ATTEMPTS_TOTAL.clone());
    register(registry, BATCHES_TOTAL.clone());
}

pub fn record_batch() {
    BATCHES_TOTAL.inc();
}

pub fn record_attempt(site: &str) {
    INJECTION_ATTEMPTS_TOTAL.with_label_values(&[site]).inc();
}

pub fn record_outcome(site: &str, success: bool) {
    if success {
        INJECTIONS_TOTAL.with_label_values(&[site, "success"]).inc();
    } else {
        INJECTIONS_TOTAL.with_label_values(&[site, "failure"]).inc();
    }
}

pub fn record_unresolved(site: &str) {
    INJECTIONS_TOTAL.with_label_values(&[site, "no_tab"]).inc();
}
