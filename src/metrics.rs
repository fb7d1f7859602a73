// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the glbc controller.
//!
//! All metrics carry the `glbc_kuadrant_dev_` prefix (prometheus-safe version of
//! "glbc.kuadrant.dev") and are served as text on `/metrics`.
//!
//! | Metric | Labels |
//! |---|---|
//! | `reconciliations_total` | `controller`, `status` (`success`, `error`, `requeue`) |
//! | `reconciliation_duration_seconds` | `controller` |
//! | `requeues_total` | `controller`, `reason` |
//! | `dropped_keys_total` | `controller` |
//! | `dns_provider_calls_total` | `operation` (`ensure`, `delete`), `status` |
//! | `active_host_watches` | |
//! | `host_address_changes_total` | `kind` (`addresses`, `ttl`) |
//!
//! ```rust,no_run
//! use glbc::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("ingress", std::time::Duration::from_millis(12));
//! ```

use prometheus::core::Collector;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

const METRICS_NAMESPACE: &str = "glbc_kuadrant_dev";

const DURATION_BUCKETS: &[f64] = &[0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Registry every glbc metric is registered in.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Panics on a malformed or duplicate metric definition.
#[allow(clippy::expect_used)]
fn registered<C: Collector + Clone + 'static>(collector: prometheus::Result<C>) -> C {
    let collector = collector.expect("valid metric definition");
    METRICS_REGISTRY
        .register(Box::new(collector.clone()))
        .expect("metric registered once");
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    registered(CounterVec::new(
        Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help),
        labels,
    ))
}

pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Total number of reconciliations by controller and status",
        &["controller", "status"],
    )
});

pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    registered(HistogramVec::new(
        HistogramOpts::new(
            format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
            "Duration of reconciliations in seconds by controller",
        )
        .buckets(DURATION_BUCKETS.to_vec()),
        &["controller"],
    ))
});

pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "requeues_total",
        "Total number of requeue operations by controller and reason",
        &["controller", "reason"],
    )
});

/// Keys dropped after exhausting their retries.
pub static DROPPED_KEYS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dropped_keys_total",
        "Total number of keys dropped after exhausting their retries",
        &["controller"],
    )
});

pub static DNS_PROVIDER_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dns_provider_calls_total",
        "Total number of DNS provider calls by operation and status",
        &["operation", "status"],
    )
});

/// (key, host) pairs currently polled by the hosts watcher.
pub static ACTIVE_HOST_WATCHES: LazyLock<Gauge> = LazyLock::new(|| {
    registered(Gauge::new(
        format!("{METRICS_NAMESPACE}_active_host_watches"),
        "Number of (key, host) pairs currently being polled",
    ))
});

pub static HOST_ADDRESS_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "host_address_changes_total",
        "Total number of resolved address changes that triggered a reconciliation",
        &["kind"],
    )
});

fn record_reconciliation(controller: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[controller, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[controller])
        .observe(duration.as_secs_f64());
}

pub fn record_reconciliation_success(controller: &str, duration: Duration) {
    record_reconciliation(controller, "success", duration);
}

pub fn record_reconciliation_error(controller: &str, duration: Duration) {
    record_reconciliation(controller, "error", duration);
}

/// Count a requeue of `controller` for `reason` (`error`, `conflict`, ...).
pub fn record_reconciliation_requeue(controller: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[controller, "requeue"])
        .inc();
    REQUEUE_TOTAL.with_label_values(&[controller, reason]).inc();
}

pub fn record_dropped_key(controller: &str) {
    DROPPED_KEYS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn record_provider_call(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    DNS_PROVIDER_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// `kind` is `addresses` when the IP set changed, `ttl` when only a TTL grew.
pub fn record_host_address_change(kind: &str) {
    HOST_ADDRESS_CHANGES_TOTAL.with_label_values(&[kind]).inc();
}

/// Encode every registered metric in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
