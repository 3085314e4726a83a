// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Zenith sync controller.
//!
//! All metrics carry the `zenith_sync_` prefix and are registered in
//! [`METRICS_REGISTRY`], which the metrics server exposes on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - per-service reconcile/remove outcomes and attempt durations
//! - **Startup Metrics** - size of the initial sync
//! - **Mirror Metrics** - updates and deletions of the mirrored TLS secret
//!
//! [`serve`] exposes the registry on `/metrics` next to a `/healthz` liveness probe.
//!
//! # Example
//!
//! ```rust,no_run
//! use zenith_sync::metrics::{record_attempt_success, OPERATION_RECONCILE};
//!
//! record_attempt_success(OPERATION_RECONCILE, std::time::Duration::from_millis(250));
//! ```

use anyhow::Context;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "zenith_sync";

/// Operation label for service reconciliation
pub const OPERATION_RECONCILE: &str = "reconcile";

/// Operation label for service removal
pub const OPERATION_REMOVE: &str = "remove";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Attempts of per-service operations by outcome
///
/// Labels:
/// - `operation`: `reconcile` or `remove`
/// - `status`: `success`, `error` (attempt failed, will retry) or `giveup` (attempts exhausted)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of per-service operation attempts by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of single attempts in seconds
///
/// Labels:
/// - `operation`: `reconcile` or `remove`
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of per-service operation attempts in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Startup Metrics
// ============================================================================

/// Number of services in the initial snapshot of the registration source
pub static INITIAL_SERVICES: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        format!("{METRICS_NAMESPACE}_initial_services"),
        "Number of services in the initial registration snapshot",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of orphaned services removed during the initial sync
pub static ORPHANED_SERVICES: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        format!("{METRICS_NAMESPACE}_orphaned_services"),
        "Number of services found in the cluster but not in the initial snapshot",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Mirror Metrics
// ============================================================================

/// Changes applied to the mirrored TLS secret
///
/// Labels:
/// - `action`: `update` or `delete`
pub static MIRROR_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_tls_mirror_changes_total"),
        "Total number of changes applied to the mirrored TLS secret by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a successful attempt
pub fn record_attempt_success(operation: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a failed attempt
pub fn record_attempt_error(operation: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record that an operation was abandoned after exhausting its attempts
pub fn record_give_up(operation: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, "giveup"])
        .inc();
}

/// Record the outcome of the startup diff
pub fn record_initial_sync(services: usize, orphans: usize) {
    INITIAL_SERVICES.set(i64::try_from(services).unwrap_or(i64::MAX));
    ORPHANED_SERVICES.set(i64::try_from(orphans).unwrap_or(i64::MAX));
}

/// Record a mirror update or deletion
pub fn record_mirror_change(action: &str) {
    MIRROR_TOTAL.with_label_values(&[action]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

// ============================================================================
// Metrics Server
// ============================================================================

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(text) => ([(CONTENT_TYPE, TextEncoder::new().format_type().to_string())], text).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router serving `/metrics` and `/healthz`
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
}

/// Serve the metrics router on an already-bound listener
///
/// # Errors
/// Returns error if the server fails
pub async fn serve_listener(listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .await
        .context("Metrics server failed")
}

/// Bind `address` and serve the metrics router on it
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(address: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind metrics server to {address}"))?;
    info!("Serving metrics on {}", address);
    serve_listener(listener).await
}
