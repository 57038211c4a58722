//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Extrinsic submissions and their outcomes
//! - Fee estimation success rate
//! - Finalized blocks scanned by the inclusion monitor
//!
//! There is no HTTP endpoint; `render` returns the text exposition.

use crate::error::{ClientError, ClientResult};

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "txgen_transactions_submitted_total",
        "Total extrinsics submitted by call kind",
        &["kind"]
    ).unwrap();

    pub static ref TX_OUTCOMES: CounterVec = register_counter_vec!(
        "txgen_transaction_outcomes_total",
        "Final outcome of tracked submissions",
        &["outcome"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "txgen_transaction_latency_seconds",
        "Time from submission to a terminal outcome",
        &["kind"],
        vec![1.0, 3.0, 6.0, 12.0, 18.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Fee metrics
    pub static ref FEE_ESTIMATES: CounterVec = register_counter_vec!(
        "txgen_fee_estimates_total",
        "Fee estimation attempts by result",
        &["result"]
    ).unwrap();

    // Inclusion monitor metrics
    pub static ref BLOCKS_SCANNED: CounterVec = register_counter_vec!(
        "txgen_finalized_blocks_scanned_total",
        "Finalized blocks scanned for a pending extrinsic",
        &[]
    ).unwrap();

    pub static ref INCLUSION_LATENCY: HistogramVec = register_histogram_vec!(
        "txgen_inclusion_wait_seconds",
        "Time until a watched extrinsic was found in a finalized block",
        &[],
        vec![6.0, 12.0, 18.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> ClientResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ClientError::Internal(format!("metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| ClientError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_tx_submitted(kind: &str) {
    TX_SUBMITTED.with_label_values(&[kind]).inc();
}

pub fn record_tx_outcome(outcome: &str) {
    TX_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub fn record_tx_latency(kind: &str, latency_secs: f64) {
    TX_LATENCY.with_label_values(&[kind]).observe(latency_secs);
}

pub fn record_fee_estimate(success: bool) {
    FEE_ESTIMATES
        .with_label_values(&[if success { "ok" } else { "unavailable" }])
        .inc();
}

pub fn record_block_scanned() {
    BLOCKS_SCANNED.with_label_values(&[]).inc();
}

pub fn record_inclusion_latency(latency_secs: f64) {
    INCLUSION_LATENCY.with_label_values(&[]).observe(latency_secs);
}
