//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Funding request outcomes
//! - Signer leasing and skips
//! - Transaction submission and confirmation

use crate::error::{FaucetError, FaucetResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref FUND_REQUESTS: CounterVec = register_counter_vec!(
        "faucet_fund_requests_total",
        "Funding requests by outcome",
        &["chain_id", "outcome"]
    ).unwrap();

    pub static ref SIGNER_SKIPS: CounterVec = register_counter_vec!(
        "faucet_signer_skips_total",
        "Leased signers passed over during a funding attempt",
        &["reason"]
    ).unwrap();

    pub static ref SIGNERS_LEASED: Gauge = register_gauge!(
        "faucet_signers_leased",
        "Signers currently leased"
    ).unwrap();

    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "faucet_transactions_submitted_total",
        "Funding transactions broadcast",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_CONFIRMATIONS: CounterVec = register_counter_vec!(
        "faucet_transaction_confirmations_total",
        "Tracked funding transactions by terminal state",
        &["chain_id", "outcome"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "faucet_transaction_latency_seconds",
        "Time from broadcast to terminal state",
        &["chain_id"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();

    pub static ref HEALTH_CHECKS: CounterVec = register_counter_vec!(
        "faucet_health_checks_total",
        "Node health checks by result",
        &["result"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> FaucetResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| FaucetError::Internal(format!("Cannot bind metrics port: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| FaucetError::Internal(format!("Metrics server failed: {}", e)))
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_fund_request(chain_id: u64, outcome: &str) {
    FUND_REQUESTS
        .with_label_values(&[&chain_id.to_string(), outcome])
        .inc();
}

pub fn record_signer_skip(reason: &str) {
    SIGNER_SKIPS.with_label_values(&[reason]).inc();
}

pub fn record_signer_leased() {
    SIGNERS_LEASED.inc();
}

pub fn record_signer_released() {
    SIGNERS_LEASED.dec();
}

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_confirmation(chain_id: u64, outcome: &str, latency_secs: f64) {
    let chain = chain_id.to_string();
    TX_CONFIRMATIONS
        .with_label_values(&[&chain, outcome])
        .inc();
    TX_LATENCY.with_label_values(&[&chain]).observe(latency_secs);
}

pub fn record_health_check(healthy: bool) {
    HEALTH_CHECKS
        .with_label_values(&[if healthy { "ok" } else { "failed" }])
        .inc();
}
