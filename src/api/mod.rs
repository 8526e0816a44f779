//! HTTP API for health checks and signer pool status

use crate::chain::ChainConnection;
use crate::config::ApiConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::funding::{FundingEngine, SignerReport};
use crate::signer::PoolStats;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FundingEngine<ChainConnection>>,
    pub started: Instant,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/signers", get(get_signers))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> FaucetResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FaucetError::Internal(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|e| FaucetError::Internal(format!("API server failed: {}", e)))
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - the node must answer
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let connection = state.engine.client();
    let node = connection.health_check().await;
    let status = if node {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: node,
            network: connection.network().name.to_string(),
            chain_id: connection.network().chain_id,
        }),
    )
}

/// Balance and lease state of every signer
async fn get_signers(State(state): State<AppState>) -> impl IntoResponse {
    Json(SignersResponse {
        signers: state.engine.report_signers().await,
    })
}

/// Pool counters
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        uptime_seconds: state.started.elapsed().as_secs(),
        pool: state.engine.pool().stats(),
    })
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    network: String,
    chain_id: u64,
}

#[derive(Serialize)]
struct SignersResponse {
    signers: Vec<SignerReport>,
}

#[derive(Serialize)]
struct StatsResponse {
    uptime_seconds: u64,
    pool: PoolStats,
}
