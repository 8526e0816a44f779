//! Entity Faucet - tops up governance entity accounts with network gas
//!
//! Connects to the configured network node, builds a pool of pre-funded
//! signers and serves funding through the `FundingEngine`, with health,
//! signer status and metrics endpoints alongside.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, warn};

use entity_faucet::api;
use entity_faucet::chain::{ChainClient, ChainConnection};
use entity_faucet::config::{LoggingConfig, Settings};
use entity_faucet::funding::{FundingConfig, FundingEngine};
use entity_faucet::metrics::{self, MetricsServer};
use entity_faucet::signer::SignerPool;
use entity_faucet::tx::GasOracle;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting Entity Faucet v{}", env!("CARGO_PKG_VERSION"));
    info!(
        network = %settings.network.name,
        signers = settings.signers.private_keys.len(),
        "Loaded configuration"
    );

    // Connect first: a wrong network must stop startup before any key is loaded
    let connection = match ChainConnection::connect(&settings.network).await {
        Ok(connection) => Arc::new(connection),
        Err(e) => {
            error!(fatal = e.is_fatal(), "Cannot start: {}", e);
            return Err(e.into());
        }
    };

    let pool = Arc::new(SignerPool::from_keys(
        &settings.signers.private_keys,
        connection.chain_id(),
    )?);
    info!("Signer pool ready with {} signers", pool.len());

    let gas = GasOracle::new(connection.network(), settings.network.gas_price_gwei);
    let funding_config = FundingConfig::from_settings(
        &settings.faucet,
        connection.default_amount(),
        connection.gas_limit(),
    );
    if funding_config.max_lease_wait.is_none() {
        warn!("max_lease_wait_secs is 0, funding requests may wait forever for a signer");
    }
    let engine = Arc::new(FundingEngine::new(
        connection.clone(),
        pool.clone(),
        gas,
        funding_config,
    ));

    // Report signer balances
    for report in engine.report_signers().await {
        match report.balance {
            Some(balance) => info!(
                index = report.index,
                address = ?report.address,
                balance = %balance,
                "Signer loaded"
            ),
            None => warn!(
                index = report.index,
                address = ?report.address,
                "Signer loaded but its balance could not be read"
            ),
        }
    }

    // Start API server
    let api_handle = if settings.api.enabled {
        let state = api::AppState {
            engine: engine.clone(),
            started: Instant::now(),
        };
        let config = settings.api.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health check loop
    let health_handle = tokio::spawn({
        let connection = connection.clone();
        let pool = pool.clone();
        let interval = settings.faucet.health_check_interval_secs.max(1);
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                let healthy = connection.health_check().await;
                if !healthy {
                    warn!(endpoint = connection.endpoint(), "Node health check failed");
                }
                metrics::record_health_check(healthy);

                let stats = pool.stats();
                if stats.leased == stats.size {
                    warn!(size = stats.size, "All signers are leased");
                }
            }
        }
    });

    info!("Entity Faucet is running");
    if settings.api.enabled {
        info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    }
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    engine.stop();

    health_handle.abort();
    if let Some(h) = api_handle {
        h.abort();
    }
    if let Some(h) = metrics_handle {
        h.abort();
    }

    let stats = pool.stats();
    if stats.leased > 0 {
        warn!(
            leased = stats.leased,
            "Stopping with transactions still being tracked"
        );
    }

    info!("Entity Faucet stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = config
        .filter
        .clone()
        .unwrap_or_else(|| "info,entity_faucet=debug,hyper=warn".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
