//! Arbitrage / sandwich detection bot
//!
//! Main entry point

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arb_engine::{Collaborators, Engine, Settings};
use arb_executor::DryRunExecutor;
use arb_price_feed::{PendingTxSource, RpcGasEstimator, SubgraphPriceSource, WsPendingTxSource};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn collaborators(settings: &Settings) -> anyhow::Result<Collaborators> {
    let adapters = &settings.adapters;

    let prices = SubgraphPriceSource::new(adapters.subgraph_map(), adapters.request_timeout())
        .context("Failed to build subgraph client")?;

    let rpc_url = adapters
        .rpc_url
        .as_deref()
        .context("adapters.rpc_url is required for gas estimation")?;
    let gas = RpcGasEstimator::new(
        rpc_url,
        adapters.gas_units_per_trade,
        adapters.native_token_price,
        adapters.request_timeout(),
    )
    .context("Failed to build RPC client")?;

    let pending = adapters
        .ws_url
        .as_deref()
        .map(|url| Arc::new(WsPendingTxSource::new(url)) as Arc<dyn PendingTxSource>);

    Ok(Collaborators {
        prices: Arc::new(prices),
        gas: Arc::new(gas),
        executor: Arc::new(DryRunExecutor::new()),
        pending,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_logging();

    info!("Starting arb-bot v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let collaborators = collaborators(&settings)?;

    let engine = Engine::new(settings.engine, collaborators).context("Invalid engine configuration")?;
    let engine = Arc::new(engine);

    {
        let config = engine.config().snapshot();
        info!(
            "Tracking {} pairs on {} venues, scan every {:?}, sandwich execution {}",
            config.tracked_pairs.len(),
            config.venues.len(),
            config.arbitrage.scan_interval(),
            if config.sandwich.execute { "on" } else { "off" }
        );
    }

    // Spawn shutdown signal handler
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        cancel.cancel();
    });

    info!("Press Ctrl+C to shutdown");

    if let Err(e) = engine.run().await {
        error!("Engine error: {}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
