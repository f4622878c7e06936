//! The single binary that constructs every other crate into a running
//! process (§9 "Design Notes": a root `Runtime` object replaces global
//! state). Exposes the market-data REST/WebSocket surface (§6); the
//! order-submission pipeline (C1-C7) runs as internal background tasks
//! with no HTTP surface of its own.

mod api;
mod config;
mod demo_source;
mod error;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use broker::SimulatedAdapter;
use common::{Px, Symbol, Ts};
use distribution::{ConnectionRegistry, Distributor};
use execution_router::{Router as RoutingRouter, RoutingPolicy, SubmissionPipeline};
use market_connector::SourceManager;
use market_data_store::HistoricalStore;
use oms::{OmsConfig, OrderRegistry};
use order_monitor::OrderMonitor;
use risk_manager::RiskManager;

use crate::config::DaemonConfig;
use crate::demo_source::DemoMarketDataSource;
use crate::error::{DaemonError, DaemonResult};
use crate::state::Runtime;

#[derive(Parser, Debug)]
#[command(name = "trading-daemon", about = "Order execution core and market data core, as one process")]
struct Cli {
    /// Path to a TOML config file. Missing fields fall back to defaults;
    /// a missing file falls back to an all-default config.
    #[arg(long)]
    config: Option<String>,
    /// Overrides `log_level` from the config file / default.
    #[arg(long)]
    log: Option<String>,
}

fn init_tracing(level: &str) {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .compact()
        .init();
}

fn load_config(cli: &Cli) -> DaemonResult<DaemonConfig> {
    let config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    Ok(config)
}

fn build_runtime(config: &DaemonConfig) -> DaemonResult<Runtime> {
    let risk = Arc::new(RiskManager::new(config.risk.clone()));

    let oms = Arc::new(OrderRegistry::new(OmsConfig::default()));

    let router = Arc::new(RoutingRouter::new(RoutingPolicy::BestPrice));
    router.register(Arc::new(SimulatedAdapter::new("simulated-primary", Px::new(100.0))));
    let pipeline = Arc::new(SubmissionPipeline::new(Arc::clone(&oms), Arc::clone(&risk), Arc::clone(&router), config.pipeline.clone()));

    let monitor = Arc::new(OrderMonitor::new(config.monitor));

    let demo_connector = Arc::new(DemoMarketDataSource::new("demo-feed", 7, config.demo_symbol_count));
    let sources = Arc::new(SourceManager::new(vec![demo_connector]));

    let store = if config.store_path == ":memory:" {
        Arc::new(HistoricalStore::open_in_memory().map_err(DaemonError::Storage)?)
    } else {
        Arc::new(HistoricalStore::open(&config.store_path).map_err(DaemonError::Storage)?)
    };

    let connections = Arc::new(ConnectionRegistry::new());
    let distributor = Arc::new(Distributor::with_cache_config(Arc::clone(&store), Arc::clone(&connections), config.cache));

    Ok(Runtime {
        risk,
        oms,
        pipeline,
        monitor,
        sources,
        store,
        distributor,
        connections,
        symbol_count: config.demo_symbol_count,
    })
}

/// Periodically generates a synthetic tick per symbol and feeds it
/// through the distribution pipeline, standing in for a live exchange
/// push feed (§4.8's concrete wire connector is out of scope; §4.11's
/// ingestion path is not).
async fn run_demo_feed(runtime: Runtime, interval: Duration, symbol_count: u32) {
    let symbols: Vec<Symbol> = (1..=symbol_count).map(Symbol).collect();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match runtime.sources.get_quotes(&symbols).await {
            Ok(quotes) => {
                for quote in quotes {
                    runtime.distributor.ingest(quote).await;
                }
            }
            Err(err) => warn!(%err, "demo feed poll failed"),
        }
    }
}

/// Periodically sweeps expired orders out of the OMS (§3 "Ownership":
/// expiry is a lifecycle transition, not a lazy check on read).
async fn run_expiry_sweeper(runtime: Runtime, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let expired = runtime.oms.sweep_expired(Ts::now());
        if !expired.is_empty() {
            info!(count = expired.len(), "swept expired orders");
        }
    }
}

/// Periodically polls every active order against the monitor's SLA
/// thresholds and logs any alert raised (§4.7).
async fn run_order_monitor(runtime: Runtime, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for order in runtime.oms.active_orders() {
            for alert in runtime.monitor.poll(&order) {
                warn!(order_id = %order.id, kind = ?alert.kind, "order monitor alert");
            }
        }
    }
}

/// Periodically drains the dead-letter queue (§4.5 step 7), logging what
/// was parked. Draining (rather than resubmitting in place) matches the
/// queue's own contract: entries come back out for the caller to decide
/// how to resubmit, since that requires fresh quotes this loop doesn't have.
async fn run_dead_letter_retry(pipeline: Arc<SubmissionPipeline>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let drained = pipeline.dead_letters().retry_all();
        for entry in &drained {
            warn!(order_id = %entry.order_id, reason = %entry.reason, retry_count = entry.retry_count, "dead-lettered order");
        }
    }
}

async fn run(config: DaemonConfig) -> DaemonResult<()> {
    let runtime = build_runtime(&config)?;

    let _cache_sweep_handle = runtime.distributor.cache().spawn_sweeper();

    tokio::spawn(run_demo_feed(runtime.clone(), Duration::from_millis(config.demo_tick_interval_ms), config.demo_symbol_count));
    tokio::spawn(run_expiry_sweeper(runtime.clone(), Duration::from_secs(5)));
    tokio::spawn(run_order_monitor(runtime.clone(), Duration::from_millis(config.monitor.poll_interval_ms)));
    tokio::spawn(run_dead_letter_retry(Arc::clone(&runtime.pipeline), Duration::from_secs(30)));

    let app = api::router(runtime);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|err| DaemonError::Init(format!("failed to bind {}: {err}", config.bind_addr)))?;
    info!(addr = %config.bind_addr, "trading-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| DaemonError::Runtime(err.to_string()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install Ctrl+C handler; shutting down immediately");
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    };

    init_tracing(cli.log.as_deref().unwrap_or(&config.log_level));

    if let Err(err) = run(config).await {
        error!(%err, "trading-daemon exiting");
        std::process::exit(err.exit_code());
    }
}
