use anyhow::Context;
use clap::{Parser, Subcommand};
use remo_collector::cache::SeriesCache;
use remo_collector::config::{DashboardConfig, IngestConfig};
use remo_collector::dashboard::query_dashboard;
use remo_collector::ingest::collect_once;
use remo_collector::remo::HttpSession;
use remo_collector::series::Window;
use remo_collector::store::{AccessMode, StoreBinding};
use remo_collector::{metrics, rest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "remo-collector", about = "Nature Remo temperature collector")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the current temperature once and append it to the store
    Collect,
    /// Serve the temperature query API
    Serve,
    /// Print the dashboard state for a window as JSON
    Summary {
        #[arg(long, default_value = "all")]
        window: Window,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Collect => run_collect().await,
        Command::Serve => run_serve().await,
        Command::Summary { window } => run_summary(window).await,
    };

    if outcome.is_err() {
        std::process::exit(1);
    }
}

/// Failures are logged where they happen; only the exit code is left to set.
async fn run_collect() -> Result<(), ()> {
    let config = IngestConfig::from_env().map_err(|e| error!("{}", e))?;
    let session =
        HttpSession::new(config.remo.request_timeout).map_err(|e| error!("{}", e))?;
    let connector = StoreBinding::from_config(&config.store, AccessMode::ReadWrite)
        .map_err(|e| error!("{}", e))?;

    collect_once(&config, &session, &connector)
        .await
        .map(|_| ())
        .map_err(|_| ())
}

async fn run_serve() -> Result<(), ()> {
    serve().await.map_err(|e| error!("{:#}", e))
}

async fn serve() -> anyhow::Result<()> {
    let config = DashboardConfig::from_env()?;
    metrics::init_metrics();

    let connector = StoreBinding::from_config(&config.store, AccessMode::ReadOnly)?;
    let cache = Arc::new(SeriesCache::new(config.cache_ttl));
    let app = rest::create_router(
        connector,
        cache,
        config.store.table.clone(),
        config.display_tz,
    );

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);
    info!(
        "Display timezone: {}, cache TTL: {:?}",
        config.display_tz, config.cache_ttl
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
            }
        })
        .await
        .context("HTTP server error")?;

    info!("Shutting down");
    Ok(())
}

async fn run_summary(window: Window) -> Result<(), ()> {
    summary(window).await.map_err(|e| error!("{:#}", e))
}

async fn summary(window: Window) -> anyhow::Result<()> {
    let config = DashboardConfig::from_env()?;
    let connector = StoreBinding::from_config(&config.store, AccessMode::ReadOnly)?;
    let cache = SeriesCache::new(Duration::ZERO);

    let state = query_dashboard(
        &connector,
        &cache,
        &config.store.table,
        config.display_tz,
        window,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
