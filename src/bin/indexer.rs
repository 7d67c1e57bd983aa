use anyhow::Result;
use pair_indexer::config::Config;
use pair_indexer::fetcher::LogFetcher;
use pair_indexer::rate_limiter::RateLimiter;
use pair_indexer::repository::{Database, PairRepository};
use pair_indexer::rpc::RpcClient;
use pair_indexer::scanner::{ScanPlan, Scanner, is_cancellation};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting pair creation indexer");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!(
        "Scan mode: {:?}, page size {}, {} requests per second",
        config.scan_mode, config.page_size, config.requests_per_second
    );

    let db = Database::new(&config.database_url)?;
    let repository = PairRepository::new(&db.conn);
    info!("Database initialized");

    let client = RpcClient::new(&config.json_rpc_url)?;
    info!("RPC client ready for {}", client.url());

    let limiter = Arc::new(RateLimiter::new(config.requests_per_second)?);
    info!("One request permit every {:?}", limiter.interval());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight requests");
            shutdown.cancel();
        }
    });

    let fetcher = LogFetcher::new(client, limiter, cancel)
        .with_inclusive_end(config.inclusive_window_end);
    let plan = ScanPlan::from_config(&config);
    let mut scanner = Scanner::new(fetcher, repository, plan);

    if let Err(e) = scanner.run().await {
        if is_cancellation(&e) {
            warn!("Scan cancelled: {}", e);
        } else {
            error!("Scanner error: {}", e);
        }
        if let Some(block) = e.resume_block() {
            error!("Set START_BLOCK={} to resume", block);
        }
        return Err(e.into());
    }

    Ok(())
}
