//! lodmirror service: CLI entry points for the harvest loop, the
//! ingestion worker pool, and one-shot dataset synchronization.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use lodgraph::store::{GraphStore, SparqlStore, SparqlStoreConfig};
use lodingest::catalog::{CatalogClient, HttpCatalog};
use lodingest::cursor::{CursorStore, SqliteCursor};
use lodingest::harvest::{HarvestConfig, HarvestLoop};
use lodingest::queue::{JobQueue, SqliteQueue};
use lodingest::sync::DatasetSynchronizer;
use lodingest::worker::IngestWorker;

/// Runs the command line interface for the mirror service.
pub async fn run_cli() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Harvest(args) => run_harvest(args).await,
        Command::Worker(args) => run_workers(args).await,
        Command::Sync(args) => run_sync_once(args).await,
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the periodic harvest loop
    Harvest(HarvestArgs),
    /// Runs ingestion workers against the dataset queue
    Worker(WorkerArgs),
    /// Synchronizes one dataset identifier and exits
    Sync(SyncArgs),
}

#[derive(Args, Clone)]
struct ConnectionArgs {
    /// SPARQL query endpoint of the graph store
    #[arg(long, env = "LODMIRROR_STORE_ENDPOINT")]
    store_endpoint: String,
    /// SPARQL update endpoint, when distinct from the query endpoint
    #[arg(long, env = "LODMIRROR_STORE_UPDATE_ENDPOINT")]
    store_update_endpoint: Option<String>,
    #[arg(long, env = "LODMIRROR_STORE_USERNAME")]
    store_username: Option<String>,
    #[arg(long, env = "LODMIRROR_STORE_PASSWORD")]
    store_password: Option<String>,
    /// Base URL of the catalog API
    #[arg(long, env = "LODMIRROR_CATALOG_URL")]
    catalog_url: String,
    /// Directory holding the durable queue and harvest cursor
    #[arg(long, env = "LODMIRROR_STATE_PATH", default_value = "./state")]
    state_path: PathBuf,
}

#[derive(Args)]
struct HarvestArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Seconds between harvest ticks
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,
    /// Maximum records discovered per tick
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
    /// Dataset-queue depth at which a tick backs off
    #[arg(long, default_value_t = 2500)]
    backoff_threshold: usize,
    /// Catalog search page size
    #[arg(long, default_value_t = 100)]
    page_size: usize,
}

#[derive(Args)]
struct WorkerArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Number of concurrent workers
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Poll interval while the queue is empty, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    /// Attempts before a transiently failing task is dropped
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// Dataset identifier to synchronize
    identifier: String,
}

/// External collaborators, constructed once per process and passed to
/// every component that needs them.
struct MirrorContext {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn GraphStore>,
    queue: Arc<dyn JobQueue>,
    cursor: Arc<dyn CursorStore>,
}

fn build_context(args: &ConnectionArgs) -> anyhow::Result<MirrorContext> {
    std::fs::create_dir_all(&args.state_path).context("failed to create state directory")?;

    let mut store_config = SparqlStoreConfig::new(args.store_endpoint.clone());
    store_config.update_endpoint = args.store_update_endpoint.clone();
    store_config.username = args.store_username.clone();
    store_config.password = args.store_password.clone();
    let store =
        Arc::new(SparqlStore::new(store_config).context("failed to build store client")?);

    let catalog =
        Arc::new(HttpCatalog::new(args.catalog_url.clone()).context("failed to build catalog client")?);
    let queue = Arc::new(
        SqliteQueue::open(args.state_path.join("queue.sqlite"))
            .context("failed to open job queue")?,
    );
    let cursor = Arc::new(
        SqliteCursor::open(args.state_path.join("harvest.sqlite"))
            .context("failed to open cursor store")?,
    );

    Ok(MirrorContext {
        catalog,
        store,
        queue,
        cursor,
    })
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

async fn run_harvest(args: HarvestArgs) -> anyhow::Result<()> {
    let context = build_context(&args.connection)?;
    let harvester = HarvestLoop::new(
        context.catalog,
        context.queue,
        context.cursor,
        HarvestConfig {
            batch_size: args.batch_size,
            backoff_threshold: args.backoff_threshold,
            page_size: args.page_size,
        },
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("harvest loop started (every {}s)", args.interval_secs.max(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match harvester.tick(chrono::Utc::now()).await {
                    Ok(report) => {
                        info!("tick: {:?}, cursor at {}", report.outcome, report.cursor);
                    }
                    Err(err) => error!("harvest tick failed: {err}"),
                }
            }
            _ = shutdown_signal() => break,
        }
    }
    info!("harvest loop stopped");
    Ok(())
}

async fn run_workers(args: WorkerArgs) -> anyhow::Result<()> {
    let context = build_context(&args.connection)?;
    let synchronizer = Arc::new(DatasetSynchronizer::new(context.catalog, context.store));
    let poll_interval = Duration::from_millis(args.poll_interval_ms.max(10));

    let mut handles = Vec::new();
    for worker_id in 0..args.concurrency.max(1) {
        let worker = IngestWorker::new(
            Arc::clone(&context.queue),
            Arc::clone(&synchronizer),
            args.max_attempts,
        );
        handles.push(tokio::spawn(async move {
            loop {
                match worker.run_once().await {
                    Ok(Some(_)) => {}
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(err) => {
                        error!("worker {worker_id}: {err}");
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        }));
    }

    info!("{} ingestion workers started", handles.len());
    shutdown_signal().await;
    info!("shutting down workers");
    for handle in &handles {
        handle.abort();
    }
    Ok(())
}

async fn run_sync_once(args: SyncArgs) -> anyhow::Result<()> {
    let context = build_context(&args.connection)?;
    let synchronizer = DatasetSynchronizer::new(context.catalog, context.store);
    let outcome = synchronizer
        .sync(&args.identifier)
        .await
        .with_context(|| format!("failed to synchronize {}", args.identifier))?;
    info!(
        "{}: {} statements committed ({})",
        outcome.pid,
        outcome.statements,
        if outcome.replaced { "replaced" } else { "new" }
    );
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cli_parses_harvest_command() {
        let cli = Cli::try_parse_from([
            "lodmirror",
            "harvest",
            "--store-endpoint",
            "http://localhost:9999/sparql",
            "--catalog-url",
            "http://localhost:8080/api",
            "--interval-secs",
            "60",
        ])
        .unwrap();
        match cli.command {
            Command::Harvest(args) => {
                assert_eq!(args.interval_secs, 60);
                assert_eq!(args.batch_size, 500);
            }
            _ => panic!("expected harvest command"),
        }
    }

    #[test]
    fn context_creates_state_directory() {
        let dir = tempdir().unwrap();
        let args = ConnectionArgs {
            store_endpoint: "http://localhost:9999/sparql".to_string(),
            store_update_endpoint: None,
            store_username: None,
            store_password: None,
            catalog_url: "http://localhost:8080/api".to_string(),
            state_path: dir.path().join("state"),
        };
        let context = build_context(&args).unwrap();
        assert!(args.state_path.exists());
        assert_eq!(context.store.name(), "sparql");
    }
}
