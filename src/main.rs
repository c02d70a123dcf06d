//! congress-sync - Incremental synchronization of congress.gov legislative data
//!
//! This is the main entry point for the congress-sync application.

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use congress_sync::config::Config;
use congress_sync::database::{Database, SqliteDatabase};
use congress_sync::error::{AppError, NormalizeError, SyncError};
use congress_sync::models::{EntityKind, SyncOutcome};
use congress_sync::normalize::{
    current_congress, normalize_bill, normalize_committee, normalize_member,
};
use congress_sync::otel::{init_tracing, OtelProvider, SyncMetrics};
use congress_sync::sync::{SchedulerConfig, SyncOrchestrator, SyncScheduler};
use congress_sync::upstream::{BillFilter, CommitteeFilter, CongressClient, MemberFilter};

/// congress-sync - Incremental synchronization of congress.gov legislative data
#[derive(Parser, Debug)]
#[command(name = "congress-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CONGRESS_SYNC_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Run the periodic sync scheduler until interrupted (default)
    Serve,
    /// Run a single sync and print its report
    Sync,
    /// Print normalized records straight from the API without writing them
    Inspect {
        /// Entity to fetch (committees, legislators, bills)
        #[arg(short, long, default_value = "bills")]
        entity: EntityKind,

        /// Congress to fetch (defaults to the first configured, else the current one)
        #[arg(long)]
        congress: Option<u32>,

        /// Maximum number of records to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show what is stored locally
    Status {
        /// Restrict the bill listing to one congress
        #[arg(long)]
        congress: Option<u32>,

        /// Maximum number of recent bills to print
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    let otel_provider = OtelProvider::new(&config.otel)?;
    init_tracing(&otel_provider, &config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting congress-sync");

    let result = match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => match open_database(&config).await {
            Ok(database) => serve(&config, &otel_provider, database).await,
            Err(e) => Err(e),
        },
        Command::Sync => match open_database(&config).await {
            Ok(database) => sync_once(&config, &otel_provider, database).await,
            Err(e) => Err(e),
        },
        Command::Inspect {
            entity,
            congress,
            limit,
        } => inspect(&config, entity, congress, limit).await,
        Command::Status { congress, limit } => match open_database(&config).await {
            Ok(database) => status(database.as_ref(), congress, limit).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("congress-sync shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

async fn open_database(config: &Config) -> Result<Arc<SqliteDatabase>, AppError> {
    let database = SqliteDatabase::new(&config.database.path).await?;
    info!(path = %config.database.path, "Database initialized");
    Ok(Arc::new(database))
}

fn build_client(config: &Config) -> Result<CongressClient, AppError> {
    if config.upstream.api_key.is_none() {
        return Err(AppError::Config(
            "upstream.api_key is required to call congress.gov".to_string(),
        ));
    }
    Ok(CongressClient::from_config(config)?)
}

/// Wire the upstream client, store and metrics into an orchestrator
async fn build_orchestrator(
    config: &Config,
    otel: &OtelProvider,
    database: Arc<SqliteDatabase>,
) -> Result<Arc<SyncOrchestrator>, AppError> {
    let client = build_client(config)?;
    let metrics = Arc::new(SyncMetrics::new(&otel.meter()));
    let orchestrator =
        SyncOrchestrator::new(config, Arc::new(client), database).with_metrics(metrics);
    orchestrator.restore_state().await?;

    Ok(Arc::new(orchestrator))
}

async fn serve(
    config: &Config,
    otel: &OtelProvider,
    database: Arc<SqliteDatabase>,
) -> Result<(), AppError> {
    let orchestrator = build_orchestrator(config, otel, database).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = SyncScheduler::new(
        SchedulerConfig::from(&config.sync),
        orchestrator,
        shutdown_rx,
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    scheduler_task
        .await
        .map_err(|e| AppError::Internal(format!("Scheduler task failed: {}", e)))
}

async fn sync_once(
    config: &Config,
    otel: &OtelProvider,
    database: Arc<SqliteDatabase>,
) -> Result<(), AppError> {
    let orchestrator = build_orchestrator(config, otel, database).await?;

    match orchestrator.run().await {
        SyncOutcome::Completed(report) => {
            let output = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            println!("{}", output);
            if report.success {
                Ok(())
            } else {
                Err(AppError::Internal(format!(
                    "Sync run failed (aborted: {}, stalled: {})",
                    report.aborted, report.stalled
                )))
            }
        }
        SyncOutcome::AlreadyRunning => Err(AppError::Internal(
            "A sync run is already in progress".to_string(),
        )),
    }
}

async fn inspect(
    config: &Config,
    entity: EntityKind,
    congress: Option<u32>,
    limit: usize,
) -> Result<(), AppError> {
    let client = build_client(config)?;
    let now = Utc::now();
    let congress = congress
        .or_else(|| config.sync.congresses.first().copied())
        .unwrap_or_else(|| current_congress(now));

    info!(entity = %entity, congress, limit, "Inspecting upstream records");

    match entity {
        EntityKind::Committees => {
            let filter = CommitteeFilter {
                congress: Some(congress),
                chamber: None,
            };
            print_records(client.list_all_committees(filter).take(limit), |raw| {
                normalize_committee(raw, now)
            })
            .await
        }
        EntityKind::Legislators => {
            let filter = MemberFilter {
                congress: Some(congress),
                ..MemberFilter::default()
            };
            print_records(client.list_all_members(filter).take(limit), |raw| {
                normalize_member(raw, now)
            })
            .await
        }
        EntityKind::Bills => {
            let filter = BillFilter {
                congress: Some(congress),
                ..BillFilter::default()
            };
            print_records(client.list_all_bills(filter).take(limit), |raw| {
                normalize_bill(raw, now)
            })
            .await
        }
    }
}

/// Print each normalized record as one JSON line
async fn print_records<R, T>(
    stream: impl Stream<Item = Result<R, SyncError>>,
    normalize: impl Fn(&R) -> Result<T, NormalizeError>,
) -> Result<(), AppError>
where
    T: Serialize,
{
    pin_mut!(stream);

    let mut printed = 0u64;
    let mut skipped = 0u64;
    while let Some(item) = stream.next().await {
        match normalize(&item?) {
            Ok(record) => {
                let line = serde_json::to_string(&record)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                println!("{}", line);
                printed += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping record that failed normalization");
                skipped += 1;
            }
        }
    }

    info!(printed, skipped, "Inspection finished");
    Ok(())
}

async fn status(database: &dyn Database, congress: Option<u32>, limit: u32) -> Result<(), AppError> {
    let output = json!({
        "counts": {
            "committees": database.count_committees().await?,
            "legislators": database.count_legislators().await?,
            "bills": database.count_bills().await?,
        },
        "last_successful_sync": database.last_successful_sync().await?,
        "recent_bills": database.list_bills(congress, limit).await?,
    });

    let output =
        serde_json::to_string_pretty(&output).map_err(|e| AppError::Internal(e.to_string()))?;
    println!("{}", output);
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
