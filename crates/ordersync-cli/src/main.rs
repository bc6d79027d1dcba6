//! OrderSync CLI - delta-sync order records onto an external board
//!
//! `merge` stages wide source rows into the local tables with hash-based
//! change detection; `sync` pushes pending work to the external board;
//! `status` and `requeue` drive operator inspection and replay.

use std::env;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ordersync_core::client::{HttpBoardApi, SyncClient, SyncReport};
use ordersync_core::db::{BatchFilter, CustomerBatcher, Database, MergeEngine, OrderStore};
use ordersync_core::{SyncSettings, SyncState};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "ordersync")]
#[command(about = "Move wide-format order rows onto an external work-management board")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a staged snapshot of source rows into the local tables
    Merge {
        /// JSON file holding an array of wide row objects
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
        /// Sync settings file
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
        /// Output the merge report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending headers and lines to the external board
    Sync {
        /// Sync settings file
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
        /// Only sync this customer
        #[arg(long)]
        customer: Option<String>,
        /// Only sync this business order number
        #[arg(long)]
        order: Option<String>,
        /// Only sync this season
        #[arg(long)]
        season: Option<String>,
        /// Output sync reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show record counts per sync state and failed-item reasons
    Status {
        /// Scope the report to one customer
        #[arg(long)]
        customer: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-queue FAILED records back to PENDING for another sync attempt
    Requeue {
        /// Only re-queue this customer
        #[arg(long)]
        customer: Option<String>,
        /// Only re-queue this business order number
        #[arg(long)]
        order: Option<String>,
        /// Only re-queue this season
        #[arg(long)]
        season: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] ordersync_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No pending work matched the given filters")]
    NothingPending,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ordersync=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Merge {
            input,
            config,
            json,
        } => run_merge(&input, &config, json, &db_path),
        Commands::Sync {
            config,
            customer,
            order,
            season,
            json,
        } => {
            let filter = BatchFilter {
                customer,
                order_no: order,
                season,
            };
            run_sync(&config, &filter, json, &db_path).await
        }
        Commands::Status { customer, json } => run_status(customer.as_deref(), json, &db_path),
        Commands::Requeue {
            customer,
            order,
            season,
        } => {
            let filter = BatchFilter {
                customer,
                order_no: order,
                season,
            };
            run_requeue(&filter, &db_path)
        }
    }
}

fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var("ORDERSYNC_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("ordersync.db"))
}

/// Environment overrides keep the bearer credential out of the settings file
fn apply_env_overrides(settings: &mut SyncSettings) {
    if let Ok(token) = env::var("ORDERSYNC_API_TOKEN") {
        if !token.trim().is_empty() {
            settings.api_token = Some(token);
        }
    }
    if let Ok(endpoint) = env::var("ORDERSYNC_API_ENDPOINT") {
        if !endpoint.trim().is_empty() {
            settings.api_endpoint = Some(endpoint);
        }
    }
}

fn run_merge(input: &Path, config: &Path, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let settings = SyncSettings::from_path(config)?;
    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let rows = ordersync_core::source::SourceRow::rows_from_json(document)?;

    let mut db = Database::open(db_path)?;
    let engine = MergeEngine::new(&settings);
    let report = engine.merge(db.connection_mut(), &rows)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Merged {} rows: {} inserted, {} updated, {} unchanged, {} skipped",
            report.processed, report.inserted, report.updated, report.unchanged, report.skipped
        );
        println!(
            "Lines: {} inserted, {} updated, {} removed",
            report.lines_inserted, report.lines_updated, report.lines_removed
        );
    }
    Ok(())
}

async fn run_sync(
    config: &Path,
    filter: &BatchFilter,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut settings = SyncSettings::from_path(config)?;
    apply_env_overrides(&mut settings);

    let mut db = Database::open(db_path)?;
    let batches = CustomerBatcher::select_pending(db.connection_mut(), filter)?;
    if batches.is_empty() {
        return Err(CliError::NothingPending);
    }

    let api = HttpBoardApi::from_settings(&settings)?;
    let client = SyncClient::new(api, &settings);
    let reports = client.sync_all(db.connection(), &batches).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for line in format_sync_reports(&reports) {
            println!("{line}");
        }
    }
    Ok(())
}

fn format_sync_reports(reports: &[SyncReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for report in reports {
        lines.push(format!(
            "{}: {} headers synced, {} failed; {} lines synced, {} failed",
            report.customer,
            report.headers_synced,
            report.headers_failed,
            report.lines_synced,
            report.lines_failed
        ));
        for error in &report.errors {
            lines.push(format!("  ! {error}"));
        }
    }
    lines
}

#[derive(Debug, Serialize)]
struct StatusReport {
    headers: Vec<StateCount>,
    lines: Vec<StateCount>,
    failed: Vec<FailedItem>,
}

#[derive(Debug, Serialize)]
struct StateCount {
    state: SyncState,
    count: i64,
}

#[derive(Debug, Serialize)]
struct FailedItem {
    order_no: String,
    reason: String,
}

fn run_status(customer: Option<&str>, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = Database::open(db_path)?;
    let store = OrderStore::new(db.connection());

    let report = StatusReport {
        headers: store
            .header_state_counts(customer)?
            .into_iter()
            .map(|(state, count)| StateCount { state, count })
            .collect(),
        lines: store
            .line_state_counts(customer)?
            .into_iter()
            .map(|(state, count)| StateCount { state, count })
            .collect(),
        failed: store
            .failed_headers(customer)?
            .into_iter()
            .map(|(order_no, reason)| FailedItem { order_no, reason })
            .collect(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Headers:");
        for item in &report.headers {
            println!("  {:<8} {}", item.state.as_str(), item.count);
        }
        println!("Lines:");
        for item in &report.lines {
            println!("  {:<8} {}", item.state.as_str(), item.count);
        }
        if !report.failed.is_empty() {
            println!("Failed:");
            for item in &report.failed {
                println!("  {} - {}", item.order_no, item.reason);
            }
        }
    }
    Ok(())
}

fn run_requeue(filter: &BatchFilter, db_path: &Path) -> Result<(), CliError> {
    let mut db = Database::open(db_path)?;
    let requeued = CustomerBatcher::requeue_failed(db.connection_mut(), filter)?;
    println!("Re-queued {requeued} failed headers");
    Ok(())
}
