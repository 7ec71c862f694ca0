//! Operator CLI for the forecast grid store.
//!
//! Creates schemas, reads point series, writes JSON field batches and
//! runs retention passes against the PostgreSQL backends.

mod batch;
mod cutoff;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use grid_store::{DataProvider, GridStore, GridStoreConfig, Telemetry};
use wx_common::time::parse_iso8601;
use wx_common::{GridCell, TimeRange};
use wx_storage::{PgCatalog, PgTable, TableStoreConfig};

#[derive(Parser, Debug)]
#[command(name = "wxstore")]
#[command(about = "Row-partitioned forecast grid store")]
struct Args {
    /// Engine configuration file (YAML). Falls back to environment variables.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the catalog and grid table schemas
    Migrate,

    /// Print the series of one grid cell as JSON lines
    Fetch {
        #[arg(long)]
        projection: i32,
        #[arg(long)]
        x: usize,
        #[arg(long)]
        y: usize,
        /// Comma-separated field ids
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<i32>,
        /// Inclusive start (ISO 8601)
        #[arg(long)]
        start: String,
        /// Exclusive end (ISO 8601)
        #[arg(long)]
        end: String,
    },

    /// Write a JSON batch of field grids
    Put {
        #[arg(long)]
        projection: i32,
        #[arg(short, long)]
        file: String,
    },

    /// Delete records whose valid time is before a cutoff
    Clean {
        /// Keep this many hours of data before now
        #[arg(long, conflicts_with = "cutoff")]
        retention_hours: Option<u64>,
        /// Explicit cutoff (ISO 8601)
        #[arg(long)]
        cutoff: Option<String>,
        /// Repeat every N seconds instead of running once
        #[arg(long, conflicts_with = "cutoff")]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    let engine_config = match &args.config {
        Some(path) => GridStoreConfig::from_yaml_file(path)?,
        None => GridStoreConfig::from_env(),
    };
    let table_config = TableStoreConfig::from_env();
    table_config.validate()?;

    let table = PgTable::connect(&table_config).await?;
    let catalog = PgCatalog::from_pool(table.pool().clone());

    if let Command::Migrate = args.command {
        catalog.migrate().await?;
        table.migrate().await?;
        info!(table = %table_config.table_name, "Schemas ready");
        return Ok(());
    }

    let telemetry = Telemetry::new(info_span!("wxstore", table = %table_config.table_name));
    let store = GridStore::new(Arc::new(table), Arc::new(catalog), engine_config, telemetry)?;
    let config = store.config();
    info!(
        fetch_window_secs = config.fetch_window_secs,
        clean_workers = config.clean_workers,
        delete_batch_size = config.delete_batch_size,
        "Grid store ready"
    );

    let outcome = match args.command {
        Command::Migrate => Ok(()),
        Command::Fetch {
            projection,
            x,
            y,
            fields,
            start,
            end,
        } => fetch(&store, projection, GridCell::new(x, y), &fields, &start, &end).await,
        Command::Put { projection, file } => put(&store, projection, &file).await,
        Command::Clean {
            retention_hours,
            cutoff,
            interval_secs,
        } => match interval_secs {
            Some(secs) => clean_forever(&store, retention_hours, secs).await,
            None => clean_once(&store, retention_hours, cutoff.as_deref()).await,
        },
    };

    let metrics = serde_json::to_string(&store.telemetry().snapshot())?;
    info!(metrics = %metrics, "Store metrics");
    outcome
}

async fn fetch(
    store: &GridStore,
    projection: i32,
    cell: GridCell,
    fields: &[i32],
    start: &str,
    end: &str,
) -> Result<()> {
    let range = TimeRange::new(
        parse_iso8601(start).context("Invalid --start")?,
        parse_iso8601(end).context("Invalid --end")?,
    );

    let mut points = store.get_fields(projection, cell, fields, range).await?;
    points.sort_by(|a, b| {
        (a.valid_time, a.run_time, a.field_id).cmp(&(b.valid_time, b.run_time, b.field_id))
    });

    for point in &points {
        println!("{}", serde_json::to_string(point)?);
    }
    info!(points = points.len(), "Fetch complete");
    Ok(())
}

async fn put(store: &GridStore, projection: i32, file: &str) -> Result<()> {
    let batch = batch::load_batch(file)?;
    info!(file = %file, keys = batch.len(), "Loaded batch");

    let report = store.put_fields(projection, batch).await?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

async fn clean_once(
    store: &GridStore,
    retention_hours: Option<u64>,
    cutoff: Option<&str>,
) -> Result<()> {
    let cutoff = cutoff::resolve(chrono::Utc::now(), retention_hours, cutoff)?;
    let report = store.clean(cutoff).await?;
    println!("{}", serde_json::to_string(&report)?);

    if !report.is_complete() {
        bail!("{} partitions failed to clean", report.failures.len());
    }
    Ok(())
}

async fn clean_forever(store: &GridStore, retention_hours: Option<u64>, secs: u64) -> Result<()> {
    if secs == 0 {
        bail!("--interval-secs must be > 0");
    }
    info!(interval_secs = secs, "Starting periodic retention");

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        ticker.tick().await;

        let cutoff = cutoff::resolve(chrono::Utc::now(), retention_hours, None)?;
        match store.clean(cutoff).await {
            Ok(report) if report.is_complete() => {}
            Ok(report) => warn!(
                failures = report.failures.len(),
                "Retention pass left partitions behind"
            ),
            Err(e) => error!(error = %e, "Retention pass failed"),
        }
    }
}
