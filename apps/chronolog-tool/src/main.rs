//! CLI tool for working with a change log on disk.
//!
//! Provides commands for:
//! - Querying and inspecting recorded history
//! - Recording changes by hand
//! - Verifying the event log
//! - Previewing region rollbacks

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use chronolog_core::{
    BlockPos, ChangeQuery, ChangeReason, ChangeRecord, ChangeSet, ChangeStore, FileRowStore,
    LogConfig, Region,
};
use chronolog_runtime::{format_change, ChangeLogger, HistoryQuery};

/// Command-line arguments for the change log tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory holding the event log (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List changes inside a region
    Query {
        #[arg(long, default_value = "overworld")]
        world: String,
        /// First corner, as x,y,z
        #[arg(long)]
        from: BlockPos,
        /// Opposite corner, as x,y,z
        #[arg(long)]
        to: BlockPos,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the history of a single cell
    Inspect {
        #[arg(long, default_value = "overworld")]
        world: String,
        /// Cell coordinate, as x,y,z
        #[arg(long)]
        at: BlockPos,
    },
    /// Append one change to the log
    Record {
        #[arg(long, default_value = "overworld")]
        world: String,
        #[arg(long)]
        at: BlockPos,
        /// Actor name, or `#name` for an environment source
        #[arg(long)]
        source: String,
        #[arg(long, default_value = "UNKNOWN")]
        reason: ChangeReason,
        /// Subject kind tag
        #[arg(long, default_value = "CELL")]
        kind: String,
        #[arg(long)]
        before: String,
        #[arg(long)]
        after: String,
        /// Milliseconds since the Unix epoch; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Check the event log for damage
    Verify,
    /// Print what rolling back a region would write
    Plan {
        #[arg(long, default_value = "overworld")]
        world: String,
        #[arg(long)]
        from: BlockPos,
        #[arg(long)]
        to: BlockPos,
        /// Only consider changes at or after this timestamp
        #[arg(long)]
        since: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => LogConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LogConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    config.validate()?;

    match args.command {
        Command::Verify => verify(&config),
        Command::Query {
            world,
            from,
            to,
            limit,
        } => {
            let store = open_store(&config)?;
            let mut query = ChangeQuery::in_region(Region::new(world, from, to));
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let reader = HistoryQuery::new(store, config.default_query_limit);
            for record in reader.query_changes(query).await? {
                println!(
                    "{} {} {} {} {}",
                    record.timestamp(),
                    record.pos(),
                    record.source(),
                    record.reason(),
                    format_change(&record)
                );
            }
            Ok(())
        }
        Command::Inspect { world, at } => {
            let store = open_store(&config)?;
            let reader = HistoryQuery::new(store, config.default_query_limit);
            let records = reader.query_changes(ChangeQuery::at(world.as_str(), at)).await?;
            println!("History of {} in {}:", at, world);
            if records.is_empty() {
                println!("  no changes recorded");
            }
            for record in &records {
                println!("{}", format_change(record));
            }
            Ok(())
        }
        Command::Record {
            world,
            at,
            source,
            reason,
            kind,
            before,
            after,
            timestamp,
        } => {
            let store = open_store(&config)?;
            let Some(source) = store.sources().resolve(&source) else {
                bail!("unknown or invalid source '{}'", source);
            };
            let subject = store.subjects().reconstruct(&kind, &before, &after)?;
            let mut builder = ChangeRecord::builder()
                .at(world, at)
                .with_source(source)
                .with_reason(reason)
                .with_subject(subject);
            if let Some(ts) = timestamp {
                builder = builder.at_time(ts);
            }
            let record = builder.build()?;

            let logger = ChangeLogger::spawn(store.clone(), &config);
            logger.record(record);
            logger.shutdown().await?;

            let stats = logger.stats();
            if stats.records_persisted == 0 {
                bail!("change was not persisted");
            }
            println!("Recorded change (log now holds {} rows)", store.row_store().row_count());
            Ok(())
        }
        Command::Plan {
            world,
            from,
            to,
            since,
        } => {
            let store = open_store(&config)?;
            let region = Region::new(world.as_str(), from, to);
            let reader = HistoryQuery::new(store, config.default_query_limit);
            let records = reader.query(&world, &region, usize::MAX).await?;
            let records = match since {
                Some(ts) => records.into_iter().filter(|r| r.timestamp() >= ts).collect(),
                None => records,
            };
            let plan = ChangeSet::earliest_per_cell(region, records)?;
            println!("Rollback of {} touches {} cells:", plan.region(), plan.len());
            for record in plan.cell_records() {
                if let Some(cell) = record.subject().as_cell() {
                    println!("  {} <- {}", record.pos(), cell.from);
                }
            }
            let skipped = plan.len() - plan.cell_records().count();
            if skipped > 0 {
                println!("  ({} non-cell changes skipped)", skipped);
            }
            Ok(())
        }
    }
}

fn open_store(config: &LogConfig) -> anyhow::Result<Arc<ChangeStore>> {
    let store = ChangeStore::open(config)
        .with_context(|| format!("opening event log in {}", config.data_dir.display()))?;
    Ok(Arc::new(store))
}

fn verify(config: &LogConfig) -> anyhow::Result<()> {
    let path = config.log_path();
    let report = FileRowStore::verify(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    println!(
        "{}: {} batches, {} rows, {}/{} bytes valid",
        path.display(),
        report.batches,
        report.rows,
        report.valid_bytes,
        report.total_bytes
    );
    match report.problem {
        None => {
            println!("ok");
            Ok(())
        }
        Some(problem) => {
            tracing::error!("Event log is damaged: {}", problem);
            bail!("event log is damaged: {}", problem)
        }
    }
}
