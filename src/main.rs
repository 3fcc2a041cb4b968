use chrono::{DateTime, Utc};
use clap::Parser;
use classroll::application::service::{Classroom, Command};
use classroll::config::EngineConfig;
use classroll::domain::ports::{ClockRef, Stores};
use classroll::infrastructure::clock::{FixedClock, SystemClock};
use classroll::interfaces::csv::operation_reader::OperationReader;
use classroll::interfaces::csv::roster_writer::RosterWriter;
use classroll::interfaces::seed::Seed;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// JSON file with teachers, students and vouchers to load before processing.
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML file with engine settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pin the clock to this RFC 3339 instant instead of using the system time.
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use classroll::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(RocksDBStore::open(path).into_diagnostic()?.stores()),
        None => Ok(Stores::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::in_memory())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    debug!(?config, "engine configuration");

    let clock: ClockRef = match cli.now {
        Some(now) => Arc::new(FixedClock::new(now)),
        None => Arc::new(SystemClock),
    };

    let stores = open_stores(cli.db_path)?;
    if let Some(path) = &cli.seed {
        Seed::load(path)
            .into_diagnostic()?
            .apply(&stores)
            .await
            .into_diagnostic()?;
    }

    let classroom = Classroom::new(stores, clock, config);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for row in reader.operations() {
        match row.and_then(Command::try_from) {
            Ok(command) => {
                if let Err(e) = classroom.execute(command).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    let classes = classroom.catalog.list_classes().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = RosterWriter::new(stdout.lock());
    writer.write_roster(&classes).into_diagnostic()?;

    Ok(())
}
