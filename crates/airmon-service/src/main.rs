//! Airmon Service - background collector and storage admin.
//!
//! Run with: `cargo run -p airmon-service`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use airmon_service::{Collector, Config, GasSensor, SimulatedSensor};
use airmon_store::{MigrationOutcome, Store, migrate_legacy_buffer};

/// Airmon Service - background collector and storage admin.
#[derive(Parser, Debug)]
#[command(name = "airmon-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory (overrides config).
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector in the foreground (default behavior).
    Run,

    /// Print the most recent readings, newest first.
    Readings {
        /// Number of readings to print (0 for all).
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Print as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Show or set the stored calibration baseline.
    Baseline {
        /// Store a new baseline (decimal or 0x-prefixed hex).
        #[arg(long, num_args = 2, value_names = ["ECO2", "TVOC"], value_parser = parse_word)]
        set: Option<Vec<u16>>,
    },

    /// Convert a legacy buffer snapshot to the current format.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airmon_service=info".parse()?)
                .add_directive("airmon_store=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run) | None => run_collector(config).await,
        Some(Command::Readings { count, json }) => print_readings(&config, count, json),
        Some(Command::Baseline { set }) => handle_baseline(&config, set),
        Some(Command::Migrate) => migrate(&config),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(storage) = &args.storage {
        config.storage.path = storage.clone();
    }

    config.validate()?;
    Ok(config)
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    Ok(Store::open(config.storage.to_store_config()?))
}

async fn run_collector(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&config)?);
    let sensor: Arc<dyn GasSensor> = Arc::new(SimulatedSensor::new());

    let collector = Arc::new(Collector::new(
        Arc::clone(&store),
        sensor,
        &config.sensor,
    ));
    let task = tokio::spawn({
        let collector = Arc::clone(&collector);
        async move { collector.run().await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    collector.stop();
    task.await.context("Collector task failed")?;

    tokio::task::spawn_blocking(move || store.close())
        .await
        .context("Store task failed")?
        .context("Failed to flush store")?;

    Ok(())
}

fn print_readings(config: &Config, count: usize, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let readings = store.peek_latest(count)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
    } else if readings.is_empty() {
        println!("No readings stored in {}", config.storage.path.display());
    } else {
        for reading in &readings {
            println!("{}", reading);
        }
    }
    Ok(())
}

fn handle_baseline(config: &Config, set: Option<Vec<u16>>) -> anyhow::Result<()> {
    let store = open_store(config)?;

    if let Some(words) = set {
        let [eco2, tvoc] = words[..] else {
            anyhow::bail!("--set takes exactly two values");
        };
        store.set_baseline(eco2, tvoc)?;
        store.close()?;
        println!("Stored baseline {}", airmon_types::Baseline::new(eco2, tvoc));
        return Ok(());
    }

    match store.baseline() {
        Ok(baseline) => println!("{}", baseline),
        Err(airmon_store::Error::BaselineNotSet(raw)) => println!("Baseline not set ({})", raw),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn migrate(config: &Config) -> anyhow::Result<()> {
    let path = airmon_store::points_path(&config.storage.path);

    match migrate_legacy_buffer(&path, config.storage.pretty)? {
        MigrationOutcome::AlreadyCurrent => {
            println!("{} is already in the current format", path.display())
        }
        MigrationOutcome::Migrated(count) => {
            println!("Migrated {} readings in {}", count, path.display())
        }
    }
    Ok(())
}

fn parse_word(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid baseline word '{}': {}", s, e))
}
