//! RideStat - ride telemetry store and statistics
//!
//! Command line front end over the ride service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ridestat::rides::{exporter_csv, seed, RideService};
use ridestat::storage::config::{get_data_dir, load_config, load_config_from};
use ridestat::telemetry::TelemetryPacket;
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ridestat")]
#[command(about = "Store ride telemetry and compute ride statistics")]
#[command(version)]
struct Cli {
    /// Configuration file (default: config.toml in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List ride ids, most recent first
    List,
    /// List rides with their summaries
    Activities,
    /// Show a ride summary
    Summary {
        ride_id: i64,
        /// Ignore the cached summary
        #[arg(long)]
        recompute: bool,
    },
    /// Dump the raw samples of a ride
    Series { ride_id: i64 },
    /// Chart series of a ride
    Chart { ride_id: i64 },
    /// GPS track of a ride
    Track {
        ride_id: i64,
        /// Timestamp used for unreadable GPS times (epoch ms)
        #[arg(long, default_value_t = 0)]
        fallback_ms: i64,
    },
    /// Export the samples of a ride to CSV
    Export {
        ride_id: i64,
        /// Output file (default: generated in the current directory)
        output: Option<PathBuf>,
    },
    /// Delete a ride and its samples
    Delete { ride_id: i64 },
    /// Insert the demo ride
    Seed,
    /// Ingest packets from a JSON lines file
    Ingest { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path, get_data_dir())?,
        None => load_config()?,
    };
    tracing::debug!("Using database {}", config.database_path().display());

    let service = RideService::open(&config)?;

    match cli.command {
        Commands::List => print_json(&service.list_ride_ids()?)?,
        Commands::Activities => print_json(&service.list_activities()?)?,
        Commands::Summary { ride_id, recompute } => {
            let summary = if recompute {
                service.recompute_ride_summary(ride_id)?
            } else {
                service.get_ride_summary(ride_id)?
            };
            print_json(&summary)?;
        }
        Commands::Series { ride_id } => print_json(&service.get_raw_series(ride_id)?)?,
        Commands::Chart { ride_id } => print_json(&service.get_chart_series(ride_id)?)?,
        Commands::Track {
            ride_id,
            fallback_ms,
        } => print_json(&service.get_ride_locations(ride_id, fallback_ms)?)?,
        Commands::Export { ride_id, output } => {
            let samples = service.get_raw_series(ride_id)?;
            let path = match output {
                Some(path) => path,
                None => {
                    let summary = service.get_ride_summary(ride_id).ok();
                    PathBuf::from(exporter_csv::generate_csv_filename(ride_id, summary.as_ref()))
                }
            };
            exporter_csv::export_csv_to_file(&samples, &path)?;
            tracing::info!("Exported {} samples to {}", samples.len(), path.display());
        }
        Commands::Delete { ride_id } => service.delete_ride(ride_id)?,
        Commands::Seed => {
            if seed::seed_demo_ride(&service)? {
                println!("Seeded demo ride {}", seed::DEMO_RIDE_ID);
            }
        }
        Commands::Ingest { file } => ingest_file(&service, &file)?,
    }

    Ok(())
}

/// Store every packet of a JSON lines file. Malformed lines are skipped.
fn ingest_file(service: &RideService, path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut stored = 0usize;
    let mut skipped = 0usize;

    for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TelemetryPacket>(&line) {
            Ok(packet) => match service.ingest_packet(&packet) {
                Ok(_) => stored += 1,
                Err(e) => {
                    tracing::warn!("Line {}: {}", number + 1, e);
                    skipped += 1;
                }
            },
            Err(e) => {
                tracing::warn!("Line {}: malformed packet: {}", number + 1, e);
                skipped += 1;
            }
        }
    }

    tracing::info!("Ingested {} packets ({} skipped)", stored, skipped);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
