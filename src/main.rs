use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod level;
mod metrics;
mod models;
mod pipeline;
mod report;
mod series;
mod source;

use pipeline::{HealthStatus, RefreshOutcome};
use source::DataSource;

#[derive(Parser)]
#[command(name = "xp-progress-tracker")]
#[command(about = "Experience progress tracker and level ETA estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Read a CSV export of the tracking sheet instead of Postgres
    #[arg(long, env = "XP_CSV")]
    csv: Option<PathBuf>,
    #[arg(long, env = "XP_TARGET_LEVEL", default_value_t = 1000)]
    target_level: i64,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import experience rows from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute metrics once and print them
    Metrics {
        #[command(flatten)]
        source: SourceArgs,
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Recompute metrics on a fixed interval
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = 15)]
        interval_minutes: u64,
        /// Write the health status of every run to this file as JSON
        #[arg(long)]
        health_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let rows = source::read_csv(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let inserted = db::import_rows(&pool, &rows).await?;
            println!("Inserted {inserted} rows from {}.", csv.display());
        }
        Commands::Metrics { source, json } => {
            metrics::validate_target_level(source.target_level)?;
            let data_source = open_source(&source).await?;
            let refresh =
                pipeline::refresh(&data_source, source.target_level, Utc::now().date_naive())
                    .await?;

            match refresh.outcome {
                RefreshOutcome::Ready(snapshot) if json => {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                RefreshOutcome::Ready(snapshot) => print!("{}", report::summary(&snapshot)),
                RefreshOutcome::NoData => {
                    println!("No experience data available.");
                    if let Some(message) = refresh.health.message {
                        println!("Reason: {message}");
                    }
                }
            }
        }
        Commands::Report { source, out } => {
            metrics::validate_target_level(source.target_level)?;
            let data_source = open_source(&source).await?;
            let refresh =
                pipeline::refresh(&data_source, source.target_level, Utc::now().date_naive())
                    .await?;

            let label = data_source.describe();
            let report = match &refresh.outcome {
                RefreshOutcome::Ready(snapshot) => report::build_report(&label, snapshot),
                RefreshOutcome::NoData => {
                    report::no_data_report(&label, refresh.health.message.as_deref())
                }
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch {
            source,
            interval_minutes,
            health_file,
        } => {
            metrics::validate_target_level(source.target_level)?;
            let data_source = open_source(&source).await?;
            watch(
                &data_source,
                source.target_level,
                interval_minutes,
                health_file,
            )
            .await?;
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when no --csv export is given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_source(args: &SourceArgs) -> anyhow::Result<DataSource> {
    match &args.csv {
        Some(path) => Ok(DataSource::Csv(path.clone())),
        None => Ok(DataSource::Postgres(connect().await?)),
    }
}

/// Each tick awaits its run before the next one starts.
async fn watch(
    data_source: &DataSource,
    target_level: i64,
    interval_minutes: u64,
    health_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let period = Duration::from_secs(interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        source = %data_source.describe(),
        interval_minutes = period.as_secs() / 60,
        "watching for progress"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let health = match pipeline::refresh(
                    data_source,
                    target_level,
                    Utc::now().date_naive(),
                )
                .await
                {
                    Ok(refresh) => {
                        if let RefreshOutcome::Ready(snapshot) = &refresh.outcome {
                            info!(
                                level = snapshot.current_level,
                                eta = %report::eta_text(&snapshot.eta),
                                "refresh complete"
                            );
                        }
                        refresh.health
                    }
                    Err(err) => {
                        error!(error = %err, "refresh failed");
                        HealthStatus::failed(err.to_string(), Utc::now())
                    }
                };

                if let Some(path) = &health_file {
                    if let Err(err) = write_health(path, &health) {
                        warn!(error = %err, path = %path.display(), "could not write health file");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn write_health(path: &std::path::Path, health: &HealthStatus) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(health)?;
    std::fs::write(path, body)?;
    Ok(())
}
