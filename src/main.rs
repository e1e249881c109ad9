use anyhow::Result;
use clap::{Parser, Subcommand};
use evscrape::fetch::snapshot_file_name;
use evscrape::pipeline::{ScrapeOptions, ValidateOptions, run_scrape, validate_config};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "evscrape", about = "Scrapes event participants into a flat table")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Scrape {
        #[arg(long)]
        output: Option<PathBuf>,
        /// Replay pages from a snapshot directory instead of the network.
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
        /// Store every fetched page for later replay.
        #[arg(long)]
        record_dir: Option<PathBuf>,
        #[arg(long)]
        delay_ms: Option<u64>,
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    Validate,
    SnapshotName {
        url: String,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            output,
            snapshot_dir,
            record_dir,
            delay_ms,
            report,
        } => {
            let summary = run_scrape(&ScrapeOptions {
                config_path: cli.config,
                output,
                snapshot_dir,
                record_dir,
                delay_ms,
            })?;

            info!(
                events = summary.events_listed,
                completed = summary.events_completed,
                skipped = summary.events_skipped,
                rows = summary.rows,
                songs_linked = summary.songs_linked,
                songs_skipped = summary.songs_skipped,
                "scrape summary"
            );
            if report {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::Validate => {
            let messages = validate_config(&ValidateOptions {
                config_path: cli.config,
            })?;
            for line in messages {
                println!("{line}");
            }
        }
        Commands::SnapshotName { url } => {
            println!("{}", snapshot_file_name(&url));
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
