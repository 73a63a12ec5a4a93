use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use storewatch::config::Config;
use storewatch::ingest;
use storewatch::report::render_csv;
use storewatch::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "storewatch-admin")]
#[command(about = "Storewatch data and report management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the cached data with the CSV feeds in a directory
    Load {
        /// Directory containing store_status.csv (defaults to DATA_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Compute a report from the cached data
    Report {
        /// Write the CSV here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show row counts and the reference instant
    Summary,
    /// List the store ids present in the status feed
    Stores,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Load { dir } => {
            let dir = dir.unwrap_or(config.data.dir);
            let counts = ingest::load_directory(storage.as_ref(), &dir).await?;
            println!(
                "✓ Loaded {} observations, {} business-hour rules and {} time zones for {} stores",
                counts.observations, counts.business_hours, counts.timezones, counts.stores
            );
        }
        Commands::Report { output } => {
            let dataset = storage.snapshot().await?;
            let report = config.report.engine().build_report(&dataset)?;
            let body = render_csv(&report.rows)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &body)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("✓ Wrote {} rows to {}", report.rows.len(), path.display());
                }
                None => std::io::stdout().write_all(&body)?,
            }
        }
        Commands::Summary => {
            let counts = storage.counts().await?;
            let reference = storage.reference_instant().await?;

            println!("{:<24} {}", "Stores", counts.stores);
            println!("{:<24} {}", "Observations", counts.observations);
            println!("{:<24} {}", "Business-hour rules", counts.business_hours);
            println!("{:<24} {}", "Time zones", counts.timezones);
            match reference {
                Some(at) => println!("{:<24} {}", "Reference instant", at),
                None => println!("{:<24} -", "Reference instant"),
            }
        }
        Commands::Stores => {
            let store_ids = storage.store_ids().await?;
            if store_ids.is_empty() {
                println!("No stores loaded");
            }
            for store_id in store_ids {
                println!("{}", store_id);
            }
        }
    }

    Ok(())
}
