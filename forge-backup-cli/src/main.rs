//! forge-backup - one backup or restore run per invocation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forge_backup::database::adapter_for;
use forge_backup::storage::backend_for;
use forge_backup::{utils, Pipeline, RestoreOutcome, Settings, SourceDescriptor};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file layered under the environment
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); falls back to LOG_LEVEL
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump, archive and upload the forge, then trim old archives
    Backup,

    /// Download an archive and apply it to the forge
    Restore {
        /// Archive to restore (overrides BACKUP_FILENAME)
        #[arg(short, long, value_name = "NAME")]
        archive: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    utils::logger::init(&log_level)?;

    tracing::info!("Starting forge-backup v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    if let Command::Restore { archive: Some(archive) } = &args.command {
        settings = settings.with_restore_target(archive.clone());
    }

    let source = SourceDescriptor::from_app_ini(&settings.forge_config_path)
        .context("failed to read forge configuration")?;
    let database = adapter_for(&source.database.kind)?;
    let storage = backend_for(&settings.backup_method)?;

    let pipeline = Pipeline::new(&settings, &source, database.as_ref(), storage.as_ref());

    match args.command {
        Command::Backup => {
            let report = pipeline.backup().await?;
            tracing::info!(
                "Backup {} uploaded ({} bytes)",
                report.archive_identifier,
                report.archive_bytes
            );
        }
        Command::Restore { .. } => match pipeline.restore().await? {
            RestoreOutcome::Restored(id) => tracing::info!("Restore of {} finished", id),
            RestoreOutcome::AlreadyApplied(id) => {
                tracing::info!("{} was already restored on this host, skipping", id)
            }
        },
    }

    Ok(())
}
