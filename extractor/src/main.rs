//! Namecoin block extractor - Main entry point

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use nmc_extractor::{
    cli,
    config::{Config, STDIN_INPUT},
    database::{DryRunStore, SqlStore, Store},
    logging,
    source::{JsonLinesSource, MessageSource, SnapshotDir},
    ExtractorService,
};

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(Path::new(&config.logging.log_file), args.debug) {
        eprintln!("Failed to open log file {}: {}", config.logging.log_file, e);
        process::exit(1);
    }

    info!("Starting Namecoin block extractor");

    if let Err(e) = run(&config).await {
        error!("Extractor stopped: {:#}", e);
        eprintln!("Extractor stopped: {:#}", e);
        process::exit(1);
    }

    info!("Extractor finished");
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut source = open_source(config).await?;

    if config.dry_run {
        info!("Dry run, statements are printed instead of executed");
        drain(Arc::new(DryRunStore::new()), source.as_mut()).await
    } else {
        info!("Database: {}", config.db.url);
        let store = SqlStore::connect(&config.db.url)
            .await
            .with_context(|| format!("Failed to connect to {}", config.db.url))?;
        store.migrate().await.context("Failed to create schema")?;
        info!("Database schema ready");
        drain(Arc::new(store), source.as_mut()).await
    }
}

async fn open_source(config: &Config) -> anyhow::Result<Box<dyn MessageSource>> {
    if let Some(dir) = &config.snapshot_dir {
        let source = SnapshotDir::open(dir)
            .await
            .with_context(|| format!("Failed to open snapshot directory {}", dir.display()))?;
        return Ok(Box::new(source));
    }

    let input = config.stream_input();
    if input == STDIN_INPUT {
        Ok(Box::new(JsonLinesSource::stdin()))
    } else {
        let source = JsonLinesSource::open(input)
            .await
            .with_context(|| format!("Failed to open stream input {}", input))?;
        Ok(Box::new(source))
    }
}

async fn drain<S: Store>(store: Arc<S>, source: &mut dyn MessageSource) -> anyhow::Result<()> {
    let service = ExtractorService::new(store);
    let summary = service.start(source).await?;
    info!(
        "Processed {} blocks, {} transactions, {} unresolved inputs",
        summary.blocks, summary.transactions, summary.unresolved_inputs
    );
    Ok(())
}
