use anyhow::{Context, Result};
use certchain::config::PkiConfig;
use certchain::pipeline::Pipeline;
use certchain::storage::FileStore;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => PkiConfig::load(path).context("Failed to load configuration")?,
        None => PkiConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    args.command.apply(&mut config);

    let store = FileStore::new(&config.output_dir);
    tracing::info!(output = %store.base().display(), "Writing artifacts");
    let pipeline = Pipeline::new(config, store);

    match args.command {
        Command::All(_) => {
            pipeline.run()?;
        }
        Command::Root => {
            pipeline.issue_root()?;
        }
        Command::Intermediate => {
            pipeline.issue_intermediate()?;
        }
        Command::Server(_) => {
            pipeline.issue_leaf()?;
        }
    }
    Ok(())
}
