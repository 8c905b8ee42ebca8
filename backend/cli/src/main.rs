//! `parley`: fuzzy catalog search and entity resolution from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

mod check_cmd;
mod engine;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Fuzzy catalog matching and entity detection for conversational text", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.parley/parley.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog for a phrase
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Detect entities in a text and print the anonymized result
    Resolve {
        text: String,
        /// Entity types the dialogue currently expects
        #[arg(short, long = "expect")]
        expect: Vec<String>,
    },
    /// Validate the config
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .unwrap_or_else(|| parley_config::config_file_path(&parley_config::config_dir()));

    let config = parley_config::prepare(&path).await?;
    let logging = config.logging.clone().unwrap_or_default();
    parley_logging::init_logger(
        logging.dir.as_deref(),
        logging.level.as_deref().unwrap_or(parley_config::defaults::DEFAULT_LOG_LEVEL),
    )?;
    tracing::debug!(path = %path.display(), "Config loaded");

    let report = parley_config::validate(&config);
    match cli.command {
        Commands::Check => check_cmd::run(&config, &report),
        Commands::Search {
            query,
            limit,
            threshold,
        } => {
            let engine = ready_engine(&config, &report, &path)?;
            let mut options = engine.search_options.clone();
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            if let Some(threshold) = threshold {
                options = options.with_threshold(threshold);
            }
            let matches = parley_fuzzy::search(&engine.index, &query, &options);
            println!("{}", serde_json::to_string_pretty(&matches)?);
            Ok(())
        }
        Commands::Resolve { text, expect } => {
            let engine = ready_engine(&config, &report, &path)?;
            let resolved = engine.resolver.resolve(&text, &expect).await;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        }
    }
}

fn ready_engine(
    config: &parley_config::NluConfig,
    report: &parley_config::ValidationReport,
    path: &Path,
) -> Result<engine::Engine> {
    if !report.is_valid() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("Invalid config at {}; run `parley check` for details", path.display());
    }
    engine::build_engine(config)
}
