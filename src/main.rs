//! Bitcoin Address Analyzer CLI
//!
//! Fetches transaction history for Bitcoin addresses from Blockchain.info
//! and derives 39 behavioral parameters per address.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use btc_address_analyzer::bitcoin::{load_address_file, validate_and_dedupe};
use btc_address_analyzer::client::BlockchainClient;
use btc_address_analyzer::config::AnalyzerConfig;
use btc_address_analyzer::pipeline::Pipeline;
use btc_address_analyzer::report::{write_parameter_guide, write_reports};

#[derive(Parser)]
#[command(name = "btc-address-analyzer")]
#[command(version)]
#[command(about = "Bitcoin address activity analyzer", long_about = None)]
struct Cli {
    /// Path to configuration file (optional, uses env vars if not provided)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output directory for result files
    #[arg(short, long, global = true, default_value = "results")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one or more Bitcoin addresses
    Analyze {
        /// Addresses to analyze (positional, base58 or bech32)
        addresses: Vec<String>,

        /// File with addresses, one per line (# comments allowed)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Override the per-address transaction cap
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Probe API connectivity with a minimal request
    Check,

    /// Print the 39-parameter guide as CSV
    Guide,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => AnalyzerConfig::load().context("Failed to load config from environment")?,
    };

    config.paths.output_dir = cli.output_dir.clone();

    match cli.command {
        Commands::Analyze {
            addresses,
            file,
            limit,
        } => {
            cmd_analyze(&mut config, addresses, file, limit).await?;
        }
        Commands::Check => {
            cmd_check(&config).await?;
        }
        Commands::Guide => {
            cmd_guide()?;
        }
    }

    Ok(())
}

async fn cmd_analyze(
    config: &mut AnalyzerConfig,
    addresses: Vec<String>,
    file: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    info!("=== Bitcoin Address Analysis ===");

    if let Some(limit) = limit {
        config.fetch.max_transactions = limit;
        config.validate()?;
    }
    config.ensure_directories()?;

    // Combine file and positional addresses, in that order
    let mut candidates = Vec::new();
    if let Some(path) = &file {
        let from_file = load_address_file(path)
            .with_context(|| format!("Failed to load addresses from {:?}", path))?;
        info!("Loaded {} addresses from {:?}", from_file.len(), path);
        candidates.extend(from_file);
    }
    candidates.extend(addresses);

    let dropped = candidates.len();
    let addresses = validate_and_dedupe(candidates);
    let dropped = dropped - addresses.len();
    if dropped > 0 {
        warn!("Dropped {} duplicate or implausible addresses", dropped);
    }
    if addresses.is_empty() {
        anyhow::bail!("No valid addresses to analyze (pass addresses or --file)");
    }

    info!(
        "Analyzing {} addresses (cap {} transactions each)",
        addresses.len(),
        config.fetch.max_transactions
    );

    let client = BlockchainClient::new(config);
    let pipeline = Pipeline::new(client, config.clone());
    let outcomes = pipeline.analyze(&addresses).await;

    let paths = write_reports(&config.paths.output_dir, &outcomes)
        .context("Failed to write reports")?;

    let analyzed = outcomes.iter().filter(|o| o.is_analyzed()).count();
    info!("=== Analysis Complete ===");
    info!("Analyzed {}/{} addresses", analyzed, outcomes.len());
    info!("Results saved to {:?}", paths.results);
    if let Some(failures) = &paths.failures {
        info!("Failures saved to {:?}", failures);
    }
    info!("Metadata saved to {:?}", paths.metadata);

    Ok(())
}

async fn cmd_check(config: &AnalyzerConfig) -> Result<()> {
    info!("=== API Connectivity Check ===");
    info!("Base URL: {}", config.base_url);

    let client = BlockchainClient::new(config);
    client
        .check_connectivity()
        .await
        .context("Connectivity check failed")?;

    info!("API reachable");
    Ok(())
}

fn cmd_guide() -> Result<()> {
    write_parameter_guide(std::io::stdout().lock())?;
    Ok(())
}
