use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poker_bench::config::load_config;
use poker_bench::health::{HealthChecker, HealthStatus};
use poker_bench::tournament::MultiRunManager;

const LOG_TARGET: &str = "bin::poker_bench";

#[derive(Debug, Parser)]
#[command(name = "poker_bench")]
#[command(about = "Benchmark LLM agents against each other in No-Limit Hold'em tournaments", long_about = None)]
struct Args {
    /// Toggle structured (JSON) tracing output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the benchmark described by a config file
    Run {
        /// Path to the benchmark config
        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Override the output log directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Health-check a config and optionally probe each model
    Check {
        /// Path to the benchmark config
        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Send a one-token probe request to every configured model
        #[arg(long)]
        probe: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_benchmark(config_path: PathBuf, log_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let log_dir = log_dir.unwrap_or_else(|| PathBuf::from(&config.output.log_dir));

    tracing::info!(
        target: LOG_TARGET,
        runs = config.tournament.num_runs,
        seats = config.tournament.seats,
        log_dir = %log_dir.display(),
        "starting benchmark"
    );

    let mut manager = MultiRunManager::new(config, log_dir)?;
    manager.run_all().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json);

    match args.command {
        Command::Run { config, log_dir } => match run_benchmark(config, log_dir).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(target: LOG_TARGET, error = %format!("{err:#}"), "benchmark failed");
                ExitCode::FAILURE
            }
        },
        Command::Check { config, probe } => {
            let report = HealthChecker::new(config, probe).run().await;
            report.print();
            if report.overall() == HealthStatus::Fail {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
