//! Agentpack - APM agent buildpack
//!
//! CLI entry point that dispatches to the detect and build phases.

use agentpack::cli::{Cli, Commands};
use agentpack::error::AgentpackResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code telling the lifecycle that detection did not pass
const DETECT_FAIL: u8 = 100;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e.chain());
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AgentpackResult<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("agentpack=warn"),
        1 => EnvFilter::new("agentpack=info"),
        _ => EnvFilter::new("agentpack=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Detect(args) => {
            if agentpack::cli::commands::detect(args).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(DETECT_FAIL))
            }
        }
        Commands::Build(args) => {
            agentpack::cli::commands::build(args, &cli.buildpack).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
