//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Agentpack - APM agent buildpack
///
/// Injects a monitoring agent into Java, Node.js and PHP application
/// images when a matching service binding is present.
#[derive(Parser, Debug)]
#[command(name = "agentpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Buildpack directory holding buildpack.toml and resources/
    #[arg(long, global = true, env = "CNB_BUILDPACK_DIR", default_value = ".")]
    pub buildpack: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check for a monitoring service binding and write the build plan
    Detect(DetectArgs),

    /// Contribute agent layers for the planned runtimes
    Build(BuildArgs),
}

/// Arguments for the detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Platform directory (bindings live under <platform>/bindings)
    #[arg(long, env = "CNB_PLATFORM_DIR", default_value = "/platform")]
    pub platform: PathBuf,

    /// Where to write the build plan
    #[arg(long, env = "CNB_BUILD_PLAN_PATH")]
    pub plan: PathBuf,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Layers directory
    #[arg(long, env = "CNB_LAYERS_DIR")]
    pub layers: PathBuf,

    /// Platform directory
    #[arg(long, env = "CNB_PLATFORM_DIR", default_value = "/platform")]
    pub platform: PathBuf,

    /// Buildpack plan selected for this build
    #[arg(long, env = "CNB_BP_PLAN_PATH")]
    pub plan: PathBuf,

    /// Application directory
    #[arg(long, env = "CNB_APP_DIR", default_value = ".")]
    pub app: PathBuf,

    /// Writable directory for downloaded agents
    #[arg(long, env = "AGENTPACK_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,
}
