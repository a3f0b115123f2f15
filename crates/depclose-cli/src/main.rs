//! # depclose-cli
//!
//! Computes the set of source packages a primary repository transitively
//! depends on at runtime and at build time.
//!
//! This is the main entry point for the depclose CLI tool. It handles command
//! parsing, sets up logging and error handling, and dispatches to the
//! appropriate command handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use depclose_core::error::{DepcloseError, DepcloseResult};

mod commands;
mod output;

use commands::analyze::AnalyzeArgs;
use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Dependency closure analysis for package repositories
#[derive(Parser)]
#[command(name = "depclose", version, about = "Dependency closure analysis for package repositories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file to use instead of the discovered depclose.toml
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the runtime and build-requirement closures
    Analyze(AnalyzeArgs),
    /// Show why a source package is part of the closure
    Explain {
        /// Source package name
        source: String,
        /// Explain the build-requirement closure instead of the runtime one
        #[arg(long)]
        buildreq: bool,
        /// Release substituted into repository locations
        #[arg(short, long)]
        release: Option<String>,
    },
    /// Print the effective configuration
    Config,
    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting depclose v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", ErrorFormatter::new().format_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> DepcloseResult<()> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| DepcloseError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async {
        let ctx = CommandContext::new(cli.config)?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

/// Logs go to stderr so stdout carries only the report document
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default_filter = [
        "depclose",
        "depclose_core",
        "depclose_config",
        "depclose_metadata",
        "depclose_resolver",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .collect::<Vec<_>>()
    .join(",");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("depclose encountered an unexpected error: {}", panic_info);
        eprintln!("depclose crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/depclose/depclose/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
