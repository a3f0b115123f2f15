//! Command implementations and dispatch logic.
//!
//! Each command is implemented as an async function that takes a
//! CommandContext.

use std::collections::HashMap;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use tracing::{debug, info};

use depclose_config::{ConfigLayering, ConfigLoader, DepcloseConfig};
use depclose_core::error::{DepcloseError, DepcloseResult};
use depclose_metadata::{MetadataClient, RepositoryPools, RetryConfig};
use depclose_resolver::AnalysisRequest;

pub mod analyze;
pub mod explain;


use crate::output::OutputHandler;
use crate::Commands;

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub config_path: Option<Utf8PathBuf>,
    pub global_config: Option<Utf8PathBuf>,
    pub env_overrides: HashMap<String, String>,
    pub output: OutputHandler,
}

impl CommandContext {
    /// Create a new command context
    pub fn new(config_path: Option<PathBuf>) -> DepcloseResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| DepcloseError::io("Failed to get current directory".to_string(), e))?;

        Ok(Self {
            cwd: utf8_path(cwd)?,
            config_path: config_path.map(utf8_path).transpose()?,
            global_config: ConfigLoader::default_global_path(),
            env_overrides: ConfigLayering::collect_env_overrides(),
            output: OutputHandler::new(),
        })
    }

    /// Load the layered configuration with command-line overrides on top
    pub async fn load_config(
        &self,
        cli_overrides: &HashMap<String, String>,
    ) -> DepcloseResult<DepcloseConfig> {
        let loader =
            ConfigLoader::new(self.cwd.clone()).with_global_path(self.global_config.clone());
        let (mut config, sources) = loader
            .load(self.config_path.as_deref(), &self.env_overrides)
            .await?;

        for source in &sources {
            debug!("Configuration layer: {}", source);
        }

        if !cli_overrides.is_empty() {
            ConfigLayering::apply_cli_overrides(&mut config, cli_overrides)?;
            depclose_config::toml::validate_config(&config)?;
        }
        Ok(config)
    }

    /// Load every repository pool of the configured layout
    pub async fn load_pools(&self, config: &DepcloseConfig) -> DepcloseResult<RepositoryPools> {
        let layout = config.layout();
        self.output
            .step("==>", &format!("Loading metadata for release {}", config.release));
        MetadataClient::with_config(config.auth(), RetryConfig::default())?
            .load_pools(&layout)
            .await
    }
}

/// Run a CPU-bound resolution on the blocking thread pool
pub async fn run_blocking<T, F>(task: F) -> DepcloseResult<T>
where
    F: FnOnce() -> DepcloseResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        DepcloseError::io("Resolver task failed".to_string(), std::io::Error::other(e))
    })?
}

fn utf8_path(path: PathBuf) -> DepcloseResult<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| {
        DepcloseError::config("path", format!("{} is not valid UTF-8", path.display()))
    })
}

/// Resolver request for the configured modes
pub fn analysis_request(config: &DepcloseConfig) -> AnalysisRequest {
    AnalysisRequest {
        runtime: config.resolution.runtime,
        buildreq: config.resolution.buildreq,
        seeds: config.seeds.packages.clone(),
        unsatisfied: config.resolution.unsatisfied,
        parallel: config.resolution.parallel,
        max_passes: config.resolution.max_passes,
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> DepcloseResult<()> {
    match command {
        Commands::Analyze(args) => {
            info!("Analyzing dependency closure");
            analyze::execute(args, ctx).await
        }
        Commands::Explain {
            source,
            buildreq,
            release,
        } => {
            info!("Explaining source package: {}", source);
            explain::execute(&source, buildreq, release, ctx).await
        }
        Commands::Config => show_config(ctx).await,
        Commands::Version => show_version(ctx),
    }
}

async fn show_config(ctx: &CommandContext) -> DepcloseResult<()> {
    let config = ctx.load_config(&HashMap::new()).await?;
    let rendered = depclose_config::toml::serialize_config(&config)?;
    ctx.output.document(&rendered)
}

fn show_version(ctx: &CommandContext) -> DepcloseResult<()> {
    ctx.output.document(&version_text())
}

pub fn version_text() -> String {
    format!(
        "depclose v{}\nBuilt: {}\nTarget: {}\nRust: {}\n",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE"),
        env!("BUILD_TARGET"),
        env!("RUSTC_VERSION"),
    )
}
