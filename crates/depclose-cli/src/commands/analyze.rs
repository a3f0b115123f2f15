//! `depclose analyze` command implementation.
//!
//! Loads the repository metadata, computes the enabled closures and writes
//! the sorted report document. Nothing is written when any step fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use serde::Serialize;

use depclose_core::error::{DepcloseError, DepcloseResult};
use depclose_core::DependencyClass;
use depclose_resolver::{Analysis, ClosureResolver, DependencyReport, ReportDocument};

use super::{analysis_request, run_blocking, CommandContext};

#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Release substituted into repository locations
    #[arg(short, long)]
    pub release: Option<String>,

    /// Only emit the entry of this source package
    #[arg(short, long, value_name = "NAME")]
    pub package: Option<String>,

    /// Skip the runtime closure
    #[arg(long)]
    pub disable_runtime: bool,

    /// Skip the build-requirement closure
    #[arg(long)]
    pub disable_buildreqs: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Also write unsatisfied requirements to this file
    #[arg(long, value_name = "FILE")]
    pub unsatisfied_report: Option<PathBuf>,

    /// Resolve providers on a single thread
    #[arg(long)]
    pub sequential: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
}

impl AnalyzeArgs {
    /// Flags mapped to configuration overrides
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(release) = &self.release {
            overrides.insert("release".to_string(), release.clone());
        }
        if self.disable_runtime {
            overrides.insert("runtime".to_string(), "false".to_string());
        }
        if self.disable_buildreqs {
            overrides.insert("buildreq".to_string(), "false".to_string());
        }
        if self.sequential {
            overrides.insert("parallel".to_string(), "false".to_string());
        }
        overrides
    }
}

/// Execute the `depclose analyze` command
pub async fn execute(args: AnalyzeArgs, ctx: &CommandContext) -> DepcloseResult<()> {
    let start_time = Instant::now();
    let config = ctx.load_config(&args.overrides()).await?;

    if !config.resolution.runtime && !config.resolution.buildreq {
        ctx.output
            .warn("Both runtime and build-requirement analysis are disabled");
        return write_empty(&args, ctx).await;
    }

    let pools = ctx.load_pools(&config).await?;

    ctx.output.step("==>", "Resolving dependency closure");
    let request = analysis_request(&config);
    let analysis = run_blocking(move || ClosureResolver::new(&pools).analyze(&request)).await?;

    let report = analysis.report();
    let document = match &args.package {
        Some(name) => {
            let entry = report.for_package(name);
            if matches!(&entry, ReportDocument::Package(e) if e.is_empty()) {
                ctx.output
                    .warn(&format!("'{}' is not part of any computed closure", name));
            }
            entry
        }
        None => report.document(),
    };

    // render everything before writing anything
    let rendered = render(&document, args.format)?;
    let unsatisfied = match &args.unsatisfied_report {
        Some(path) => Some((path, render(&analysis.unsatisfied_report().document(), args.format)?)),
        None => None,
    };

    match &args.output {
        Some(path) => write_file(path, &rendered).await?,
        None => ctx.output.document(&rendered)?,
    }
    if let Some((path, content)) = unsatisfied {
        write_file(path, &content).await?;
    }

    summarize(&analysis, ctx);
    ctx.output.success(&format!(
        "Analysis finished in {:.2}s",
        start_time.elapsed().as_secs_f64()
    ));
    Ok(())
}

/// Emit the empty documents without touching any repository
async fn write_empty(args: &AnalyzeArgs, ctx: &CommandContext) -> DepcloseResult<()> {
    let rendered = render(&DependencyReport::default().document(), args.format)?;
    match &args.output {
        Some(path) => write_file(path, &rendered).await?,
        None => ctx.output.document(&rendered)?,
    }
    if let Some(path) = &args.unsatisfied_report {
        write_file(path, &rendered).await?;
    }
    Ok(())
}

/// Render a document in the requested format
pub fn render(document: &ReportDocument, format: OutputFormat) -> DepcloseResult<String> {
    match format {
        OutputFormat::Json => document.to_json(),
        OutputFormat::Toml => render_toml(document),
    }
}

fn render_toml<T: Serialize>(document: &T) -> DepcloseResult<String> {
    toml::to_string_pretty(document).map_err(|e| DepcloseError::Serialization {
        what: "dependency report".to_string(),
        message: e.to_string(),
    })
}

async fn write_file(path: &Path, content: &str) -> DepcloseResult<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| DepcloseError::io(format!("Failed to write {}", path.display()), e))
}

fn summarize(analysis: &Analysis, ctx: &CommandContext) {
    for class in DependencyClass::ALL {
        if let Some(outcome) = analysis.outcome(class) {
            ctx.output.info(&format!(
                "{}: {} source packages, {} unsatisfied requirements, {} passes in {}ms",
                class,
                outcome.closure.len(),
                outcome.unsatisfied.len(),
                outcome.passes,
                outcome.resolution_time_ms
            ));
        }
    }
}
