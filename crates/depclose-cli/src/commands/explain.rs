//! `depclose explain` command implementation.
//!
//! Resolves one closure and prints the shortest requester chain that pulls
//! the given source package into it.

use std::collections::HashMap;

use depclose_core::error::DepcloseResult;
use depclose_core::DependencyClass;
use depclose_resolver::{ClosureGraph, ClosureResolver, ResolveOptions};

use super::{run_blocking, CommandContext};

/// Execute the `depclose explain` command
pub async fn execute(
    source: &str,
    buildreq: bool,
    release: Option<String>,
    ctx: &CommandContext,
) -> DepcloseResult<()> {
    let overrides: HashMap<String, String> = release
        .map(|release| HashMap::from([("release".to_string(), release)]))
        .unwrap_or_default();
    let config = ctx.load_config(&overrides).await?;
    let pools = ctx.load_pools(&config).await?;

    let class = if buildreq {
        DependencyClass::BuildReq
    } else {
        DependencyClass::Runtime
    };
    let options = ResolveOptions {
        class,
        seeds: config.seeds.packages.clone(),
        unsatisfied: config.resolution.unsatisfied,
        parallel: config.resolution.parallel,
        max_passes: config.resolution.max_passes,
    };

    ctx.output
        .step("==>", &format!("Resolving {} closure", class));
    let outcome = run_blocking(move || ClosureResolver::new(&pools).resolve(&options)).await?;

    match explanation(&outcome.graph, source) {
        Some(chain) => ctx.output.document(&format!("{}\n", chain)),
        None => {
            ctx.output.warn(&format!(
                "'{}' is not part of the {} closure",
                source, class
            ));
            Ok(())
        }
    }
}

/// Rendered requester chain of a source, if it is in the closure
pub fn explanation(graph: &ClosureGraph, source: &str) -> Option<String> {
    graph
        .explain(source)
        .map(|chain| ClosureGraph::format_chain(&chain))
}
