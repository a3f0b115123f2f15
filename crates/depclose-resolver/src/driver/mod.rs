//! Fixed-point closure driver
//!
//! Seeds the working set from the primary repository and the seed list,
//! then runs breadth-first passes of requirement extraction and capability
//! resolution until a pass ends with the working set unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use depclose_core::error::DepcloseError;
use depclose_core::{
    DependencyClass, PackageRecord, Requirement, UnsatisfiedPolicy, REQUIRED_MARKER,
};
use depclose_metadata::{ArchFilter, QueryFilter};

use crate::capability::{CapabilityResolver, PoolSet};
use crate::closure::ClosureState;
use crate::graph::ClosureGraph;
use crate::report::{assemble, DependencyReport, SourceClosure};
use crate::ResolverResult;

/// Options of one closure resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub class: DependencyClass,
    /// Capabilities always required regardless of primary content
    pub seeds: Vec<String>,
    pub unsatisfied: UnsatisfiedPolicy,
    /// Fan provider lookups of a pass out on the rayon pool
    pub parallel: bool,
    /// Abort when no fixed point is reached after this many passes
    pub max_passes: Option<usize>,
}

impl ResolveOptions {
    pub fn new(class: DependencyClass) -> Self {
        Self {
            class,
            seeds: Vec::new(),
            unsatisfied: UnsatisfiedPolicy::default(),
            parallel: true,
            max_passes: None,
        }
    }

    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds = seeds.into_iter().map(Into::into).collect();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Result of one converged resolution
#[derive(Debug)]
pub struct ClosureOutcome {
    pub class: DependencyClass,
    /// Source name -> sorted requesters
    pub closure: SourceClosure,
    /// Requirement -> sorted requesters, for requirements nothing provides
    pub unsatisfied: SourceClosure,
    /// Passes run, including the final pass that found nothing new
    pub passes: usize,
    pub working_set_size: usize,
    pub graph: ClosureGraph,
    pub resolution_time_ms: u64,
}

/// Closure resolver over a set of pools
pub struct ClosureResolver<'a> {
    pools: PoolSet<'a>,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(pools: impl Into<PoolSet<'a>>) -> Self {
        Self {
            pools: pools.into(),
        }
    }

    /// Compute the closure of one dependency class from scratch
    pub fn resolve(&self, options: &ResolveOptions) -> ResolverResult<ClosureOutcome> {
        self.resolve_from(ClosureState::new(), options)
    }

    /// Compute the closure starting from an existing state
    pub fn resolve_from(
        &self,
        mut state: ClosureState,
        options: &ResolveOptions,
    ) -> ResolverResult<ClosureOutcome> {
        let start_time = Instant::now();
        let capabilities = CapabilityResolver::new(self.pools);

        self.seed_primary(&mut state, options.class)?;
        self.inject_seeds(&mut state, &capabilities, options)?;
        info!(
            "Resolving {} closure from {} packages",
            options.class,
            state.working_set_len()
        );

        let mut passes = 0;
        loop {
            if let Some(limit) = options.max_passes {
                if passes >= limit {
                    return Err(DepcloseError::PassLimitExceeded {
                        limit,
                        working_set: state.working_set_len(),
                        resolved: state.resolved_len(),
                    });
                }
            }

            passes += 1;
            let size_before = state.working_set_len();
            self.run_pass(&mut state, &capabilities, options)?;
            let size_after = state.working_set_len();

            info!(
                "{} pass {}: working set {} -> {}, {} sources",
                options.class,
                passes,
                size_before,
                size_after,
                state.resolved_len()
            );

            if size_after == size_before {
                break;
            }
        }

        let working_set_size = state.working_set_len();
        let (resolved, unsatisfied, graph) = state.into_parts();
        let resolution_time_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "{} closure converged after {} passes: {} sources, {} unsatisfied requirements",
            options.class,
            passes,
            resolved.len(),
            unsatisfied.len()
        );

        Ok(ClosureOutcome {
            class: options.class,
            closure: assemble(&resolved),
            unsatisfied: assemble(&unsatisfied),
            passes,
            working_set_size,
            graph,
            resolution_time_ms,
        })
    }

    /// Primary packages of the requested class
    fn seed_primary(&self, state: &mut ClosureState, class: DependencyClass) -> ResolverResult<()> {
        let arch = if class.scans_sources() {
            ArchFilter::sources()
        } else {
            ArchFilter::binaries()
        };
        let filter = QueryFilter {
            arch,
            ..QueryFilter::default()
        };

        for package in self.pools.primary.query(&filter)? {
            state.graph_mut().add_root(&package.name);
            state.enqueue(package);
        }
        Ok(())
    }

    /// Resolve the seed list and attribute it to the required marker
    fn inject_seeds(
        &self,
        state: &mut ClosureState,
        capabilities: &CapabilityResolver<'_>,
        options: &ResolveOptions,
    ) -> ResolverResult<()> {
        if options.seeds.is_empty() {
            return Ok(());
        }

        state.graph_mut().add_root(REQUIRED_MARKER);
        let marker = BTreeSet::from([REQUIRED_MARKER.to_string()]);

        for seed in &options.seeds {
            let providers = capabilities.providers(seed)?;
            if providers.is_empty() {
                self.report_unsatisfied(options.unsatisfied, seed, &marker);
                state.mark_unsatisfied(seed, &marker);
                continue;
            }
            for provider in providers {
                self.fold_candidate(state, capabilities, options.class, seed, &provider, &marker)?;
            }
        }
        Ok(())
    }

    /// One breadth-first layer over the packages present at pass start
    fn run_pass(
        &self,
        state: &mut ClosureState,
        capabilities: &CapabilityResolver<'_>,
        options: &ResolveOptions,
    ) -> ResolverResult<()> {
        let scanned = state.scan_unscanned();
        let pending = state.take_pending();
        debug!(
            "Scanned {} packages, {} pending requirements",
            scanned,
            pending.len()
        );

        let lookups = self.lookup_providers(capabilities, &pending, options.parallel)?;

        // single writer: fold every lookup in sorted requirement order
        for (requirement, providers) in lookups {
            let requesters = state.requesters(&requirement);
            if providers.is_empty() {
                self.report_unsatisfied(options.unsatisfied, &requirement, &requesters);
                state.mark_unsatisfied(&requirement, &requesters);
                continue;
            }
            for provider in &providers {
                self.fold_candidate(
                    state,
                    capabilities,
                    options.class,
                    &requirement,
                    provider,
                    &requesters,
                )?;
            }
        }
        Ok(())
    }

    fn lookup_providers(
        &self,
        capabilities: &CapabilityResolver<'_>,
        pending: &[Requirement],
        parallel: bool,
    ) -> ResolverResult<Vec<(Requirement, Vec<PackageRecord>)>> {
        let lookup = |requirement: &Requirement| {
            capabilities
                .providers(requirement)
                .map(|providers| (requirement.clone(), providers))
        };

        if parallel {
            pending.par_iter().map(lookup).collect()
        } else {
            pending.iter().map(lookup).collect()
        }
    }

    /// Fold one providing package into the state
    fn fold_candidate(
        &self,
        state: &mut ClosureState,
        capabilities: &CapabilityResolver<'_>,
        class: DependencyClass,
        requirement: &str,
        provider: &PackageRecord,
        requesters: &BTreeSet<String>,
    ) -> ResolverResult<()> {
        for requester in requesters {
            state
                .graph_mut()
                .record_requirement(requester, requirement, &provider.source_name);
        }

        if state.merge_resolved(&provider.source_name, requesters) {
            debug!(
                "'{}' pulls in source {} via {}",
                requirement, provider.source_name, provider
            );
            for sibling in capabilities.siblings(provider)? {
                state
                    .graph_mut()
                    .record_build(&provider.source_name, &sibling.name);
                state.enqueue(sibling);
            }
            if class == DependencyClass::BuildReq {
                let source = capabilities.source_package(provider)?;
                state
                    .graph_mut()
                    .record_build(&provider.source_name, &source.name);
                state.enqueue(source);
            }
        }

        state
            .graph_mut()
            .record_build(&provider.source_name, &provider.name);
        state.enqueue(provider.clone());
        Ok(())
    }

    fn report_unsatisfied(
        &self,
        policy: UnsatisfiedPolicy,
        requirement: &str,
        requesters: &BTreeSet<String>,
    ) {
        let requesters: Vec<&str> = requesters.iter().map(String::as_str).collect();
        match policy {
            UnsatisfiedPolicy::Warn => warn!(
                "Nothing provides '{}' (required by {})",
                requirement,
                requesters.join(", ")
            ),
            UnsatisfiedPolicy::Ignore => debug!(
                "Nothing provides '{}' (required by {})",
                requirement,
                requesters.join(", ")
            ),
        }
    }

    /// Run every enabled class and collect the results
    pub fn analyze(&self, request: &AnalysisRequest) -> ResolverResult<Analysis> {
        let mut analysis = Analysis::default();
        for class in DependencyClass::ALL {
            if !request.includes(class) {
                continue;
            }
            let options = ResolveOptions {
                class,
                seeds: request.seeds.clone(),
                unsatisfied: request.unsatisfied,
                parallel: request.parallel,
                max_passes: request.max_passes,
            };
            let outcome = self.resolve(&options)?;
            match class {
                DependencyClass::Runtime => analysis.runtime = Some(outcome),
                DependencyClass::BuildReq => analysis.buildreq = Some(outcome),
            }
        }
        Ok(analysis)
    }
}

/// Mode selection and shared options for a full analysis
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub runtime: bool,
    pub buildreq: bool,
    pub seeds: Vec<String>,
    pub unsatisfied: UnsatisfiedPolicy,
    pub parallel: bool,
    pub max_passes: Option<usize>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            runtime: true,
            buildreq: true,
            seeds: Vec::new(),
            unsatisfied: UnsatisfiedPolicy::default(),
            parallel: true,
            max_passes: None,
        }
    }
}

impl AnalysisRequest {
    pub fn includes(&self, class: DependencyClass) -> bool {
        match class {
            DependencyClass::Runtime => self.runtime,
            DependencyClass::BuildReq => self.buildreq,
        }
    }
}

/// Outcomes of the enabled classes
#[derive(Debug, Default)]
pub struct Analysis {
    pub runtime: Option<ClosureOutcome>,
    pub buildreq: Option<ClosureOutcome>,
}

impl Analysis {
    pub fn outcome(&self, class: DependencyClass) -> Option<&ClosureOutcome> {
        match class {
            DependencyClass::Runtime => self.runtime.as_ref(),
            DependencyClass::BuildReq => self.buildreq.as_ref(),
        }
    }

    /// Sorted closures of the enabled classes
    pub fn report(&self) -> DependencyReport {
        DependencyReport::new(
            self.runtime.as_ref().map(|o| o.closure.clone()),
            self.buildreq.as_ref().map(|o| o.closure.clone()),
        )
    }

    /// Unsatisfied requirements of the enabled classes
    pub fn unsatisfied_report(&self) -> DependencyReport {
        DependencyReport::new(
            self.runtime.as_ref().map(|o| o.unsatisfied.clone()),
            self.buildreq.as_ref().map(|o| o.unsatisfied.clone()),
        )
    }

    /// Unsatisfied requirement counts keyed by class name
    pub fn unsatisfied_counts(&self) -> BTreeMap<&'static str, usize> {
        DependencyClass::ALL
            .iter()
            .filter_map(|class| {
                self.outcome(*class)
                    .map(|outcome| (class.as_str(), outcome.unsatisfied.len()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
