//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

use depclose_core::PackageRecord;
use depclose_metadata::RepositoryPools;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(50)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Synthetic repository with `primary` root packages over `width` layers
/// of `depth` dependency packages each.
///
/// Every package in layer `d` requires three capabilities of layer `d + 1`
/// and shares its source with one neighbour, so folds exercise attribution
/// unions and sibling expansion.
pub fn synthetic_pools(primary: usize, width: usize, depth: usize) -> RepositoryPools {
    let capability = |layer: usize, idx: usize| format!("lib{}_{}.so", layer, idx % width);
    let source = |layer: usize, idx: usize| format!("src{}_{}", layer, idx / 2);

    let roots = (0..primary).map(|idx| {
        PackageRecord::new(
            format!("root{}", idx),
            "1.0-1",
            "x86_64",
            "primary",
            "primary-1.0-1.src.rpm",
        )
        .with_requires(capability(0, idx))
        .with_requires(capability(0, idx * 7 + 1))
    });

    let mut binaries = Vec::with_capacity(width * depth);
    let mut sources = Vec::with_capacity(width * depth / 2 + 1);
    for layer in 0..depth {
        for idx in 0..width {
            let source_name = source(layer, idx);
            let mut package = PackageRecord::new(
                format!("pkg{}_{}", layer, idx),
                "1.0-1",
                "x86_64",
                source_name.clone(),
                format!("{}-1.0-1.src.rpm", source_name),
            )
            .with_provides(capability(layer, idx));

            if layer + 1 < depth {
                for step in [0, 3, 11] {
                    package = package.with_requires(capability(layer + 1, idx + step));
                }
            }
            binaries.push(package);

            if idx % 2 == 0 {
                sources.push(
                    PackageRecord::new(
                        source_name.clone(),
                        "1.0-1",
                        "src",
                        source_name.clone(),
                        format!("{}-1.0-1.src.rpm", source_name),
                    )
                    .with_requires(capability(layer, idx + 5)),
                );
            }
        }
    }

    RepositoryPools::new(roots.collect::<Vec<_>>(), binaries, sources)
}
