//! Closure resolution performance benchmarks
//!
//! Measures full fixed-point resolution on synthetic repositories, in
//! parallel and sequential mode, plus the pool lookups it is built on.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use depclose_benchmarks::{criterion_config, synthetic_pools};
use depclose_core::DependencyClass;
use depclose_metadata::{MetadataSource, QueryFilter};
use depclose_resolver::{ClosureResolver, ResolveOptions};

/// Runtime closure over growing repositories
fn bench_runtime_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_closure");
    group.sample_size(10);

    for width in [100, 1000, 5000] {
        let pools = synthetic_pools(50, width, 8);
        group.throughput(Throughput::Elements(pools.binaries.len() as u64));

        for (label, options) in [
            ("parallel", ResolveOptions::new(DependencyClass::Runtime)),
            ("sequential", ResolveOptions::new(DependencyClass::Runtime).sequential()),
        ] {
            group.bench_with_input(BenchmarkId::new(label, width), &pools, |b, pools| {
                b.iter(|| {
                    let outcome = ClosureResolver::new(pools).resolve(&options).unwrap();
                    black_box(outcome.closure.len())
                });
            });
        }
    }

    group.finish();
}

/// Build-requirement closure, which also walks source packages
fn bench_buildreq_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("buildreq_closure");
    group.sample_size(10);

    for width in [100, 1000] {
        let mut pools = synthetic_pools(50, width, 6);
        // build requirements start from the primary sources
        pools.primary = depclose_metadata::PackagePool::from_records(
            pools.sources.packages().iter().take(50).cloned().collect::<Vec<_>>(),
        );

        group.bench_with_input(BenchmarkId::new("packages", width), &pools, |b, pools| {
            let options = ResolveOptions::new(DependencyClass::BuildReq);
            b.iter(|| {
                let outcome = ClosureResolver::new(pools).resolve(&options).unwrap();
                black_box(outcome.passes)
            });
        });
    }

    group.finish();
}

/// Indexed pool queries
fn bench_pool_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_queries");
    let pools = synthetic_pools(10, 5000, 4);
    let capabilities: Vec<String> = (0..1000).map(|idx| format!("lib2_{}.so", idx)).collect();

    group.bench_function("provides", |b| {
        let mut index = 0;
        b.iter(|| {
            let filter = QueryFilter::new()
                .provides(capabilities[index % capabilities.len()].as_str())
                .arch_neq("src");
            index += 1;
            black_box(pools.binaries.query(&filter).unwrap())
        });
    });

    group.bench_function("source_identifier", |b| {
        let mut index = 0;
        b.iter(|| {
            let filter = QueryFilter::new()
                .source_identifier(format!("src1_{}-1.0-1.src.rpm", index % 2500));
            index += 1;
            black_box(pools.binaries.query(&filter).unwrap())
        });
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_runtime_closure, bench_buildreq_closure, bench_pool_queries
}
criterion_main!(benches);
