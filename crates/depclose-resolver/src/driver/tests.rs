use super::*;
use depclose_metadata::{MetadataResult, MetadataSource, PackagePool, RepositoryPools};

fn bin(name: &str, source: &str) -> PackageRecord {
    PackageRecord::new(name, "1.0-1", "x86_64", source, format!("{}-1.0-1.src.rpm", source))
}

fn src(name: &str) -> PackageRecord {
    PackageRecord::new(name, "1.0-1", "src", name, format!("{}-1.0-1.src.rpm", name))
}

fn closure(entries: &[(&str, &[&str])]) -> SourceClosure {
    entries
        .iter()
        .map(|(source, requesters)| {
            (
                source.to_string(),
                requesters.iter().map(|r| r.to_string()).collect(),
            )
        })
        .collect()
}

/// A -> libfoo (foo-lib, foo-src) -> libbar (bar-lib, bar-src)
fn chain_pools() -> RepositoryPools {
    RepositoryPools::new(
        vec![bin("A", "a").with_requires("libfoo")],
        vec![
            bin("foo-lib", "foo-src")
                .with_provides("libfoo")
                .with_requires("libbar"),
            bin("bar-lib", "bar-src").with_provides("libbar"),
        ],
        Vec::new(),
    )
}

fn runtime() -> ResolveOptions {
    ResolveOptions::new(DependencyClass::Runtime)
}

#[test]
fn test_transitive_runtime_closure() {
    let pools = chain_pools();
    let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();

    assert_eq!(
        outcome.closure,
        closure(&[("bar-src", &["foo-lib"]), ("foo-src", &["A"])])
    );
    assert!(outcome.unsatisfied.is_empty());
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.working_set_size, 3);
}

#[test]
fn test_seed_is_attributed_to_required_marker() {
    let pools = RepositoryPools::new(
        Vec::new(),
        vec![bin("cache-server", "cache-src")],
        Vec::new(),
    );
    let options = runtime().with_seeds(["cache-server"]);
    let outcome = ClosureResolver::new(&pools).resolve(&options).unwrap();

    assert_eq!(outcome.closure, closure(&[("cache-src", &[REQUIRED_MARKER])]));
}

#[test]
fn test_unmatched_seed_is_unsatisfied() {
    let pools = chain_pools();
    let options = runtime().with_seeds(["no-such-package"]);
    let outcome = ClosureResolver::new(&pools).resolve(&options).unwrap();

    assert_eq!(
        outcome.unsatisfied,
        closure(&[("no-such-package", &[REQUIRED_MARKER])])
    );
    assert_eq!(outcome.closure.len(), 2);
}

#[test]
fn test_requesters_are_unioned() {
    let pools = RepositoryPools::new(
        vec![
            bin("A1", "a").with_requires("libfoo"),
            bin("A2", "a").with_requires("libfoo"),
        ],
        vec![bin("foo-lib", "foo-src").with_provides("libfoo")],
        Vec::new(),
    );
    let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();

    assert_eq!(outcome.closure, closure(&[("foo-src", &["A1", "A2"])]));
}

#[test]
fn test_requesters_discovered_in_later_passes_are_unioned() {
    let pools = RepositoryPools::new(
        vec![bin("A", "a").with_requires("libbar").with_requires("libfoo")],
        vec![
            bin("foo-lib", "foo-src").with_provides("libfoo"),
            bin("bar-lib", "bar-src")
                .with_provides("libbar")
                .with_requires("libfoo"),
        ],
        Vec::new(),
    );
    let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();

    assert_eq!(
        outcome.closure,
        closure(&[("bar-src", &["A"]), ("foo-src", &["A", "bar-lib"])])
    );
}

#[test]
fn test_siblings_join_the_working_set() {
    let pools = RepositoryPools::new(
        vec![bin("A", "a").with_requires("libfoo")],
        vec![
            bin("foo-lib", "foo-src").with_provides("libfoo"),
            bin("foo-tools", "foo-src").with_requires("perl"),
            bin("perl", "perl-src"),
        ],
        Vec::new(),
    );
    let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();

    assert_eq!(
        outcome.closure,
        closure(&[("foo-src", &["A"]), ("perl-src", &["foo-tools"])])
    );
}

#[test]
fn test_buildreq_closure_follows_source_packages() {
    let pools = RepositoryPools::new(
        vec![
            bin("a", "a").with_requires("glibc"),
            src("a").with_requires("gcc"),
        ],
        vec![bin("gcc", "gcc"), bin("make", "make")],
        vec![src("gcc").with_requires("make"), src("make")],
    );
    let options = ResolveOptions::new(DependencyClass::BuildReq);
    let outcome = ClosureResolver::new(&pools).resolve(&options).unwrap();

    assert_eq!(outcome.closure, closure(&[("gcc", &["a"]), ("make", &["gcc"])]));
}

#[test]
fn test_buildreq_missing_source_package_is_fatal() {
    let pools = RepositoryPools::new(
        vec![src("a").with_requires("gcc")],
        vec![bin("gcc", "gcc")],
        Vec::new(),
    );
    let options = ResolveOptions::new(DependencyClass::BuildReq);
    let err = ClosureResolver::new(&pools).resolve(&options).unwrap_err();

    assert!(matches!(
        err,
        DepcloseError::MissingSourcePackage { ref binary, .. } if binary == "gcc"
    ));
}

#[test]
fn test_buildreq_seed_pulls_in_its_source_package() {
    let pools = RepositoryPools::new(
        Vec::new(),
        vec![bin("cache-server", "cache-src"), bin("autoconf", "autoconf")],
        vec![src("cache-src").with_requires("autoconf"), src("autoconf")],
    );
    let options = ResolveOptions::new(DependencyClass::BuildReq).with_seeds(["cache-server"]);
    let outcome = ClosureResolver::new(&pools).resolve(&options).unwrap();

    // autoconf is only reachable through the build requirements of cache-src
    assert_eq!(
        outcome.closure,
        closure(&[("autoconf", &["cache-src"]), ("cache-src", &[REQUIRED_MARKER])])
    );
    assert_eq!(
        outcome.graph.explain("cache-src").map(|c| ClosureGraph::format_chain(&c)),
        Some("required --(cache-server)--> [cache-src]".to_string())
    );
}

#[test]
fn test_buildreq_seed_without_source_package_is_fatal() {
    let pools = RepositoryPools::new(
        Vec::new(),
        vec![bin("cache-server", "cache-src")],
        Vec::new(),
    );
    let options = ResolveOptions::new(DependencyClass::BuildReq).with_seeds(["cache-server"]);
    let err = ClosureResolver::new(&pools).resolve(&options).unwrap_err();

    assert!(matches!(
        err,
        DepcloseError::MissingSourcePackage { ref binary, ref source_name }
            if binary == "cache-server" && source_name == "cache-src"
    ));
}

#[test]
fn test_unsatisfied_requirements_are_recorded() {
    let pools = RepositoryPools::new(
        vec![bin("A", "a").with_requires("libgone")],
        Vec::new(),
        Vec::new(),
    );

    for policy in [UnsatisfiedPolicy::Warn, UnsatisfiedPolicy::Ignore] {
        let options = ResolveOptions {
            unsatisfied: policy,
            ..runtime()
        };
        let outcome = ClosureResolver::new(&pools).resolve(&options).unwrap();
        assert!(outcome.closure.is_empty());
        assert_eq!(outcome.unsatisfied, closure(&[("libgone", &["A"])]));
    }
}

struct FailingSource;

impl MetadataSource for FailingSource {
    fn query(&self, _filter: &QueryFilter) -> MetadataResult<Vec<PackageRecord>> {
        Err(DepcloseError::network(
            "repository went away".to_string(),
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        ))
    }
}

#[test]
fn test_query_failure_aborts_resolution() {
    let primary = PackagePool::from_records(vec![bin("A", "a").with_requires("libfoo")]);
    let empty = PackagePool::default();
    let pools = PoolSet::new(&primary, &FailingSource, &empty);

    let err = ClosureResolver::new(pools).resolve(&runtime()).unwrap_err();
    assert!(matches!(err, DepcloseError::Network { .. }));
}

#[test]
fn test_pass_limit() {
    let pools = chain_pools();
    let options = ResolveOptions {
        max_passes: Some(1),
        ..runtime()
    };
    let err = ClosureResolver::new(&pools).resolve(&options).unwrap_err();
    assert!(matches!(err, DepcloseError::PassLimitExceeded { limit: 1, .. }));

    let options = ResolveOptions {
        max_passes: Some(3),
        ..runtime()
    };
    assert!(ClosureResolver::new(&pools).resolve(&options).is_ok());
}

#[test]
fn test_resolving_from_prior_closure_is_idempotent() {
    let pools = chain_pools();
    let resolver = ClosureResolver::new(&pools);
    let first = resolver.resolve(&runtime()).unwrap();

    let prior = ClosureState::with_resolved(first.closure.clone());
    let second = resolver.resolve_from(prior, &runtime()).unwrap();
    assert_eq!(first.closure, second.closure);
}

#[test]
fn test_output_is_deterministic() {
    let pools = RepositoryPools::new(
        vec![
            bin("Z", "z").with_requires("libfoo").with_requires("libbar"),
            bin("A", "a").with_requires("libbar").with_requires("libfoo"),
        ],
        vec![
            bin("foo-lib", "foo-src").with_provides("libfoo"),
            bin("foo-compat", "foo-compat-src").with_provides("libfoo"),
            bin("bar-lib", "bar-src")
                .with_provides("libbar")
                .with_requires("libfoo"),
        ],
        Vec::new(),
    );
    let resolver = ClosureResolver::new(&pools);

    let render = |options: &ResolveOptions| {
        let outcome = resolver.resolve(options).unwrap();
        DependencyReport::new(Some(outcome.closure), None)
            .document()
            .to_json()
            .unwrap()
    };

    let parallel = render(&runtime());
    assert_eq!(parallel, render(&runtime()));
    assert_eq!(parallel, render(&runtime().sequential()));
}

#[test]
fn test_explain_resolved_source() {
    let pools = chain_pools();
    let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();

    let chain = outcome.graph.explain("bar-src").unwrap();
    assert_eq!(
        ClosureGraph::format_chain(&chain),
        "A --(libfoo)--> [foo-src] --> foo-lib --(libbar)--> [bar-src]"
    );
}

#[test]
fn test_analyze_both_classes() {
    let pools = RepositoryPools::new(
        vec![
            bin("a", "a").with_requires("libfoo").with_requires("libgone"),
            src("a").with_requires("gcc"),
        ],
        vec![bin("foo-lib", "foo").with_provides("libfoo"), bin("gcc", "gcc")],
        vec![src("gcc")],
    );

    let analysis = ClosureResolver::new(&pools)
        .analyze(&AnalysisRequest::default())
        .unwrap();

    let report = analysis.report();
    assert_eq!(report.runtime, Some(closure(&[("foo", &["a"])])));
    assert_eq!(report.buildreq, Some(closure(&[("gcc", &["a"])])));
    assert_eq!(analysis.unsatisfied_counts()["runtime"], 1);
    assert_eq!(analysis.unsatisfied_counts()["buildreq"], 0);

    let runtime_only = AnalysisRequest {
        buildreq: false,
        ..AnalysisRequest::default()
    };
    let analysis = ClosureResolver::new(&pools).analyze(&runtime_only).unwrap();
    assert!(analysis.buildreq.is_none());
    assert!(analysis.runtime.is_some());
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Primary package requiring cap0 plus `n` packages where pkg{i}
    /// provides cap{i} and requires cap{j} for each forward edge (i, j)
    fn layered(n: usize, edges: &[(usize, usize)]) -> (RepositoryPools, Vec<Vec<usize>>) {
        let mut adjacency = vec![Vec::new(); n];
        for &(i, j) in edges {
            if i < j && j < n && !adjacency[i].contains(&j) {
                adjacency[i].push(j);
            }
        }

        let binaries = (0..n).map(|i| {
            adjacency[i].iter().fold(
                bin(&format!("pkg{}", i), &format!("src{}", i)).with_provides(format!("cap{}", i)),
                |pkg, j| pkg.with_requires(format!("cap{}", j)),
            )
        });
        let pools = RepositoryPools::new(
            vec![bin("primary", "primary").with_requires("cap0")],
            binaries.collect::<Vec<_>>(),
            Vec::new(),
        );
        (pools, adjacency)
    }

    /// Shortest distance from the primary package to each reachable pkg
    fn distances(adjacency: &[Vec<usize>]) -> BTreeMap<usize, usize> {
        let mut dist = BTreeMap::from([(0, 1)]);
        let mut queue = VecDeque::from([0]);
        while let Some(i) = queue.pop_front() {
            for &j in &adjacency[i] {
                let next = dist[&i] + 1;
                if !dist.contains_key(&j) {
                    dist.insert(j, next);
                    queue.push_back(j);
                }
            }
        }
        dist
    }

    proptest! {
        #[test]
        fn closure_matches_reachability(
            n in 1usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let (pools, adjacency) = layered(n, &edges);
            let outcome = ClosureResolver::new(&pools).resolve(&runtime()).unwrap();
            let dist = distances(&adjacency);

            // one layer per pass plus the pass that finds nothing new
            let depth = dist.values().copied().max().unwrap_or(0);
            prop_assert_eq!(outcome.passes, depth + 1);

            let mut expected = SourceClosure::new();
            for &j in dist.keys() {
                let mut requesters: Vec<String> = dist
                    .keys()
                    .filter(|&&i| adjacency[i].contains(&j))
                    .map(|i| format!("pkg{}", i))
                    .collect();
                if j == 0 {
                    requesters.push("primary".to_string());
                }
                requesters.sort();
                expected.insert(format!("src{}", j), requesters);
            }
            prop_assert_eq!(outcome.closure, expected);
        }

        #[test]
        fn parallel_matches_sequential(
            n in 1usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let (pools, _) = layered(n, &edges);
            let resolver = ClosureResolver::new(&pools);

            let parallel = resolver.resolve(&runtime()).unwrap();
            let sequential = resolver.resolve(&runtime().sequential()).unwrap();
            prop_assert_eq!(parallel.closure, sequential.closure);
            prop_assert_eq!(parallel.passes, sequential.passes);
        }

        #[test]
        fn state_never_shrinks_between_passes(
            n in 1usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let (pools, _) = layered(n, &edges);
            let resolver = ClosureResolver::new(&pools);
            let converged = resolver.resolve(&runtime()).unwrap();

            // aborting after k passes exposes the state sizes at that point
            let mut previous = (0, 0);
            for limit in 1..converged.passes {
                let options = ResolveOptions {
                    max_passes: Some(limit),
                    ..runtime()
                };
                match resolver.resolve(&options) {
                    Err(DepcloseError::PassLimitExceeded { working_set, resolved, .. }) => {
                        prop_assert!(working_set >= previous.0);
                        prop_assert!(resolved >= previous.1);
                        prop_assert!(working_set <= converged.working_set_size);
                        prop_assert!(resolved <= converged.closure.len());
                        previous = (working_set, resolved);
                    }
                    other => prop_assert!(false, "expected pass limit, got {:?}", other.map(|o| o.passes)),
                }
            }
        }

        #[test]
        fn closure_only_grows_with_primary(
            extra in prop::collection::vec(0usize..6, 0..4),
        ) {
            let (base, _) = layered(6, &[(0, 1), (1, 2), (3, 4), (4, 5)]);
            let before = ClosureResolver::new(&base).resolve(&runtime()).unwrap();

            let mut primary = base.primary.packages().to_vec();
            for (idx, cap) in extra.iter().enumerate() {
                primary.push(bin(&format!("extra{}", idx), "extra").with_requires(format!("cap{}", cap)));
            }
            let grown = RepositoryPools {
                primary: PackagePool::from_records(primary),
                ..base.clone()
            };
            let after = ClosureResolver::new(&grown).resolve(&runtime()).unwrap();

            for (source, requesters) in &before.closure {
                let now = after.closure.get(source);
                prop_assert!(now.is_some(), "{} dropped from closure", source);
                if let Some(now) = now {
                    for requester in requesters {
                        prop_assert!(now.contains(requester));
                    }
                }
            }
        }
    }
}
