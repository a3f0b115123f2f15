//! Requirement extraction and capability lookups against the dependency pools

use dashmap::DashMap;
use tracing::debug;

use depclose_core::error::DepcloseError;
use depclose_core::{PackageRecord, Requirement};
use depclose_metadata::{MetadataSource, QueryFilter, RepositoryPools};

use crate::ResolverResult;

/// Declared requirements of a package, unmodified and in declaration order
pub fn extract_requirements(package: &PackageRecord) -> &[Requirement] {
    &package.requires
}

/// Borrowed view of the pools one resolution runs against
#[derive(Clone, Copy)]
pub struct PoolSet<'a> {
    pub primary: &'a dyn MetadataSource,
    pub binaries: &'a dyn MetadataSource,
    pub sources: &'a dyn MetadataSource,
}

impl<'a> PoolSet<'a> {
    pub fn new(
        primary: &'a dyn MetadataSource,
        binaries: &'a dyn MetadataSource,
        sources: &'a dyn MetadataSource,
    ) -> Self {
        Self {
            primary,
            binaries,
            sources,
        }
    }
}

impl<'a> From<&'a RepositoryPools> for PoolSet<'a> {
    fn from(pools: &'a RepositoryPools) -> Self {
        Self::new(&pools.primary, &pools.binaries, &pools.sources)
    }
}

/// Resolves capabilities to providing packages
///
/// Metadata queries are pure, so provider lists are memoized for the
/// lifetime of one resolution. The memo is shared by the workers of a pass.
pub struct CapabilityResolver<'a> {
    pools: PoolSet<'a>,
    providers: DashMap<Requirement, Vec<PackageRecord>>,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(pools: PoolSet<'a>) -> Self {
        Self {
            pools,
            providers: DashMap::new(),
        }
    }

    /// Installable packages providing the capability; empty when unsatisfied
    pub fn providers(&self, requirement: &str) -> ResolverResult<Vec<PackageRecord>> {
        if let Some(cached) = self.providers.get(requirement) {
            return Ok(cached.clone());
        }

        let found = self
            .pools
            .binaries
            .query(&QueryFilter::new().provides(requirement).arch_neq(depclose_core::SOURCE_ARCH))?;
        debug!("{} provider(s) for '{}'", found.len(), requirement);

        self.providers.insert(requirement.to_string(), found.clone());
        Ok(found)
    }

    /// Installable packages built from the same source artifact
    pub fn siblings(&self, package: &PackageRecord) -> ResolverResult<Vec<PackageRecord>> {
        self.pools.binaries.query(
            &QueryFilter::new()
                .source_identifier(package.source_identifier.as_str())
                .arch_neq(depclose_core::SOURCE_ARCH),
        )
    }

    /// Source package a binary package was built from
    ///
    /// Prefers the exact source artifact of the binary and falls back to any
    /// source package with the same name.
    pub fn source_package(&self, package: &PackageRecord) -> ResolverResult<PackageRecord> {
        let mut candidates = self.pools.sources.query(
            &QueryFilter::new()
                .name(package.source_name.as_str())
                .arch_eq(depclose_core::SOURCE_ARCH),
        )?;

        if let Some(exact) = candidates
            .iter()
            .position(|src| src.source_identifier == package.source_identifier)
        {
            return Ok(candidates.swap_remove(exact));
        }

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| DepcloseError::MissingSourcePackage {
                binary: package.name.clone(),
                source_name: package.source_name.clone(),
            })
    }

    /// Number of memoized provider lookups
    pub fn cached_lookups(&self) -> usize {
        self.providers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depclose_metadata::PackagePool;

    fn pools() -> RepositoryPools {
        RepositoryPools::new(
            Vec::new(),
            vec![
                PackageRecord::new("libfoo", "1.0-1", "x86_64", "foo", "foo-1.0-1.src.rpm")
                    .with_provides("libfoo.so.1()(64bit)"),
                PackageRecord::new("foo-devel", "1.0-1", "x86_64", "foo", "foo-1.0-1.src.rpm"),
                PackageRecord::new("orphan", "1.0-1", "noarch", "orphan", "orphan-1.0-1.src.rpm"),
            ],
            vec![
                PackageRecord::new("foo", "0.9-1", "src", "foo", "foo-0.9-1.src.rpm"),
                PackageRecord::new("foo", "1.0-1", "src", "foo", "foo-1.0-1.src.rpm"),
            ],
        )
    }

    #[test]
    fn test_extract_requirements_is_verbatim() {
        let pkg = PackageRecord::new("a", "1", "noarch", "a", "a-1.src.rpm")
            .with_requires("python3")
            .with_requires("python3")
            .with_requires("libfoo.so.1()(64bit)");

        assert_eq!(
            extract_requirements(&pkg),
            &["python3", "python3", "libfoo.so.1()(64bit)"]
        );
    }

    #[test]
    fn test_providers_are_memoized() {
        let pools = pools();
        let resolver = CapabilityResolver::new(PoolSet::from(&pools));

        let first = resolver.providers("libfoo.so.1()(64bit)").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "libfoo");

        let unsatisfied = resolver.providers("libmissing.so").unwrap();
        assert!(unsatisfied.is_empty());

        let again = resolver.providers("libfoo.so.1()(64bit)").unwrap();
        assert_eq!(first, again);
        assert_eq!(resolver.cached_lookups(), 2);
    }

    #[test]
    fn test_siblings() {
        let pools = pools();
        let resolver = CapabilityResolver::new(PoolSet::from(&pools));
        let libfoo = resolver.providers("libfoo").unwrap().remove(0);

        let siblings = resolver.siblings(&libfoo).unwrap();
        let names: Vec<_> = siblings.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["foo-devel", "libfoo"]);
    }

    #[test]
    fn test_source_package_prefers_exact_artifact() {
        let pools = pools();
        let resolver = CapabilityResolver::new(PoolSet::from(&pools));
        let libfoo = resolver.providers("libfoo").unwrap().remove(0);

        let src = resolver.source_package(&libfoo).unwrap();
        assert_eq!(src.version, "1.0-1");
        assert!(src.is_source());
    }

    #[test]
    fn test_missing_source_package() {
        let pools = pools();
        let resolver = CapabilityResolver::new(PoolSet::from(&pools));
        let orphan = resolver.providers("orphan").unwrap().remove(0);

        let err = resolver.source_package(&orphan).unwrap_err();
        assert!(matches!(
            err,
            DepcloseError::MissingSourcePackage { ref binary, ref source_name }
                if binary == "orphan" && source_name == "orphan"
        ));
    }

    #[test]
    fn test_pool_set_from_custom_sources() {
        let empty = PackagePool::default();
        let pools = PoolSet::new(&empty, &empty, &empty);
        let resolver = CapabilityResolver::new(pools);
        assert!(resolver.providers("anything").unwrap().is_empty());
    }
}
