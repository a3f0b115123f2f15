//! Filtered package queries over loaded repository metadata

use std::collections::{BTreeMap, HashMap};

use depclose_core::{PackageKey, PackageRecord, SOURCE_ARCH};

use crate::MetadataResult;

/// Architecture predicate of a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArchFilter {
    /// Any architecture
    #[default]
    Any,
    /// Architecture must equal the value
    Eq(String),
    /// Architecture must differ from the value
    Neq(String),
}

impl ArchFilter {
    /// Only source packages
    pub fn sources() -> Self {
        ArchFilter::Eq(SOURCE_ARCH.to_string())
    }

    /// Everything except source packages
    pub fn binaries() -> Self {
        ArchFilter::Neq(SOURCE_ARCH.to_string())
    }

    /// Check an architecture against the predicate
    pub fn matches(&self, architecture: &str) -> bool {
        match self {
            ArchFilter::Any => true,
            ArchFilter::Eq(arch) => arch == architecture,
            ArchFilter::Neq(arch) => arch != architecture,
        }
    }
}

/// Conjunction of package predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub arch: ArchFilter,
    pub name: Option<String>,
    pub provides: Option<String>,
    pub source_identifier: Option<String>,
}

impl QueryFilter {
    /// Filter matching every package
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arch_eq(mut self, arch: impl Into<String>) -> Self {
        self.arch = ArchFilter::Eq(arch.into());
        self
    }

    pub fn arch_neq(mut self, arch: impl Into<String>) -> Self {
        self.arch = ArchFilter::Neq(arch.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.provides = Some(capability.into());
        self
    }

    pub fn source_identifier(mut self, source_identifier: impl Into<String>) -> Self {
        self.source_identifier = Some(source_identifier.into());
        self
    }

    /// Check a record against every predicate
    pub fn matches(&self, record: &PackageRecord) -> bool {
        self.arch.matches(&record.architecture)
            && self.name.as_deref().map_or(true, |name| record.name == name)
            && self
                .provides
                .as_deref()
                .map_or(true, |capability| record.provides_capability(capability))
            && self
                .source_identifier
                .as_deref()
                .map_or(true, |source| record.source_identifier == source)
    }
}

/// Read-only package query service
///
/// Implementations may be slow; callers treat every query as a blocking
/// call and any error as fatal for the current resolution.
pub trait MetadataSource: Send + Sync {
    /// Return every record matching the filter
    fn query(&self, filter: &QueryFilter) -> MetadataResult<Vec<PackageRecord>>;
}

/// In-memory indexed pool of package records
#[derive(Debug, Clone, Default)]
pub struct PackagePool {
    /// Records sorted by key, without duplicates
    packages: Vec<PackageRecord>,
    by_name: HashMap<String, Vec<usize>>,
    by_capability: HashMap<String, Vec<usize>>,
    by_source: HashMap<String, Vec<usize>>,
}

impl PackagePool {
    /// Build a pool from records; the first record seen for a key wins
    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        Self::filtered(records, &ArchFilter::Any)
    }

    /// Build a pool keeping only records whose architecture matches
    pub fn filtered(records: impl IntoIterator<Item = PackageRecord>, arch: &ArchFilter) -> Self {
        let mut unique: BTreeMap<PackageKey, PackageRecord> = BTreeMap::new();
        for record in records {
            if arch.matches(&record.architecture) {
                unique.entry(record.key()).or_insert(record);
            }
        }

        let packages: Vec<PackageRecord> = unique.into_values().collect();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_capability: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_source: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, record) in packages.iter().enumerate() {
            by_name.entry(record.name.clone()).or_default().push(idx);
            by_source
                .entry(record.source_identifier.clone())
                .or_default()
                .push(idx);

            let capabilities = std::iter::once(&record.name).chain(record.provides.iter());
            for capability in capabilities {
                let slots = by_capability.entry(capability.clone()).or_default();
                // a package may list its own name or a capability twice
                if slots.last() != Some(&idx) {
                    slots.push(idx);
                }
            }
        }

        Self {
            packages,
            by_name,
            by_capability,
            by_source,
        }
    }

    /// Number of records in the pool
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the pool has no records
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All records in key order
    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    /// Smallest index slice covering the filter, or `None` for a full scan
    fn candidates(&self, filter: &QueryFilter) -> Option<&[usize]> {
        let lookups = [
            filter.name.as_ref().map(|n| self.by_name.get(n)),
            filter.provides.as_ref().map(|c| self.by_capability.get(c)),
            filter
                .source_identifier
                .as_ref()
                .map(|s| self.by_source.get(s)),
        ];

        lookups
            .into_iter()
            .flatten()
            .map(|slots| slots.map_or(&[][..], Vec::as_slice))
            .min_by_key(|slots| slots.len())
    }
}

impl MetadataSource for PackagePool {
    fn query(&self, filter: &QueryFilter) -> MetadataResult<Vec<PackageRecord>> {
        let found = match self.candidates(filter) {
            Some(slots) => slots
                .iter()
                .map(|&idx| &self.packages[idx])
                .filter(|record| filter.matches(record))
                .cloned()
                .collect(),
            None => self
                .packages
                .iter()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect(),
        };
        Ok(found)
    }
}

/// The logical pools a closure is computed against
#[derive(Debug, Clone, Default)]
pub struct RepositoryPools {
    /// Packages built from the primary repository, all architectures
    pub primary: PackagePool,
    /// Installable packages from the dependency repositories
    pub binaries: PackagePool,
    /// Source packages from the dependency SRPM repositories
    pub sources: PackagePool,
}

impl RepositoryPools {
    /// Assemble pools, applying each dependency pool's architecture filter
    pub fn new(
        primary: impl IntoIterator<Item = PackageRecord>,
        binaries: impl IntoIterator<Item = PackageRecord>,
        sources: impl IntoIterator<Item = PackageRecord>,
    ) -> Self {
        Self {
            primary: PackagePool::from_records(primary),
            binaries: PackagePool::filtered(binaries, &ArchFilter::binaries()),
            sources: PackagePool::filtered(sources, &ArchFilter::sources()),
        }
    }
}
