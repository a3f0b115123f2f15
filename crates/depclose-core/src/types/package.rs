//! Package record types.
//!
//! Defines the immutable package record returned by repository metadata
//! queries and the value key that identifies it.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Architecture string carried by source packages
pub const SOURCE_ARCH: &str = "src";

/// A capability a package declares it needs
pub type Requirement = String;

/// A capability a package declares it offers
pub type Capability = String;

/// Value identity of a package record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub source_identifier: String,
}

/// Package record from a repository
///
/// Two records are equal when their [`PackageKey`]s are equal; the
/// requirement and capability lists do not take part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    #[serde(alias = "arch")]
    pub architecture: String,
    pub source_name: String,
    #[serde(alias = "sourcerpm")]
    pub source_identifier: String,
    #[serde(default)]
    pub requires: Vec<Requirement>,
    #[serde(default)]
    pub provides: Vec<Capability>,
}

impl PackageRecord {
    /// Create a record with no requirements or capabilities
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        architecture: impl Into<String>,
        source_name: impl Into<String>,
        source_identifier: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            architecture: architecture.into(),
            source_name: source_name.into(),
            source_identifier: source_identifier.into(),
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Add a declared requirement
    pub fn with_requires(mut self, requirement: impl Into<String>) -> Self {
        self.requires.push(requirement.into());
        self
    }

    /// Add a declared capability
    pub fn with_provides(mut self, capability: impl Into<String>) -> Self {
        self.provides.push(capability.into());
        self
    }

    /// Value identity of this record
    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version.clone(),
            architecture: self.architecture.clone(),
            source_identifier: self.source_identifier.clone(),
        }
    }

    /// Whether this is a source package record
    pub fn is_source(&self) -> bool {
        self.architecture == SOURCE_ARCH
    }

    /// Whether this record satisfies the capability.
    ///
    /// Every package implicitly provides its own name.
    pub fn provides_capability(&self, capability: &str) -> bool {
        self.name == capability || self.provides.iter().any(|p| p == capability)
    }

    fn key_fields(&self) -> (&str, &str, &str, &str) {
        (
            &self.name,
            &self.version,
            &self.architecture,
            &self.source_identifier,
        )
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key_fields() == other.key_fields()
    }
}

impl Eq for PackageRecord {}

impl Hash for PackageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_fields().hash(state);
    }
}

impl std::fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.version, self.architecture)
    }
}

impl std::fmt::Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.version, self.architecture)
    }
}
