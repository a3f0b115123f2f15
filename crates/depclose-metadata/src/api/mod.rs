//! Repository package index document

use depclose_core::PackageRecord;
use serde::{Deserialize, Serialize};

/// File name of the index inside a repository location
pub const INDEX_FILE: &str = "packages.json";

/// Package index published by a repository
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PackageIndex {
    /// All package records available from the repository
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

impl PackageIndex {
    /// Create an index from records
    pub fn new(packages: Vec<PackageRecord>) -> Self {
        Self { packages }
    }

    /// Number of records in the index
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the index has no records
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
