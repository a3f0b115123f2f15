//! Dependency class types.
//!
//! A closure is computed either over runtime requirements of binary
//! packages or over build requirements of source packages.

use serde::{Deserialize, Serialize};

/// Requester recorded for sources pulled in by the seed list
pub const REQUIRED_MARKER: &str = "required";

/// Which requirement closure to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyClass {
    /// Runtime requirements of installable binary packages
    Runtime,
    /// Build requirements of source packages
    #[serde(rename = "buildreq")]
    BuildReq,
}

impl DependencyClass {
    /// All classes in output order
    pub const ALL: [DependencyClass; 2] = [DependencyClass::Runtime, DependencyClass::BuildReq];

    /// Key used in output documents
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyClass::Runtime => "runtime",
            DependencyClass::BuildReq => "buildreq",
        }
    }

    /// Whether the primary repository is scanned for source packages
    pub fn scans_sources(&self) -> bool {
        matches!(self, DependencyClass::BuildReq)
    }
}

impl std::fmt::Display for DependencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with requirements nothing provides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsatisfiedPolicy {
    /// Record silently (debug log only)
    Ignore,
    /// Record and log a warning per requirement
    #[default]
    Warn,
}

impl std::str::FromStr for UnsatisfiedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(UnsatisfiedPolicy::Ignore),
            "warn" => Ok(UnsatisfiedPolicy::Warn),
            other => Err(format!("expected 'ignore' or 'warn', got '{}'", other)),
        }
    }
}
