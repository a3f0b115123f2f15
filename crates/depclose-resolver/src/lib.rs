//! Transitive dependency closure resolver for depclose
//!
//! Given the packages built from a primary repository, this crate computes
//! every additional source package that must be available to satisfy their
//! runtime or build requirements, directly or indirectly, by repeatedly
//! querying the dependency pools until no new packages appear.

pub mod capability;
pub mod closure;
pub mod driver;
pub mod graph;
pub mod report;

// Re-export main types
pub use capability::{extract_requirements, CapabilityResolver, PoolSet};
pub use closure::ClosureState;
pub use depclose_core::UnsatisfiedPolicy;
pub use driver::{Analysis, AnalysisRequest, ClosureOutcome, ClosureResolver, ResolveOptions};
pub use graph::{ClosureGraph, ClosureNode};
pub use report::{DependencyReport, PackageEntry, ReportDocument, SourceClosure};

use depclose_core::error::DepcloseError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, DepcloseError>;
