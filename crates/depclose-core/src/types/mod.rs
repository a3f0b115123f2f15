//! Core data types for depclose.
//!
//! This module provides the fundamental types used throughout depclose:
//! - Package records as returned by the metadata service
//! - The dependency class selecting which closure to compute

pub mod dependency;
pub mod package;

// Re-export all public types
pub use dependency::{DependencyClass, UnsatisfiedPolicy, REQUIRED_MARKER};
pub use package::{Capability, PackageKey, PackageRecord, Requirement, SOURCE_ARCH};
