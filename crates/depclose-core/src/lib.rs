//! # depclose-core
//!
//! Core types shared across all depclose crates.
//!
//! This crate provides:
//! - `PackageRecord` and its value-equality `PackageKey`
//! - `DependencyClass` for selecting runtime or build-requirement closures
//! - `DepcloseError` enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (PackageRecord, PackageKey, etc.)
//! - `error`: Error types and result aliases

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{DepcloseError, DepcloseResult};
pub use types::{
    Capability, DependencyClass, PackageKey, PackageRecord, Requirement, UnsatisfiedPolicy,
    REQUIRED_MARKER, SOURCE_ARCH,
};
