//! Repository metadata query service for depclose
//!
//! This crate loads package indexes for the primary and dependency
//! repositories over HTTP or from local files, and answers filtered queries
//! (architecture, name, provided capability, source identifier) against
//! them.

pub mod api;
pub mod client;
pub mod pool;

// Re-export main types
pub use api::PackageIndex;
pub use client::{AuthConfig, MetadataClient, RepositoryLayout, RetryConfig};
pub use pool::{ArchFilter, MetadataSource, PackagePool, QueryFilter, RepositoryPools};

use depclose_core::error::DepcloseError;

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, DepcloseError>;
