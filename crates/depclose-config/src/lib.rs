//! Configuration for depclose
//!
//! This crate handles parsing and validation of depclose.toml files and
//! layers global, project, environment and command-line settings into one
//! effective configuration.

pub mod merge;
pub mod toml;

// Re-export main types
pub use crate::merge::{ConfigLayering, ConfigLoader, ConfigSource};
pub use crate::toml::{DepcloseConfig, RepositoriesSection, ResolutionSection, SeedsSection};

use depclose_core::error::DepcloseError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, DepcloseError>;
