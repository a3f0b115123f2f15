//! Terminal output formatting and utilities.
//!
//! Status messages go to stderr; only report documents are written to
//! stdout so the output can be piped or redirected.

pub mod colors;
pub mod errors;

use std::io::Write;

use depclose_core::error::{DepcloseError, DepcloseResult};

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new() -> Self {
        Self {
            colors: colors::ColorSupport::detect(),
        }
    }

    /// Output handler that never emits escape codes
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            colors: colors::ColorSupport::disabled(),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        eprintln!("{}", self.colors.dim(message));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", self.colors.green("✓"), message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Print a step message with a marker
    pub fn step(&self, marker: &str, message: &str) {
        eprintln!("{} {}", self.colors.bold(marker), message);
    }

    /// Write a document to stdout unchanged
    pub fn document(&self, content: &str) -> DepcloseResult<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(content.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| DepcloseError::io("Failed to write to stdout".to_string(), e))
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
