//! depclose benchmarking suite
//!
//! Resolver throughput on synthetic repositories of configurable size.

pub mod common;

pub use common::*;
