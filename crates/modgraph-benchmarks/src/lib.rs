//! modgraph benchmarking suite
//!
//! Benchmarks for version selection, requirement editing and concurrent
//! package loading, over synthetic layered module graphs.

pub mod common;

pub use common::*;
