//! Package graph loader for modgraph
//!
//! This crate discovers the packages reachable from a set of root import
//! paths, growing the module build list when a missing package can be
//! provided by a known module version:
//! - `pkg`: package nodes and their import stacks
//! - `discovery`: the worker pool and the orchestrating thread
//! - `loader`: the fixpoint loop, requests and module state
//! - `graph`: queries over a loaded package graph

mod discovery;
pub mod graph;
pub mod loader;
pub mod pkg;

// Re-export main types
pub use graph::PackageGraph;
pub use loader::{AllLevel, LoadOutcome, LoadRequest, Loader, LoaderConfig, ModuleState};
pub use pkg::LoadPkg;

use modgraph_core::error::ModError;

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, ModError>;
