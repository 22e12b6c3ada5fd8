//! # modgraph-core
//!
//! Core types and utilities shared across all modgraph crates.
//!
//! This crate provides:
//! - `ModuleVersion`, version ordering and pruning depth
//! - `ModError` for unified error handling
//! - Collaborator traits consumed by the resolver and the package loader
//! - `OnceMap`, the single-initialization concurrent cache
//! - Import path classification helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (ModuleVersion, Version, Depth, Tags, Conflict)
//! - `error`: Error types and result aliases
//! - `source`: Traits for requirement, version and import providers
//! - `cache`: Concurrent memoizing map
//! - `utils`: Utility functions and helpers

pub mod cache;
pub mod error;
pub mod source;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use cache::OnceMap;
pub use error::{ModError, ModResult};
pub use source::{ImportResolver, RequirementSource, ResolvedImport, ScannedImports, VersionSource};
pub use types::{
    compare_modules, compare_versions, sort_modules, Conflict, Depth, ModuleVersion, Summary,
    Tags, Version, NONE,
};
