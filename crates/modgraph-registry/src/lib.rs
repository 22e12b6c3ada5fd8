//! In-memory module registry for modgraph
//!
//! This crate provides collaborator implementations backed by memory: module
//! requirement summaries, version lists, package directories and their
//! imports. Tests, benchmarks and embedders that already hold their module
//! data use it instead of a manifest store. A memoizing wrapper caches
//! requirement reads for any source.

pub mod cache;
pub mod fixture;
pub mod memory;

// Re-export main types
pub use cache::{CacheStats, RequirementCache};
pub use fixture::{ModuleFixture, PackageFixture, RegistryFixture};
pub use memory::MemoryRegistry;

use modgraph_core::error::ModError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, ModError>;
