//! Core data types for module resolution.
//!
//! This module provides the fundamental types used throughout modgraph:
//! - Module identities and requirement summaries
//! - Version parsing and ordering
//! - Build tag predicates
//! - Conflict records reported by the requirement editor

pub mod conflict;
pub mod module;
pub mod tags;
pub mod version;

// Re-export all public types
pub use conflict::Conflict;
pub use module::{compare_modules, sort_modules, Depth, ModuleVersion, Summary};
pub use tags::Tags;
pub use version::{compare_versions, is_valid_version, max_version, Version, VersionError, NONE};
