//! Version selection engine for modgraph
//!
//! This crate turns requirement graphs into build lists and edits root
//! requirement sets under upper-bound constraints:
//! - `mvs`: minimal version selection and minimal requirement lists
//! - `graph`: requirement graph storage and pruned module graph reads
//! - `limiter`: ceiling tracking with cycle-safe disqualification
//! - `edit`: the requirement editor built on the limiter

pub mod edit;
pub mod graph;
pub mod limiter;
pub mod mvs;

// Re-export main types
pub use edit::{edit_requirements, EditContext, EditOutcome, Requirements};
pub use graph::{ModuleGraph, RequirementGraph};
pub use limiter::{Disqualification, VersionLimiter};
pub use mvs::{build_list, req, Reqs, RootReqs};

use modgraph_core::error::ModError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ModError>;
