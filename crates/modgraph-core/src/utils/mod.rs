//! Utility functions and helpers.
//!
//! Common functionality used across multiple modgraph crates.

pub mod path;

// Re-export commonly used utilities
pub use path::{check_import_path, has_path_prefix, is_local_import, is_pseudo_import};
