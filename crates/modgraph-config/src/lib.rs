//! Configuration parsing for modgraph
//!
//! This crate handles parsing and validation of modgraph.toml files and
//! layers the global file, the project file, environment variables and
//! explicit overrides into one configuration for the loader and the editor.

pub mod merge;
pub mod toml;

// Re-export main types
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};
pub use toml::{LoaderSection, ModgraphToml, ModuleSection};

use modgraph_core::error::ModError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ModError>;
