//! Conflict records for constrained requirement edits.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModuleVersion;

/// A requested module version whose requirements exceed a ceiling
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    /// Module version that was requested
    pub source: ModuleVersion,
    /// Dependency version it forces
    pub dep: ModuleVersion,
    /// Ceiling that the dependency exceeds
    pub constraint: ModuleVersion,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requires {}, but {} is requested",
            self.source, self.dep, self.constraint
        )
    }
}
