//! Error types and result aliases for modgraph operations.
//!
//! Provides a unified error type that covers every failure the resolver, the
//! package loader and the configuration layer can report, with actionable
//! messages.

use std::sync::Arc;
use thiserror::Error;

use crate::types::{Conflict, ModuleVersion};

/// Unified error type for all modgraph operations
#[derive(Error, Debug)]
pub enum ModError {
    // Identity errors
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Malformed module version '{input}': {reason}")]
    InvalidModule { input: String, reason: String },

    // Requirement errors
    #[error("Cannot read requirements of {module}: {reason}")]
    Requirements { module: String, reason: String },

    #[error("Module {path} has no known versions")]
    UnknownModule { path: String },

    // Import errors
    #[error("{}", missing_message(.path, .candidate.as_ref()))]
    ImportMissing {
        path: String,
        candidate: Option<ModuleVersion>,
    },

    #[error("Invalid import path '{path}': {reason}")]
    InvalidImport { path: String, reason: String },

    #[error("Ambiguous import: package {path} is provided by {}", .modules.join(", "))]
    AmbiguousImport { path: String, modules: Vec<String> },

    // Resolution errors
    #[error("version constraints conflict:{}", format_conflicts(.conflicts))]
    Conflict { conflicts: Vec<Conflict> },

    #[error("{stack}: looping trying to add package")]
    ResolutionLoop { path: String, stack: String },

    #[error("{context}: {source}")]
    BuildList {
        module: ModuleVersion,
        context: String,
        #[source]
        source: Box<ModError>,
    },

    /// A package error, rendered after the minimal import stack leading to it
    #[error("{stack}: {source}")]
    Package {
        path: String,
        stack: String,
        #[source]
        source: Arc<ModError>,
    },

    // Config errors
    #[error("Failed to parse modgraph.toml: {message}")]
    TomlParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Collaborator errors, propagated without inspection
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// An error already attached to a package or a disqualified module
    #[error(transparent)]
    Shared(Arc<ModError>),
}

/// Result type alias for modgraph operations
pub type ModResult<T> = Result<T, ModError>;

fn missing_message(path: &str, candidate: Option<&ModuleVersion>) -> String {
    match candidate {
        Some(m) => format!(
            "no required module provides package {}; found it in {}",
            path, m
        ),
        None => format!("cannot find module providing package {}", path),
    }
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("\n\t{}", c))
        .collect()
}

impl ModError {
    /// Wrap an opaque collaborator error
    pub fn source<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// A missing import, optionally naming a module that provides it
    pub fn missing(path: impl Into<String>, candidate: Option<ModuleVersion>) -> Self {
        Self::ImportMissing {
            path: path.into(),
            candidate,
        }
    }

    /// The module version a missing-import error proposes, if any
    pub fn missing_candidate(&self) -> Option<&ModuleVersion> {
        match self {
            ModError::ImportMissing { candidate, .. } => candidate.as_ref(),
            ModError::Shared(inner) | ModError::Package { source: inner, .. } => inner.missing_candidate(),
            _ => None,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ModError::Source { .. } | ModError::Io { .. } => true,
            ModError::Shared(inner) | ModError::Package { source: inner, .. } => inner.is_recoverable(),
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ModError::ImportMissing { candidate: None, .. } => {
                Some("Add a requirement on a module that provides the package")
            },
            ModError::InvalidImport { .. } => Some("Use a fully qualified import path without a version"),
            ModError::Conflict { .. } => {
                Some("Relax one of the requested versions or drop the conflicting upgrade")
            },
            ModError::ResolutionLoop { .. } => {
                Some("Check that the package resolves to the same module on every attempt")
            },
            ModError::AmbiguousImport { .. } => {
                Some("Remove one of the modules that provide the package from the build")
            },
            ModError::Source { .. } | ModError::Io { .. } => Some("Check the module source and try again"),
            ModError::Shared(inner) | ModError::Package { source: inner, .. } => inner.suggestion(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_import_messages() {
        let err = ModError::missing("example.com/d/pkg", Some(ModuleVersion::new("example.com/d", "v1.2.0")));
        assert_eq!(
            err.to_string(),
            "no required module provides package example.com/d/pkg; found it in example.com/d@v1.2.0"
        );
        assert_eq!(err.missing_candidate(), Some(&ModuleVersion::new("example.com/d", "v1.2.0")));

        let err = ModError::missing("example.com/nowhere", None);
        assert_eq!(err.to_string(), "cannot find module providing package example.com/nowhere");
        assert!(err.missing_candidate().is_none());
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_conflict_message_lists_every_conflict() {
        let err = ModError::Conflict {
            conflicts: vec![
                Conflict {
                    source: ModuleVersion::new("a", "v2.0.0"),
                    dep: ModuleVersion::new("b", "v3.0.0"),
                    constraint: ModuleVersion::new("b", "v2.0.0"),
                },
                Conflict {
                    source: ModuleVersion::new("c", "v1.0.0"),
                    dep: ModuleVersion::new("d", "v1.1.0"),
                    constraint: ModuleVersion::new("d", "v1.0.0"),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "version constraints conflict:\n\ta@v2.0.0 requires b@v3.0.0, but b@v2.0.0 is requested\n\tc@v1.0.0 requires d@v1.1.0, but d@v1.0.0 is requested"
        );
    }

    #[test]
    fn test_shared_is_transparent() {
        let inner = Arc::new(ModError::missing("x", Some(ModuleVersion::new("x", "v1.0.0"))));
        let shared = ModError::Shared(inner.clone());
        assert_eq!(shared.to_string(), inner.to_string());
        assert!(shared.missing_candidate().is_some());
    }

    #[test]
    fn test_package_error_leads_with_stack() {
        let inner = Arc::new(ModError::missing("example.com/gone", None));
        let err = ModError::Package {
            path: "example.com/gone".to_string(),
            stack: "example.com/app imports\n\texample.com/gone".to_string(),
            source: inner,
        };
        assert_eq!(
            err.to_string(),
            "example.com/app imports\n\texample.com/gone: cannot find module providing package example.com/gone"
        );
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_recoverable() {
        let io = ModError::io(
            "reading requirements".to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(io.is_recoverable());
        assert!(!ModError::UnknownModule { path: "x".to_string() }.is_recoverable());
    }
}
