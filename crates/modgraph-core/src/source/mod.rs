//! Collaborator traits consumed by the resolver and the package loader.
//!
//! Everything that touches manifests, module storage or source files sits
//! behind these traits. Implementations must be shareable across the loader's
//! worker threads.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ModResult;
use crate::types::{ModuleVersion, Summary, Tags};

/// Reads the requirement summary of a module version
pub trait RequirementSource: Send + Sync {
    /// Direct requirements and pruning depth of `module`.
    ///
    /// Never called for the `none` sentinel or the target module.
    fn requirements(&self, module: &ModuleVersion) -> ModResult<Summary>;
}

/// Enumerates the known versions of a module path
pub trait VersionSource: Send + Sync {
    /// Known versions of `path`, in ascending order
    fn versions(&self, path: &str) -> ModResult<Vec<String>>;
}

/// Module and directory that provide an import path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub module: ModuleVersion,
    pub dir: Utf8PathBuf,
}

/// Imports found in one package directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScannedImports {
    pub imports: Vec<String>,
    /// Imports that only the package's tests use
    pub test_imports: Vec<String>,
}

/// Maps import paths to packages and lists their imports
pub trait ImportResolver: Send + Sync {
    /// Find the module in `build_list` that provides `path`.
    ///
    /// When no module in the build list provides it, return
    /// `ModError::ImportMissing`, naming a candidate module when one is known.
    fn resolve_import(&self, path: &str, build_list: &[ModuleVersion]) -> ModResult<ResolvedImport>;

    /// List the imports of the package in `dir` under `tags`
    fn scan_imports(&self, dir: &Utf8Path, tags: &Tags) -> ModResult<ScannedImports>;
}

impl<T: RequirementSource + ?Sized> RequirementSource for Arc<T> {
    fn requirements(&self, module: &ModuleVersion) -> ModResult<Summary> {
        (**self).requirements(module)
    }
}

impl<T: VersionSource + ?Sized> VersionSource for Arc<T> {
    fn versions(&self, path: &str) -> ModResult<Vec<String>> {
        (**self).versions(path)
    }
}

impl<T: ImportResolver + ?Sized> ImportResolver for Arc<T> {
    fn resolve_import(&self, path: &str, build_list: &[ModuleVersion]) -> ModResult<ResolvedImport> {
        (**self).resolve_import(path, build_list)
    }

    fn scan_imports(&self, dir: &Utf8Path, tags: &Tags) -> ModResult<ScannedImports> {
        (**self).scan_imports(dir, tags)
    }
}
