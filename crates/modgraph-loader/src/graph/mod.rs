//! Queries over a loaded package graph

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use camino::Utf8PathBuf;

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::types::ModuleVersion;

use crate::pkg::LoadPkg;

/// Every package reached by one load, indexed by import path
///
/// The graph owns its packages. Import edges between `LoadPkg` nodes are weak,
/// so a node kept past the graph reports only the imports still alive
/// elsewhere.
#[derive(Debug)]
pub struct PackageGraph {
    target: ModuleVersion,
    build_list: Vec<ModuleVersion>,
    roots: Vec<Arc<LoadPkg>>,
    /// Packages and test variants in stack-building order
    packages: Vec<Arc<LoadPkg>>,
    by_path: HashMap<String, Arc<LoadPkg>>,
    direct: BTreeSet<String>,
}

impl PackageGraph {
    pub(crate) fn new(
        target: ModuleVersion,
        build_list: Vec<ModuleVersion>,
        roots: Vec<Arc<LoadPkg>>,
        packages: Vec<Arc<LoadPkg>>,
        direct: BTreeSet<String>,
    ) -> Self {
        let by_path = packages
            .iter()
            .filter(|p| !p.is_test())
            .map(|p| (p.path().to_string(), Arc::clone(p)))
            .collect();
        Self {
            target,
            build_list,
            roots,
            packages,
            by_path,
            direct,
        }
    }

    pub fn target(&self) -> &ModuleVersion {
        &self.target
    }

    /// Build list the packages were resolved against
    pub fn build_list(&self) -> &[ModuleVersion] {
        &self.build_list
    }

    pub fn roots(&self) -> &[Arc<LoadPkg>] {
        &self.roots
    }

    /// Packages and test variants, roots first
    pub fn packages(&self) -> &[Arc<LoadPkg>] {
        &self.packages
    }

    /// The non-test package at `path`
    pub fn package(&self, path: &str) -> Option<&Arc<LoadPkg>> {
        self.by_path.get(path)
    }

    /// Directory and import path of a loaded package, or the error that
    /// prevented loading it, prefixed by its minimal import stack
    pub fn lookup(&self, path: &str) -> ModResult<(Utf8PathBuf, String)> {
        let pkg = self
            .package(path)
            .ok_or_else(|| ModError::missing(path, None))?;
        if let Some(err) = package_error(pkg) {
            return Err(err);
        }
        let dir = pkg
            .dir()
            .map(|d| d.to_path_buf())
            .ok_or_else(|| ModError::missing(path, None))?;
        Ok((dir, pkg.path().to_string()))
    }

    /// Map from each import written in the package to the package it loads
    pub fn import_map(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let pkg = self.package(path)?;
        Some(
            pkg.imports()
                .iter()
                .map(|i| (i.path().to_string(), i.path().to_string()))
                .collect(),
        )
    }

    pub fn package_dir(&self, path: &str) -> Option<Utf8PathBuf> {
        self.package(path)?.dir().map(|d| d.to_path_buf())
    }

    pub fn package_module(&self, path: &str) -> Option<ModuleVersion> {
        self.package(path)?.module().cloned()
    }

    /// Imports of the package and, when its test variant was loaded, the
    /// imports of its tests
    pub fn package_imports(&self, path: &str) -> Option<(Vec<String>, Vec<String>)> {
        let pkg = self.package(path)?;
        let imports = pkg.imports().iter().map(|i| i.path().to_string()).collect();
        let test_imports = match pkg.test() {
            Some(test) => test.imports().iter().map(|i| i.path().to_string()).collect(),
            None => Vec::new(),
        };
        Some((imports, test_imports))
    }

    /// Minimal import stack of `path`, rendered one import per line
    pub fn stack_text(&self, path: &str) -> Option<String> {
        self.package(path).map(|p| p.stack_text())
    }

    /// One line per package on the minimal import stack of `path`
    pub fn why(&self, path: &str) -> String {
        let Some(pkg) = self.package(path) else {
            return String::new();
        };
        pkg.stack_chain()
            .iter()
            .map(|p| format!("{}\n", p.name()))
            .collect()
    }

    /// Number of packages on the minimal import stack of `path`
    pub fn why_depth(&self, path: &str) -> usize {
        self.package(path).map(|p| p.stack_chain().len()).unwrap_or(0)
    }

    /// Sorted import paths of the non-test packages in the "all" closure
    pub fn all_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .by_path
            .values()
            .filter(|p| p.in_all())
            .map(|p| p.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    /// Paths of modules providing packages imported directly by the target
    pub fn direct(&self) -> &BTreeSet<String> {
        &self.direct
    }

    pub fn module_used_directly(&self, path: &str) -> bool {
        self.direct.contains(path)
    }

    /// Errors of the packages whose loading failed, in stack-building order.
    /// Each is a `ModError::Package` carrying the package's import stack.
    pub fn errors(&self) -> Vec<ModError> {
        self.packages
            .iter()
            .filter(|p| !p.is_test())
            .filter_map(package_error)
            .collect()
    }
}

fn package_error(pkg: &Arc<LoadPkg>) -> Option<ModError> {
    let err = pkg.err()?;
    Some(ModError::Package {
        path: pkg.path().to_string(),
        stack: pkg.stack_text(),
        source: Arc::clone(err),
    })
}
