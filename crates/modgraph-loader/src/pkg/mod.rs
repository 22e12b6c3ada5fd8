//! Package nodes
//!
//! A `LoadPkg` is created the first time its import path is referenced. One
//! worker fills in its resolution exactly once; after delivery only the
//! orchestrating thread touches its tracking state (relevance, test variant,
//! import stack).

use std::sync::{Arc, Weak};

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use modgraph_core::error::ModError;
use modgraph_core::types::ModuleVersion;

/// Outcome of resolving and scanning one package
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    pub module: Option<ModuleVersion>,
    pub dir: Option<Utf8PathBuf>,
    pub err: Option<Arc<ModError>>,
    pub imports: Vec<Weak<LoadPkg>>,
    pub test_imports: Vec<String>,
}

impl Resolution {
    pub fn failed(err: ModError) -> Self {
        Self {
            err: Some(Arc::new(err)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct Tracking {
    loaded: bool,
    in_all: bool,
    test: Option<Arc<LoadPkg>>,
    /// Package that first reached this one during stack building
    stack: Option<Weak<LoadPkg>>,
}

/// One package at one import path, or the test variant of one
#[derive(Debug)]
pub struct LoadPkg {
    path: String,
    test_of: Option<Weak<LoadPkg>>,
    resolution: OnceCell<Resolution>,
    tracking: Mutex<Tracking>,
}

impl LoadPkg {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            test_of: None,
            resolution: OnceCell::new(),
            tracking: Mutex::new(Tracking::default()),
        }
    }

    /// Test variant of `base`, already loaded
    pub(crate) fn test_variant(base: &Arc<LoadPkg>, imports: Vec<Weak<LoadPkg>>) -> Self {
        let resolution = Resolution {
            module: base.module().cloned(),
            dir: base.dir().map(Utf8Path::to_path_buf),
            err: base.err().cloned(),
            imports,
            test_imports: Vec::new(),
        };
        Self {
            path: base.path.clone(),
            test_of: Some(Arc::downgrade(base)),
            resolution: OnceCell::with_value(resolution),
            tracking: Mutex::new(Tracking {
                loaded: true,
                ..Tracking::default()
            }),
        }
    }

    /// Record the worker's result; only the first call takes effect
    pub(crate) fn resolve(&self, resolution: Resolution) {
        let _ = self.resolution.set(resolution);
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Import path, with a `.test` suffix for test variants
    pub fn name(&self) -> String {
        if self.is_test() {
            format!("{}.test", self.path)
        } else {
            self.path.clone()
        }
    }

    pub fn is_test(&self) -> bool {
        self.test_of.is_some()
    }

    /// The package this is the test variant of
    pub fn test_of(&self) -> Option<Arc<LoadPkg>> {
        self.test_of.as_ref().and_then(Weak::upgrade)
    }

    /// Module that provides the package, if it resolved
    pub fn module(&self) -> Option<&ModuleVersion> {
        self.resolution.get().and_then(|r| r.module.as_ref())
    }

    pub fn dir(&self) -> Option<&Utf8Path> {
        self.resolution.get().and_then(|r| r.dir.as_deref())
    }

    pub fn err(&self) -> Option<&Arc<ModError>> {
        self.resolution.get().and_then(|r| r.err.as_ref())
    }

    /// Imported packages, in source order.
    ///
    /// Edges are weak: the owning `PackageGraph` keeps the targets alive, and
    /// once it is dropped an import is silently missing from this list.
    pub fn imports(&self) -> Vec<Arc<LoadPkg>> {
        self.resolution
            .get()
            .map(|r| r.imports.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Import paths only the package's tests use
    pub fn test_imports(&self) -> &[String] {
        self.resolution
            .get()
            .map(|r| r.test_imports.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.tracking.lock().loaded
    }

    pub(crate) fn mark_loaded(&self) {
        self.tracking.lock().loaded = true;
    }

    /// Whether the package is in the "all" closure
    pub fn in_all(&self) -> bool {
        self.tracking.lock().in_all
    }

    /// Add the package to the "all" closure; true on the first transition
    pub(crate) fn mark_in_all(&self) -> bool {
        let mut tracking = self.tracking.lock();
        let first = !tracking.in_all;
        tracking.in_all = true;
        first
    }

    /// The loaded test variant, if any
    pub fn test(&self) -> Option<Arc<LoadPkg>> {
        self.tracking.lock().test.clone()
    }

    pub(crate) fn set_test(&self, test: Arc<LoadPkg>) {
        self.tracking.lock().test = Some(test);
    }

    /// The package that imports (or tests) this one on its minimal stack
    pub fn stack(&self) -> Option<Arc<LoadPkg>> {
        self.tracking.lock().stack.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_stack(&self, from: &Arc<LoadPkg>) {
        self.tracking.lock().stack = Some(Arc::downgrade(from));
    }

    /// Minimal import stack from a root down to this package
    pub fn stack_chain(self: &Arc<Self>) -> Vec<Arc<LoadPkg>> {
        let mut chain = vec![Arc::clone(self)];
        let mut next = self.stack();
        while let Some(p) = next {
            next = p.stack();
            chain.push(p);
        }
        chain.reverse();
        chain
    }

    /// Render the minimal import stack, e.g.
    /// `root imports\n\tother tested by\n\tother.test imports\n\tpkg`
    pub fn stack_text(self: &Arc<Self>) -> String {
        let chain = self.stack_chain();
        let mut text = String::new();
        for (i, p) in chain.iter().enumerate() {
            text.push_str(&p.name());
            if let Some(next) = chain.get(i + 1) {
                let tested = next
                    .test_of()
                    .map(|base| Arc::ptr_eq(&base, p))
                    .unwrap_or(false);
                if tested {
                    text.push_str(" tested by\n\t");
                } else {
                    text.push_str(" imports\n\t");
                }
            }
        }
        text
    }
}
