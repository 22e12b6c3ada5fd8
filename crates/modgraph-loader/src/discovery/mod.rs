//! Concurrent package discovery
//!
//! Workers on a rayon pool resolve and scan packages, requesting each import
//! through a single-initialization cache so that every import path yields
//! exactly one node. Finished packages are delivered over a channel to the
//! orchestrator, which runs on the calling thread and alone decides
//! relevance and creates test variants.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use rayon::{Scope, ThreadPool};
use tracing::{debug, trace};

use modgraph_core::cache::OnceMap;
use modgraph_core::source::ImportResolver;
use modgraph_core::types::ModuleVersion;
use modgraph_core::utils::{check_import_path, is_pseudo_import};

use crate::loader::{AllLevel, LoadRequest};
use crate::pkg::{LoadPkg, Resolution};

/// Packages found by one discovery pass
#[derive(Debug)]
pub(crate) struct Discovered {
    pub roots: Vec<Arc<LoadPkg>>,
    /// Every package and test variant, in stack-building order
    pub packages: Vec<Arc<LoadPkg>>,
}

struct Discovery<'a> {
    resolver: &'a dyn ImportResolver,
    target: &'a ModuleVersion,
    build_list: &'a [ModuleVersion],
    request: &'a LoadRequest,
    cache: OnceMap<String, Arc<LoadPkg>>,
    /// Packages spawned but not yet delivered
    pending: AtomicUsize,
    done: Sender<Arc<LoadPkg>>,
}

/// Load the package graph rooted at `roots` against `build_list`
pub(crate) fn discover(
    pool: &ThreadPool,
    resolver: &dyn ImportResolver,
    target: &ModuleVersion,
    build_list: &[ModuleVersion],
    roots: &[String],
    request: &LoadRequest,
) -> Discovered {
    let (done, delivered) = mpsc::channel();
    let discovery = Discovery {
        resolver,
        target,
        build_list,
        request,
        cache: OnceMap::new(),
        pending: AtomicUsize::new(0),
        done,
    };
    let root_paths: HashSet<&str> = roots.iter().map(String::as_str).collect();

    let roots = pool.in_place_scope(|scope| {
        let mut root_pkgs: Vec<Arc<LoadPkg>> = Vec::new();
        for path in roots {
            let pkg = discovery.package(path, scope);
            if !root_pkgs.iter().any(|p| Arc::ptr_eq(p, &pkg)) {
                root_pkgs.push(pkg);
            }
        }

        while discovery.pending.load(Ordering::SeqCst) > 0 {
            let Ok(pkg) = delivered.recv() else {
                break;
            };
            discovery.pending.fetch_sub(1, Ordering::SeqCst);
            discovery.deliver(&pkg, root_paths.contains(pkg.path()), scope);
        }
        root_pkgs
    });

    let packages = build_stacks(&roots);
    debug!(
        roots = roots.len(),
        packages = packages.len(),
        resolved = discovery.cache.len(),
        "discovered packages"
    );
    Discovered { roots, packages }
}

impl<'a> Discovery<'a> {
    /// Node for `path`, spawning a worker for it on first reference
    fn package<'s>(&'s self, path: &str, scope: &Scope<'s>) -> Arc<LoadPkg> {
        self.cache.get_or_init(path.to_string(), || {
            let pkg = Arc::new(LoadPkg::new(path));
            self.pending.fetch_add(1, Ordering::SeqCst);
            let worker = Arc::clone(&pkg);
            scope.spawn(move |scope| self.load(worker, scope));
            pkg
        })
    }

    /// Worker body: resolve one package, then hand it to the orchestrator
    fn load<'s>(&'s self, pkg: Arc<LoadPkg>, scope: &Scope<'s>) {
        let delivery = DeliverOnDrop {
            pkg: Some(Arc::clone(&pkg)),
            done: &self.done,
        };
        let resolution = self.resolve(&pkg, scope);
        pkg.resolve(resolution);
        trace!(package = pkg.path(), error = pkg.err().is_some(), "loaded package");
        drop(delivery);
    }

    fn resolve<'s>(&'s self, pkg: &LoadPkg, scope: &Scope<'s>) -> Resolution {
        if let Err(err) = check_import_path(pkg.path()) {
            return Resolution::failed(err);
        }

        let found = match self.resolver.resolve_import(pkg.path(), self.build_list) {
            Ok(found) => found,
            Err(err) => return Resolution::failed(err),
        };

        let scanned = match self.resolver.scan_imports(&found.dir, &self.request.tags) {
            Ok(scanned) => scanned,
            Err(err) => {
                return Resolution {
                    module: Some(found.module),
                    dir: Some(found.dir),
                    err: Some(Arc::new(err)),
                    ..Resolution::default()
                }
            },
        };

        let imports = scanned
            .imports
            .iter()
            .filter(|path| !is_pseudo_import(path))
            .map(|path| Arc::downgrade(&self.package(path, scope)))
            .collect();
        let test_imports = scanned
            .test_imports
            .into_iter()
            .filter(|path| !is_pseudo_import(path))
            .collect();

        Resolution {
            module: Some(found.module),
            dir: Some(found.dir),
            err: None,
            imports,
            test_imports,
        }
    }

    /// Orchestrator step for one delivered package
    fn deliver<'s>(&'s self, pkg: &Arc<LoadPkg>, is_root: bool, scope: &Scope<'s>) {
        pkg.mark_loaded();

        let level = self.request.all_level;
        if level >= AllLevel::TargetImported && pkg.module() == Some(self.target) {
            pkg.mark_in_all();
        }
        if self.request.load_tests && (pkg.in_all() || is_root) {
            self.test_of(pkg, scope);
        }
        if pkg.in_all() {
            self.propagate_in_all(pkg, scope);
        }
    }

    /// Spread "all" membership from `start` through everything it reaches
    fn propagate_in_all<'s>(&'s self, start: &Arc<LoadPkg>, scope: &Scope<'s>) {
        let level = self.request.all_level;
        let mut work = vec![Arc::clone(start)];

        while let Some(pkg) = work.pop() {
            // Not yet delivered packages propagate on delivery.
            if !pkg.is_loaded() {
                continue;
            }
            for import in pkg.imports() {
                if import.mark_in_all() {
                    work.push(import);
                }
            }

            let traced = level >= AllLevel::TargetTestTransitive
                || (level >= AllLevel::TargetImported && pkg.module() == Some(self.target));
            if !pkg.is_test() && traced {
                let test = self.test_of(&pkg, scope);
                if test.mark_in_all() {
                    work.push(test);
                }
            }
        }
    }

    /// Test variant of `pkg`, creating and loading it on first use
    fn test_of<'s>(&'s self, pkg: &Arc<LoadPkg>, scope: &Scope<'s>) -> Arc<LoadPkg> {
        if let Some(test) = pkg.test() {
            return test;
        }
        let imports = pkg
            .test_imports()
            .iter()
            .map(|path| Arc::downgrade(&self.package(path, scope)))
            .collect();
        let test = Arc::new(LoadPkg::test_variant(pkg, imports));
        pkg.set_test(Arc::clone(&test));
        trace!(package = pkg.path(), "created test variant");
        test
    }
}

/// Sends its package to the orchestrator when dropped, so a panicking worker
/// still releases it; the scope re-raises the panic afterwards.
struct DeliverOnDrop<'d> {
    pkg: Option<Arc<LoadPkg>>,
    done: &'d Sender<Arc<LoadPkg>>,
}

impl Drop for DeliverOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(pkg) = self.pkg.take() {
            // The orchestrator only stops listening once nothing is pending.
            let _ = self.done.send(pkg);
        }
    }
}

/// Breadth-first walk from the roots recording, for each package, the package
/// that first reached it. Test variants are visited after a package's imports.
fn build_stacks(roots: &[Arc<LoadPkg>]) -> Vec<Arc<LoadPkg>> {
    let key = |p: &Arc<LoadPkg>| (p.path().to_string(), p.is_test());

    let mut seen: HashSet<(String, bool)> = roots.iter().map(key).collect();
    let mut queue: VecDeque<Arc<LoadPkg>> = roots.iter().cloned().collect();
    let mut packages = Vec::new();

    while let Some(pkg) = queue.pop_front() {
        let next = pkg.imports().into_iter().chain(pkg.test());
        for p in next {
            if seen.insert(key(&p)) {
                p.set_stack(&pkg);
                queue.push_back(p);
            }
        }
        packages.push(pkg);
    }
    packages
}
