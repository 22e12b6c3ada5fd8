//! Package graph loading
//!
//! `Loader::load` discovers the packages reachable from a set of root import
//! paths. Whenever a package is missing but some module version is known to
//! provide it, that module is added to the build list and discovery starts
//! over, until no further module can be added.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::{ImportResolver, RequirementSource};
use modgraph_core::types::{sort_modules, Depth, ModuleVersion, Tags};
use modgraph_resolver::{mvs, Requirements, RootReqs};

use crate::discovery::discover;
use crate::graph::PackageGraph;
use crate::pkg::LoadPkg;

/// How far the "all" closure extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AllLevel {
    /// Only the roots (and, with tests, their direct test variants)
    #[default]
    RootsOnly,
    /// Everything transitively imported by packages of the target module,
    /// including their tests
    TargetImported,
    /// Additionally the tests of every package in the closure
    TargetTestTransitive,
}

impl fmt::Display for AllLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllLevel::RootsOnly => write!(f, "none"),
            AllLevel::TargetImported => write!(f, "target-imported"),
            AllLevel::TargetTestTransitive => write!(f, "target-test-transitive"),
        }
    }
}

impl FromStr for AllLevel {
    type Err = ModError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(AllLevel::RootsOnly),
            "target-imported" => Ok(AllLevel::TargetImported),
            "target-test-transitive" => Ok(AllLevel::TargetTestTransitive),
            other => Err(ModError::ConfigValidation {
                field: "all".to_string(),
                reason: format!(
                    "expected \"none\", \"target-imported\" or \"target-test-transitive\", found \"{}\"",
                    other
                ),
            }),
        }
    }
}

/// Loader settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Worker threads for package discovery
    pub jobs: usize,
    pub load_tests: bool,
    pub all_level: AllLevel,
    pub tags: Tags,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            load_tests: false,
            all_level: AllLevel::RootsOnly,
            tags: Tags::Any,
        }
    }
}

/// What to load
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadRequest {
    pub roots: Vec<String>,
    pub tags: Tags,
    pub all_level: AllLevel,
    pub load_tests: bool,
}

impl LoadRequest {
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Request `roots` with the defaults from `config`
    pub fn from_config<I, S>(roots: I, config: &LoaderConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: config.tags.clone(),
            all_level: config.all_level,
            load_tests: config.load_tests,
            ..Self::new(roots)
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_all_level(mut self, level: AllLevel) -> Self {
        self.all_level = level;
        self
    }

    pub fn with_tests(mut self, load_tests: bool) -> Self {
        self.load_tests = load_tests;
        self
    }
}

/// Module-level state threaded through loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleState {
    pub target: ModuleVersion,
    /// Root requirements of the target, sorted by path
    pub roots: Vec<ModuleVersion>,
    /// Target first, then the selected version of every other module
    pub build_list: Vec<ModuleVersion>,
    /// Paths of modules providing packages the target imports directly
    pub direct: BTreeSet<String>,
}

impl ModuleState {
    /// State for `target` requiring `roots`; the build list is computed on load
    pub fn new(target: ModuleVersion, mut roots: Vec<ModuleVersion>) -> Self {
        sort_modules(&mut roots);
        let build_list = vec![target.clone()];
        Self {
            target,
            roots,
            build_list,
            direct: BTreeSet::new(),
        }
    }

    /// State seeded from edited requirements
    pub fn from_requirements(target: ModuleVersion, requirements: &Requirements) -> Self {
        let mut state = Self::new(target, requirements.root_modules().to_vec());
        state.direct = requirements.direct().clone();
        state
    }

    /// Requirements for the editor at `depth`
    pub fn requirements(&self, depth: Depth) -> Requirements {
        Requirements::new(depth, self.roots.clone(), self.direct.clone())
    }

    /// Version of `path` in the build list
    pub fn selected(&self, path: &str) -> Option<&str> {
        self.build_list
            .iter()
            .find(|m| m.path == path)
            .map(|m| m.version.as_str())
    }
}

/// Result of a successful load
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: ModuleState,
    pub packages: PackageGraph,
    /// Modules added to resolve missing imports, in the order they were added
    pub added: Vec<ModuleVersion>,
}

/// Loads package graphs against a module's build list
pub struct Loader<'a> {
    config: LoaderConfig,
    resolver: &'a dyn ImportResolver,
    requirements: &'a dyn RequirementSource,
}

impl<'a> Loader<'a> {
    pub fn new(
        config: LoaderConfig,
        resolver: &'a dyn ImportResolver,
        requirements: &'a dyn RequirementSource,
    ) -> Self {
        Self {
            config,
            resolver,
            requirements,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the packages named by `request.roots`
    pub fn load(&self, state: ModuleState, request: &LoadRequest) -> ModResult<LoadOutcome> {
        self.load_with(state, request, |_| request.roots.clone())
    }

    /// Load with roots recomputed from the build list on every attempt
    pub fn load_with<F>(&self, state: ModuleState, request: &LoadRequest, roots_fn: F) -> ModResult<LoadOutcome>
    where
        F: Fn(&[ModuleVersion]) -> Vec<String>,
    {
        let target = state.target.clone();
        let pool = self.pool()?;

        let mut roots = state.roots.clone();
        let mut build_list = mvs::build_list(&target, &RootReqs::new(&target, &roots, self.requirements))?;

        let mut tried: HashSet<String> = HashSet::new();
        let mut added_by: HashMap<ModuleVersion, String> = HashMap::new();
        let mut added: Vec<ModuleVersion> = Vec::new();
        let mut iteration = 0usize;

        let discovered = loop {
            iteration += 1;
            let root_paths = roots_fn(&build_list);
            debug!(
                iteration,
                roots = root_paths.len(),
                modules = build_list.len(),
                jobs = self.config.jobs,
                "loading packages"
            );

            let discovered = discover(&pool, self.resolver, &target, &build_list, &root_paths, request);

            let mut to_add: Vec<ModuleVersion> = Vec::new();
            for pkg in &discovered.packages {
                if pkg.is_test() {
                    continue;
                }
                let Some(candidate) = pkg.err().and_then(|err| err.missing_candidate()) else {
                    continue;
                };
                info!("found {} in {} {}", pkg.path(), candidate.path, candidate.version);

                if !tried.insert(pkg.path().to_string()) {
                    return Err(ModError::ResolutionLoop {
                        path: pkg.path().to_string(),
                        stack: pkg.stack_text(),
                    });
                }
                if !build_list.contains(candidate) && !to_add.contains(candidate) {
                    added_by.insert(candidate.clone(), pkg.stack_text());
                    to_add.push(candidate.clone());
                }
            }

            if to_add.is_empty() {
                break discovered;
            }

            let mut reqs: Vec<ModuleVersion> = build_list.iter().skip(1).cloned().collect();
            reqs.extend(to_add.iter().cloned());
            build_list = mvs::build_list(&target, &RootReqs::new(&target, &reqs, self.requirements))
                .map_err(|err| attribute(err, &added_by))?;

            for m in &to_add {
                roots.retain(|r| r.path != m.path);
                roots.push(m.clone());
            }
            added.extend(to_add);
        };

        let direct = direct_paths(&target, &discovered.packages);
        sort_modules(&mut roots);
        debug!(
            iterations = iteration,
            added = added.len(),
            direct = direct.len(),
            "package graph stable"
        );

        let packages = PackageGraph::new(
            target.clone(),
            build_list.clone(),
            discovered.roots,
            discovered.packages,
            direct.clone(),
        );
        let state = ModuleState {
            target,
            roots,
            build_list,
            direct,
        };
        Ok(LoadOutcome { state, packages, added })
    }

    /// Drop modules that provide no loaded package and minimize the roots.
    ///
    /// Modules used directly by the target are always kept as roots.
    pub fn tidy(&self, state: &ModuleState, graph: &PackageGraph) -> ModResult<ModuleState> {
        let target = &state.target;
        let used: HashSet<&str> = graph
            .packages()
            .iter()
            .filter_map(|p| p.module())
            .map(|m| m.path.as_str())
            .collect();

        let keep: Vec<ModuleVersion> = state
            .build_list
            .iter()
            .skip(1)
            .filter(|m| used.contains(m.path.as_str()))
            .cloned()
            .collect();
        let direct: Vec<String> = keep
            .iter()
            .filter(|m| graph.module_used_directly(&m.path))
            .map(|m| m.path.clone())
            .collect();

        let roots = mvs::req(target, &direct, &RootReqs::new(target, &keep, self.requirements))?;
        let build_list = mvs::build_list(target, &RootReqs::new(target, &roots, self.requirements))?;
        debug!(
            kept = keep.len(),
            dropped = state.build_list.len().saturating_sub(keep.len() + 1),
            roots = roots.len(),
            "tidied requirements"
        );

        Ok(ModuleState {
            target: target.clone(),
            roots,
            build_list,
            direct: direct.into_iter().collect(),
        })
    }

    fn pool(&self) -> ModResult<ThreadPool> {
        let jobs = if self.config.jobs == 0 {
            warn!("loader configured with zero jobs, using one");
            1
        } else {
            self.config.jobs
        };
        ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("modgraph-loader-{}", i))
            .build()
            .map_err(|e| ModError::source("Failed to start loader workers".to_string(), e))
    }
}

/// Report a build list failure caused by an added module with the import
/// stack of the package that added it
fn attribute(err: ModError, added_by: &HashMap<ModuleVersion, String>) -> ModError {
    let found = match &err {
        ModError::BuildList { module, .. } => added_by.get(module).map(|stack| (module.clone(), stack.clone())),
        _ => None,
    };
    match found {
        Some((module, context)) => ModError::BuildList {
            module,
            context,
            source: Box::new(err),
        },
        None => err,
    }
}

/// Module paths providing packages that target-module packages import
fn direct_paths(target: &ModuleVersion, packages: &[Arc<LoadPkg>]) -> BTreeSet<String> {
    let mut direct = BTreeSet::new();
    for pkg in packages {
        if pkg.module() != Some(target) {
            continue;
        }
        for import in pkg.imports() {
            if let Some(m) = import.module() {
                if !m.path.is_empty() && m.path != target.path {
                    direct.insert(m.path.clone());
                }
            }
        }
    }
    direct
}
