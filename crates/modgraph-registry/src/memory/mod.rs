//! In-memory module and package registry

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use tracing::trace;

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::{ImportResolver, RequirementSource, ResolvedImport, ScannedImports, VersionSource};
use modgraph_core::types::{compare_versions, Depth, ModuleVersion, Summary, Tags};
use modgraph_core::utils::has_path_prefix;

use crate::RegistryResult;

/// Root under which non-target module directories are laid out
const MODULE_CACHE_ROOT: &str = "/modcache";
/// Root under which the target module's packages live
const WORK_ROOT: &str = "/work";

/// A package registered in one module version
#[derive(Debug, Clone)]
struct PackageEntry {
    imports: Vec<String>,
    test_imports: Vec<String>,
    /// (tag, import) pairs only seen when the tag is satisfied
    tagged_imports: Vec<(String, String)>,
}

/// Registry of module requirements and packages held in memory
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    modules: DashMap<ModuleVersion, Summary>,
    broken: DashMap<ModuleVersion, String>,
    /// Packages keyed by directory
    packages: DashMap<Utf8PathBuf, PackageEntry>,
    /// Module versions that provide each import path
    providers: DashMap<String, Vec<ModuleVersion>>,
    scan_delay: delay::Delay,
    requirement_reads: AtomicUsize,
    scans: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` ("path@version") requiring each of `require`
    pub fn add(&self, module: &str, require: &[&str], depth: Depth) -> RegistryResult<()> {
        let module: ModuleVersion = module.parse()?;
        let require = require
            .iter()
            .map(|r| r.parse())
            .collect::<ModResult<Vec<ModuleVersion>>>()?;
        self.add_module(module, require, depth);
        Ok(())
    }

    /// Register a module version with its requirement summary
    pub fn add_module(&self, module: ModuleVersion, require: Vec<ModuleVersion>, depth: Depth) {
        trace!(module = %module, requirements = require.len(), "registered module");
        self.broken.remove(&module);
        self.modules.insert(module, Summary::new(require, depth));
    }

    /// Make reading the requirements of `module` fail with `reason`
    pub fn break_module(&self, module: &ModuleVersion, reason: &str) {
        self.broken.insert(module.clone(), reason.to_string());
    }

    /// Register the package `import_path` in `module`
    pub fn add_package(&self, module: &ModuleVersion, import_path: &str, imports: &[&str], test_imports: &[&str]) {
        let entry = PackageEntry {
            imports: imports.iter().map(|s| s.to_string()).collect(),
            test_imports: test_imports.iter().map(|s| s.to_string()).collect(),
            tagged_imports: Vec::new(),
        };
        self.packages.insert(package_dir(module, import_path), entry);

        let mut providers = self.providers.entry(import_path.to_string()).or_default();
        if !providers.contains(module) {
            providers.push(module.clone());
        }
    }

    /// Add an import to a registered package that is only seen when `tag` holds
    pub fn add_tagged_import(
        &self,
        module: &ModuleVersion,
        import_path: &str,
        tag: &str,
        import: &str,
    ) -> RegistryResult<()> {
        let dir = package_dir(module, import_path);
        let mut entry = self.packages.get_mut(&dir).ok_or_else(|| missing_dir(&dir))?;
        entry.tagged_imports.push((tag.to_string(), import.to_string()));
        Ok(())
    }

    /// Sleep this long in every `scan_imports` call
    pub fn set_scan_delay(&self, delay: Duration) {
        self.scan_delay.set(delay);
    }

    /// Number of requirement reads served so far
    pub fn requirement_reads(&self) -> usize {
        self.requirement_reads.load(AtomicOrdering::Relaxed)
    }

    /// Number of directory scans served so far
    pub fn scans(&self) -> usize {
        self.scans.load(AtomicOrdering::Relaxed)
    }

    /// Directory the registry assigns to `import_path` inside `module`
    pub fn dir_of(&self, module: &ModuleVersion, import_path: &str) -> Utf8PathBuf {
        package_dir(module, import_path)
    }
}

impl RequirementSource for MemoryRegistry {
    fn requirements(&self, module: &ModuleVersion) -> ModResult<Summary> {
        self.requirement_reads.fetch_add(1, AtomicOrdering::Relaxed);

        if let Some(reason) = self.broken.get(module) {
            return Err(ModError::Requirements {
                module: module.to_string(),
                reason: reason.clone(),
            });
        }
        self.modules
            .get(module)
            .map(|summary| summary.clone())
            .ok_or_else(|| ModError::Requirements {
                module: module.to_string(),
                reason: "unknown module version".to_string(),
            })
    }
}

impl VersionSource for MemoryRegistry {
    fn versions(&self, path: &str) -> ModResult<Vec<String>> {
        let mut versions: Vec<String> = self
            .modules
            .iter()
            .filter(|entry| entry.key().path == path)
            .map(|entry| entry.key().version.clone())
            .collect();
        if versions.is_empty() {
            return Err(ModError::UnknownModule {
                path: path.to_string(),
            });
        }
        versions.sort_by(|a, b| compare_versions(a, b));
        versions.dedup();
        Ok(versions)
    }
}

impl ImportResolver for MemoryRegistry {
    fn resolve_import(&self, path: &str, build_list: &[ModuleVersion]) -> ModResult<ResolvedImport> {
        let providers = self
            .providers
            .get(path)
            .map(|p| p.clone())
            .unwrap_or_default();

        let matches: Vec<&ModuleVersion> = build_list
            .iter()
            .filter(|m| !m.is_none() && has_path_prefix(path, &m.path) && providers.contains(m))
            .collect();

        match matches.as_slice() {
            [module] => Ok(ResolvedImport {
                module: (*module).clone(),
                dir: package_dir(module, path),
            }),
            [] => {
                let candidate = providers
                    .iter()
                    .filter(|m| !m.version.is_empty())
                    .max_by(|a, b| compare_versions(&a.version, &b.version))
                    .cloned();
                Err(ModError::missing(path, candidate))
            },
            many => Err(ModError::AmbiguousImport {
                path: path.to_string(),
                modules: many.iter().map(|m| m.to_string()).collect(),
            }),
        }
    }

    fn scan_imports(&self, dir: &Utf8Path, tags: &Tags) -> ModResult<ScannedImports> {
        self.scans.fetch_add(1, AtomicOrdering::Relaxed);
        self.scan_delay.wait();

        let entry = self.packages.get(dir).ok_or_else(|| missing_dir(dir))?;
        let mut imports = entry.imports.clone();
        imports.extend(
            entry
                .tagged_imports
                .iter()
                .filter(|(tag, _)| tags.matches(tag))
                .map(|(_, import)| import.clone()),
        );

        Ok(ScannedImports {
            imports,
            test_imports: entry.test_imports.clone(),
        })
    }
}

fn package_dir(module: &ModuleVersion, import_path: &str) -> Utf8PathBuf {
    let mut dir = if module.version.is_empty() {
        Utf8PathBuf::from(WORK_ROOT).join(&module.path)
    } else {
        Utf8PathBuf::from(MODULE_CACHE_ROOT).join(module.to_string())
    };
    let rel = import_path
        .strip_prefix(module.path.as_str())
        .unwrap_or(import_path)
        .trim_start_matches('/');
    if !rel.is_empty() {
        dir.push(rel);
    }
    dir
}

fn missing_dir(dir: &Utf8Path) -> ModError {
    ModError::io(
        format!("reading package directory {}", dir),
        io::Error::new(io::ErrorKind::NotFound, "no package registered"),
    )
}

mod delay {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Adjustable sleep shared by all scanning threads
    #[derive(Debug, Default)]
    pub struct Delay {
        micros: AtomicU64,
    }

    impl Delay {
        pub fn set(&self, delay: Duration) {
            let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
            self.micros.store(micros, Ordering::Relaxed);
        }

        pub fn wait(&self) {
            let micros = self.micros.load(Ordering::Relaxed);
            if micros > 0 {
                std::thread::sleep(Duration::from_micros(micros));
            }
        }
    }
}
