//! Requirement summary caching

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modgraph_core::cache::OnceMap;
use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::{RequirementSource, VersionSource};
use modgraph_core::types::{ModuleVersion, Summary};

type CachedSummary = Result<Summary, Arc<ModError>>;

/// Memoizes requirement reads of an underlying source.
///
/// Each module version is read at most once, even under concurrent callers.
/// Failures are cached too and surface as `ModError::Shared`.
#[derive(Debug)]
pub struct RequirementCache<S> {
    source: S,
    summaries: OnceMap<ModuleVersion, CachedSummary>,
    lookups: AtomicUsize,
    reads: AtomicUsize,
}

impl<S> RequirementCache<S> {
    /// Create new requirement cache over `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            summaries: OnceMap::new(),
            lookups: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    /// The wrapped source
    pub fn inner(&self) -> &S {
        &self.source
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.reads.load(Ordering::Relaxed);
        CacheStats {
            total_entries: self.summaries.len(),
            hits: lookups.saturating_sub(misses),
            misses,
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.summaries.clear();
    }
}

impl<S: RequirementSource> RequirementSource for RequirementCache<S> {
    fn requirements(&self, module: &ModuleVersion) -> ModResult<Summary> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.summaries
            .get_or_init(module.clone(), || {
                self.reads.fetch_add(1, Ordering::Relaxed);
                self.source.requirements(module).map_err(Arc::new)
            })
            .map_err(ModError::Shared)
    }
}

impl<S: VersionSource> VersionSource for RequirementCache<S> {
    fn versions(&self, path: &str) -> ModResult<Vec<String>> {
        self.source.versions(path)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that read the underlying source
    pub misses: usize,
}
