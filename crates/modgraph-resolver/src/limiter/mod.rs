//! Version limiter
//!
//! Tracks an upper bound ("ceiling") per module path and decides how far each
//! module can be raised without any transitive requirement exceeding a
//! ceiling. Requirement graphs may contain cycles: a module version is marked
//! provisional before its requirements are explored, and every version that
//! was provisionally accepted on top of a later-disqualified one is
//! disqualified through the reverse dependency lists.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::{RequirementSource, VersionSource};
use modgraph_core::types::{compare_versions, Depth, ModuleVersion, NONE};

/// Why a module version cannot be selected
#[derive(Debug, Clone)]
pub enum Disqualification {
    /// The module's requirements could not be read
    Unreadable(Arc<ModError>),
    /// The module (transitively) requires this version, which exceeds its ceiling
    Conflict(ModuleVersion),
}

impl Disqualification {
    /// The version that exceeded its ceiling, if that is the reason
    pub fn conflict(&self) -> Option<&ModuleVersion> {
        match self {
            Disqualification::Conflict(m) => Some(m),
            Disqualification::Unreadable(_) => None,
        }
    }

    /// The read failure, if that is the reason
    pub fn error(&self) -> Option<&Arc<ModError>> {
        match self {
            Disqualification::Unreadable(err) => Some(err),
            Disqualification::Conflict(_) => None,
        }
    }
}

/// Memoized status of an explored module version
#[derive(Debug, Clone)]
enum Status {
    /// Accepted so far; a cycle may still disqualify it
    Provisional,
    Disqualified(Disqualification),
}

/// Ceiling-constrained version selection for one editing pass
pub struct VersionLimiter<'a> {
    target: ModuleVersion,
    depth: Depth,
    source: &'a dyn RequirementSource,

    /// Highest acceptable version per path; absent paths are unlimited
    max: HashMap<String, String>,
    /// Highest version found acceptable per path during `upgrade_toward`
    selected: HashMap<String, String>,
    /// Absent entries are unexplored
    status: HashMap<ModuleVersion, Status>,
    /// Versions provisionally accepted on top of each key
    requiring: HashMap<ModuleVersion, Vec<ModuleVersion>>,
}

impl<'a> VersionLimiter<'a> {
    /// Create a limiter with no ceilings; the target is always selected
    pub fn new(target: &ModuleVersion, depth: Depth, source: &'a dyn RequirementSource) -> Self {
        let mut selected = HashMap::new();
        selected.insert(target.path.clone(), target.version.clone());

        Self {
            target: target.clone(),
            depth,
            source,
            max: HashMap::new(),
            selected,
            status: HashMap::new(),
            requiring: HashMap::new(),
        }
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Current ceiling for `path`, `None` when unlimited
    pub fn max(&self, path: &str) -> Option<&str> {
        self.max.get(path).map(String::as_str)
    }

    /// Current selection for `path`
    pub fn selected(&self, path: &str) -> Option<&str> {
        self.selected.get(path).map(String::as_str)
    }

    /// Record `m` as the selection for its path
    pub fn select(&mut self, m: &ModuleVersion) {
        self.selected.insert(m.path.clone(), m.version.clone());
    }

    /// Every selection except the target and `none`, in no particular order
    pub fn selections(&self) -> Vec<ModuleVersion> {
        self.selected
            .iter()
            .filter(|(path, version)| **path != self.target.path && version.as_str() != NONE)
            .map(|(path, version)| ModuleVersion::new(path.clone(), version.clone()))
            .collect()
    }

    /// Paths that currently have a selection, the target excluded
    pub fn selected_paths(&self) -> Vec<String> {
        self.selected
            .keys()
            .filter(|path| **path != self.target.path)
            .cloned()
            .collect()
    }

    /// Raise the ceiling for `m.path` to at least `m.version`.
    ///
    /// Unlimited paths stay unlimited.
    pub fn allow(&mut self, m: &ModuleVersion) {
        if let Some(current) = self.max.get_mut(&m.path) {
            if compare_versions(current, &m.version) == Ordering::Less {
                *current = m.version.clone();
            }
        }
    }

    /// Lower the ceiling for `m.path` to at most `m.version`
    pub fn limit_to(&mut self, m: &ModuleVersion) {
        let lower = match self.max.get(&m.path) {
            Some(current) => compare_versions(current, &m.version) == Ordering::Greater,
            None => true,
        };
        if lower {
            self.max.insert(m.path.clone(), m.version.clone());
        }
    }

    /// Check whether `m` or anything it requires violates a ceiling.
    ///
    /// Returns `None` when `m` is (at least provisionally) acceptable.
    pub fn check(&mut self, m: &ModuleVersion, depth: Depth) -> Option<Disqualification> {
        if m.is_none() || *m == self.target {
            return None;
        }

        match self.status.get(m) {
            Some(Status::Disqualified(dq)) => return Some(dq.clone()),
            Some(Status::Provisional) => return None,
            None => {},
        }
        self.status.insert(m.clone(), Status::Provisional);

        if let Some(max) = self.max.get(&m.path) {
            if compare_versions(&m.version, max) == Ordering::Greater {
                return Some(self.disqualify(m, Disqualification::Conflict(m.clone())));
            }
        }

        let summary = match self.source.requirements(m) {
            Ok(summary) => summary,
            Err(err) => return Some(self.disqualify(m, Disqualification::Unreadable(Arc::new(err)))),
        };

        let depth = if summary.is_eager() { Depth::Eager } else { depth };
        for r in &summary.require {
            // Unrestricted requirements of a lazy module are irrelevant.
            if depth == Depth::Lazy && !self.max.contains_key(&r.path) {
                continue;
            }

            if let Some(dq) = self.check(r, depth) {
                return Some(self.disqualify(m, dq));
            }
            self.requiring.entry(r.clone()).or_default().push(m.clone());
        }

        None
    }

    /// Check if `m` is already known to be disqualified
    pub fn is_disqualified(&self, m: &ModuleVersion) -> bool {
        matches!(self.status.get(m), Some(Status::Disqualified(_)))
    }

    /// Mark `m` disqualified and propagate to everything accepted on top of it
    pub fn disqualify(&mut self, m: &ModuleVersion, dq: Disqualification) -> Disqualification {
        if let Some(Status::Disqualified(existing)) = self.status.get(m) {
            return existing.clone();
        }
        trace!(module = %m, reason = ?dq, "disqualified");
        self.status.insert(m.clone(), Status::Disqualified(dq.clone()));

        let dependents = self.requiring.remove(m).unwrap_or_default();
        for p in dependents {
            self.disqualify(&p, Disqualification::Conflict(m.clone()));
        }
        dq
    }

    /// Raise the selection for `m.path` as close to `m.version` as the
    /// ceilings allow. Selections never move down.
    pub fn upgrade_toward(&mut self, m: &ModuleVersion, versions: &dyn VersionSource) -> ModResult<()> {
        let selected = match self.selected.get(&m.path) {
            Some(selected) => {
                if compare_versions(selected, &m.version) != Ordering::Less {
                    return Ok(());
                }
                selected.clone()
            },
            None => NONE.to_string(),
        };

        let mut candidate = m.clone();
        if self.check(&candidate, self.depth).is_some() {
            let mut candidates: Vec<String> = versions
                .versions(&m.path)?
                .into_iter()
                .filter(|v| compare_versions(v, &m.version) == Ordering::Less)
                .collect();

            while self.check(&candidate, self.depth).is_some() {
                match candidates.pop() {
                    Some(next) if compare_versions(&selected, &next) == Ordering::Less => {
                        candidate.version = next;
                    },
                    _ => return Ok(()),
                }
            }
        }

        trace!(module = %candidate, requested = %m, "upgraded");
        self.select(&candidate);
        Ok(())
    }
}
