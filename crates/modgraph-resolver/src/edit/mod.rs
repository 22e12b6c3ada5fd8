//! Requirement editing
//!
//! Raises some root requirements toward requested versions while pinning
//! others to exact versions, keeping every transitive requirement within the
//! resulting ceilings. A request that cannot be honored is reported as a
//! single conflict error and leaves the requirements untouched.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::{RequirementSource, VersionSource};
use modgraph_core::types::{sort_modules, Conflict, Depth, ModuleVersion, NONE};

use crate::graph::ModuleGraph;
use crate::limiter::{Disqualification, VersionLimiter};
use crate::mvs::{self, RootReqs};

/// Root requirements of the target module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirements {
    depth: Depth,
    /// Sorted by path, at most one version per path
    root_modules: Vec<ModuleVersion>,
    /// Paths of modules providing packages the target imports directly
    direct: BTreeSet<String>,
}

impl Requirements {
    pub fn new(depth: Depth, mut root_modules: Vec<ModuleVersion>, direct: BTreeSet<String>) -> Self {
        sort_modules(&mut root_modules);
        root_modules.dedup();
        Self {
            depth,
            root_modules,
            direct,
        }
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn root_modules(&self) -> &[ModuleVersion] {
        &self.root_modules
    }

    pub fn direct(&self) -> &BTreeSet<String> {
        &self.direct
    }

    pub fn is_direct(&self, path: &str) -> bool {
        self.direct.contains(path)
    }

    /// Version of `path` among the roots, if it is a root
    pub fn root_selected(&self, path: &str) -> Option<&str> {
        self.root_modules
            .iter()
            .find(|m| m.path == path)
            .map(|m| m.version.as_str())
    }

    /// Read the module graph rooted at these requirements
    pub fn graph(&self, target: &ModuleVersion, source: &dyn RequirementSource) -> ModResult<ModuleGraph> {
        ModuleGraph::read(target, &self.root_modules, self.depth, source)
    }
}

/// Collaborators for one edit
#[derive(Clone, Copy)]
pub struct EditContext<'a> {
    pub target: &'a ModuleVersion,
    pub requirements: &'a dyn RequirementSource,
    pub versions: &'a dyn VersionSource,
}

impl<'a> EditContext<'a> {
    pub fn new(
        target: &'a ModuleVersion,
        requirements: &'a dyn RequirementSource,
        versions: &'a dyn VersionSource,
    ) -> Self {
        Self {
            target,
            requirements,
            versions,
        }
    }
}

/// Result of a successful edit
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub requirements: Requirements,
    /// Whether the root requirements differ from the input
    pub changed: bool,
}

/// Edit `rs` so that every module in `must_select` is selected at exactly its
/// version and every module in `try_upgrade` is raised as close to its
/// version as those pins allow.
///
/// Returns `ModError::Conflict` listing every violated pin when the request
/// cannot be satisfied.
pub fn edit_requirements(
    ctx: &EditContext<'_>,
    rs: &Requirements,
    try_upgrade: &[ModuleVersion],
    must_select: &[ModuleVersion],
) -> ModResult<EditOutcome> {
    let target = ctx.target;
    let mg = rs.graph(target, ctx.requirements)?;
    let mut limiter = VersionLimiter::new(target, rs.depth, ctx.requirements);

    let initial: Vec<ModuleVersion> = match rs.depth {
        Depth::Lazy => {
            for r in &rs.root_modules {
                limiter.limit_to(&ModuleVersion::new(r.path.clone(), mg.selected(&r.path)));
            }
            rs.root_modules.clone()
        },
        Depth::Eager => {
            let tail: Vec<ModuleVersion> = mg.build_list().into_iter().skip(1).collect();
            for m in &tail {
                limiter.limit_to(m);
            }
            tail
        },
    };

    // Let each upgrade raise its own ceiling and the ceilings of what it needs.
    let mut eager_upgrades: Vec<ModuleVersion> = Vec::new();
    for m in try_upgrade {
        if m.path == target.path {
            continue;
        }
        limiter.allow(m);
        if rs.depth == Depth::Eager {
            eager_upgrades.push(m.clone());
            continue;
        }
        let summary = ctx.requirements.requirements(m)?;
        if summary.is_eager() {
            eager_upgrades.push(m.clone());
        } else {
            for r in &summary.require {
                limiter.allow(r);
            }
        }
    }
    if !eager_upgrades.is_empty() {
        let upgraded = ModuleGraph::read(target, &eager_upgrades, Depth::Eager, ctx.requirements)?;
        for m in upgraded.build_list().iter().skip(1) {
            limiter.allow(m);
        }
    }

    let conflicts = apply_must_select(ctx, rs.depth, &mut limiter, try_upgrade, must_select)?;
    if !conflicts.is_empty() {
        debug!(conflicts = conflicts.len(), "edit rejected");
        return Err(ModError::Conflict { conflicts });
    }

    for m in try_upgrade {
        limiter.upgrade_toward(m, ctx.versions)?;
    }
    for m in &initial {
        limiter.upgrade_toward(m, ctx.versions)?;
    }

    let mut mods = limiter.selections();
    sort_modules(&mut mods);

    // Selections may imply higher versions of each other; settle on what a
    // graph over them actually selects.
    let settled = ModuleGraph::read(target, &mods, rs.depth, ctx.requirements)?;
    let mut roots: Vec<ModuleVersion> = limiter
        .selected_paths()
        .into_iter()
        .filter_map(|path| {
            let version = settled.selected(&path).to_string();
            (version != NONE).then(|| ModuleVersion::new(path, version))
        })
        .collect();
    sort_modules(&mut roots);

    match rs.depth {
        Depth::Lazy => {
            if roots == rs.root_modules {
                debug!("lazy edit left roots unchanged");
                return Ok(EditOutcome {
                    requirements: rs.clone(),
                    changed: false,
                });
            }
            let paths: HashSet<&str> = roots.iter().map(|m| m.path.as_str()).collect();
            let direct = rs
                .direct
                .iter()
                .filter(|p| paths.contains(p.as_str()))
                .cloned()
                .collect();
            debug!(roots = roots.len(), "lazy edit changed roots");
            Ok(EditOutcome {
                requirements: Requirements::new(Depth::Lazy, roots, direct),
                changed: true,
            })
        },
        Depth::Eager => {
            let changed = roots != initial;
            if !changed && must_select.is_empty() {
                return Ok(EditOutcome {
                    requirements: rs.clone(),
                    changed: false,
                });
            }

            let mut root_paths: Vec<String> = must_select
                .iter()
                .filter(|m| !m.is_none() && m.path != target.path)
                .map(|m| m.path.clone())
                .collect();
            root_paths.sort();
            root_paths.dedup();
            for m in &roots {
                if rs.root_selected(&m.path) == Some(m.version.as_str()) || rs.is_direct(&m.path) {
                    root_paths.push(m.path.clone());
                }
            }

            let min = mvs::req(target, &root_paths, &RootReqs::new(target, &roots, ctx.requirements))?;
            let paths: HashSet<&str> = min.iter().map(|m| m.path.as_str()).collect();
            let direct = rs
                .direct
                .iter()
                .filter(|p| paths.contains(p.as_str()))
                .cloned()
                .collect();
            debug!(roots = min.len(), changed, "eager edit minimized roots");
            Ok(EditOutcome {
                requirements: Requirements::new(Depth::Eager, min, direct),
                changed,
            })
        },
    }
}

/// Pin every mandatory selection and collect the conflicts it causes
fn apply_must_select(
    ctx: &EditContext<'_>,
    depth: Depth,
    limiter: &mut VersionLimiter<'_>,
    try_upgrade: &[ModuleVersion],
    must_select: &[ModuleVersion],
) -> ModResult<Vec<Conflict>> {
    let mut conflicts = Vec::new();
    if must_select.is_empty() {
        return Ok(conflicts);
    }

    let pinned = ModuleGraph::read(ctx.target, must_select, depth, ctx.requirements)?;
    for m in pinned.build_list().iter().skip(1) {
        limiter.allow(m);
    }
    for m in must_select {
        limiter.limit_to(m);
    }

    for m in must_select {
        match limiter.check(m, depth) {
            Some(Disqualification::Unreadable(err)) => return Err(ModError::Shared(err)),
            Some(Disqualification::Conflict(dep)) => {
                let constraint = ceiling_of(limiter, &dep);
                conflicts.push(Conflict {
                    source: m.clone(),
                    dep,
                    constraint,
                });
            },
            None => {},
        }
        limiter.select(m);
    }

    let pinned_paths: HashSet<&str> = must_select.iter().map(|m| m.path.as_str()).collect();
    for m in try_upgrade {
        if m.path == ctx.target.path || pinned_paths.contains(m.path.as_str()) {
            continue;
        }
        if let Some(Disqualification::Conflict(dep)) = limiter.check(m, depth) {
            if dep.path != m.path && pinned_paths.contains(dep.path.as_str()) {
                let constraint = ceiling_of(limiter, &dep);
                conflicts.push(Conflict {
                    source: m.clone(),
                    dep,
                    constraint,
                });
            }
        }
    }

    Ok(conflicts)
}

fn ceiling_of(limiter: &VersionLimiter<'_>, dep: &ModuleVersion) -> ModuleVersion {
    ModuleVersion::new(dep.path.clone(), limiter.max(&dep.path).unwrap_or(NONE))
}

#[cfg(test)]
mod tests;
