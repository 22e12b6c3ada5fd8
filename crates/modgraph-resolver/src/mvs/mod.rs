//! Minimal version selection
//!
//! `build_list` selects, for every module path reachable from the target, the
//! highest version any reachable module version requires. `req` computes the
//! smallest requirement list that reproduces a build list.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use modgraph_core::error::ModResult;
use modgraph_core::source::RequirementSource;
use modgraph_core::types::{max_version, sort_modules, ModuleVersion};

use crate::graph::RequirementGraph;

/// Requirement graph provider for selection
pub trait Reqs {
    /// Direct requirements of `m`
    fn required(&self, m: &ModuleVersion) -> ModResult<Vec<ModuleVersion>>;
}

/// Requirements where the target's own requirements are an explicit root list
pub struct RootReqs<'a> {
    target: &'a ModuleVersion,
    roots: &'a [ModuleVersion],
    source: &'a dyn RequirementSource,
}

impl<'a> RootReqs<'a> {
    pub fn new(
        target: &'a ModuleVersion,
        roots: &'a [ModuleVersion],
        source: &'a dyn RequirementSource,
    ) -> Self {
        Self {
            target,
            roots,
            source,
        }
    }
}

impl Reqs for RootReqs<'_> {
    fn required(&self, m: &ModuleVersion) -> ModResult<Vec<ModuleVersion>> {
        if m == self.target {
            return Ok(self.roots.to_vec());
        }
        if m.is_none() {
            return Ok(Vec::new());
        }
        Ok(self.source.requirements(m)?.require)
    }
}

/// Compute the build list for `target`: the target first, then the selected
/// version of every other reachable path, sorted by path.
pub fn build_list(target: &ModuleVersion, reqs: &dyn Reqs) -> ModResult<Vec<ModuleVersion>> {
    let mut graph = RequirementGraph::new(target);
    let mut queue = VecDeque::from([target.clone()]);
    let mut seen = HashSet::from([target.clone()]);

    while let Some(m) = queue.pop_front() {
        if m.is_none() {
            continue;
        }
        let required = reqs.required(&m).map_err(|err| graph.error_at(&m, err))?;
        for r in &required {
            if seen.insert(r.clone()) {
                queue.push_back(r.clone());
            }
        }
        graph.require(&m, &required);
    }

    let list = graph.build_list();
    debug!(
        target = %target,
        modules = list.len(),
        visited = graph.module_count(),
        "computed build list"
    );
    Ok(list)
}

/// Minimal requirement list for `target` that yields the same build list.
///
/// Paths in `base` are always listed; any other module is listed only when no
/// already listed module implies it. The result is sorted by path.
pub fn req(target: &ModuleVersion, base: &[String], reqs: &dyn Reqs) -> ModResult<Vec<ModuleVersion>> {
    let list = build_list(target, reqs)?;

    // Postorder over the requirement graph, caching each module's requirements.
    let mut cache: HashMap<ModuleVersion, Vec<ModuleVersion>> = HashMap::new();
    cache.insert(target.clone(), Vec::new());
    let mut postorder: Vec<ModuleVersion> = Vec::new();

    for start in &list {
        if cache.contains_key(start) {
            continue;
        }
        cache.insert(start.clone(), reqs.required(start)?);
        let mut stack: Vec<(ModuleVersion, usize)> = vec![(start.clone(), 0)];

        while let Some(top) = stack.last_mut() {
            let next = cache[&top.0].get(top.1).cloned();
            top.1 += 1;
            match next {
                Some(r) => {
                    if !cache.contains_key(&r) {
                        let required = reqs.required(&r)?;
                        cache.insert(r.clone(), required);
                        stack.push((r, 0));
                    }
                },
                None => {
                    if let Some((m, _)) = stack.pop() {
                        postorder.push(m);
                    }
                },
            }
        }
    }

    let mut max: HashMap<&str, &str> = HashMap::new();
    for m in &list {
        let entry = max.entry(m.path.as_str()).or_insert(m.version.as_str());
        *entry = max_version(*entry, m.version.as_str());
    }

    let mut have: HashSet<ModuleVersion> = HashSet::new();
    let mut min: Vec<ModuleVersion> = Vec::new();

    for path in base {
        if *path == target.path {
            continue;
        }
        let Some(version) = max.get(path.as_str()) else {
            continue;
        };
        let m = ModuleVersion::new(path.clone(), *version);
        min.push(m.clone());
        mark_implied(&m, &cache, &mut have);
    }

    for m in postorder.iter().rev() {
        if max.get(m.path.as_str()).copied() != Some(m.version.as_str()) {
            // Older version
            continue;
        }
        if !have.contains(m) {
            min.push(m.clone());
            mark_implied(m, &cache, &mut have);
        }
    }

    sort_modules(&mut min);
    min.dedup();
    Ok(min)
}

/// Mark `m` and everything it transitively requires as implied
fn mark_implied(
    m: &ModuleVersion,
    cache: &HashMap<ModuleVersion, Vec<ModuleVersion>>,
    have: &mut HashSet<ModuleVersion>,
) {
    let mut stack = vec![m.clone()];
    while let Some(next) = stack.pop() {
        if !have.insert(next.clone()) {
            continue;
        }
        if let Some(required) = cache.get(&next) {
            stack.extend(required.iter().cloned());
        }
    }
}
