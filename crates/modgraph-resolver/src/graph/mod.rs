//! Requirement graph storage built on petgraph
//!
//! `RequirementGraph` records which module versions require which, and tracks
//! the highest version required for every path. `ModuleGraph` reads such a
//! graph from a `RequirementSource`, honoring each module's pruning depth.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::trace;

use modgraph_core::error::{ModError, ModResult};
use modgraph_core::source::RequirementSource;
use modgraph_core::types::{compare_versions, sort_modules, Depth, ModuleVersion, Summary, NONE};

/// Directed requirement graph with per-path selection
#[derive(Debug)]
pub struct RequirementGraph {
    /// Underlying directed graph
    graph: DiGraph<ModuleVersion, ()>,
    /// Map from module version to node for fast lookups
    node_map: HashMap<ModuleVersion, NodeIndex>,
    /// Nodes whose requirements have been recorded
    expanded: HashSet<NodeIndex>,
    /// Highest version required for each path
    selected: HashMap<String, String>,
    target: ModuleVersion,
}

impl RequirementGraph {
    /// Create a graph rooted at the target module
    pub fn new(target: &ModuleVersion) -> Self {
        let mut graph = Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            expanded: HashSet::new(),
            selected: HashMap::new(),
            target: target.clone(),
        };
        graph.node(target);
        graph
            .selected
            .insert(target.path.clone(), target.version.clone());
        graph
    }

    fn node(&mut self, m: &ModuleVersion) -> NodeIndex {
        if let Some(index) = self.node_map.get(m) {
            return *index;
        }
        let index = self.graph.add_node(m.clone());
        self.node_map.insert(m.clone(), index);
        index
    }

    /// Record the direct requirements of `m`; later calls for `m` are ignored
    pub fn require(&mut self, m: &ModuleVersion, requirements: &[ModuleVersion]) {
        let from = self.node(m);
        if !self.expanded.insert(from) {
            return;
        }

        for r in requirements {
            let to = self.node(r);
            self.graph.add_edge(from, to, ());

            let raise = match self.selected.get(&r.path) {
                Some(current) => compare_versions(current, &r.version) == Ordering::Less,
                None => true,
            };
            if raise {
                self.selected.insert(r.path.clone(), r.version.clone());
            }
        }
    }

    /// The target module this graph is rooted at
    pub fn target(&self) -> &ModuleVersion {
        &self.target
    }

    /// Selected version of `path`, or `none` if nothing requires it
    pub fn selected(&self, path: &str) -> &str {
        self.selected.get(path).map(String::as_str).unwrap_or(NONE)
    }

    /// Direct requirements of `m`, if they have been recorded
    pub fn required_by(&self, m: &ModuleVersion) -> Option<Vec<ModuleVersion>> {
        let index = *self.node_map.get(m)?;
        if !self.expanded.contains(&index) {
            return None;
        }
        // petgraph yields neighbors newest first
        let mut required: Vec<ModuleVersion> = self
            .graph
            .neighbors(index)
            .map(|n| self.graph[n].clone())
            .collect();
        required.reverse();
        Some(required)
    }

    /// Target first, then every participating path at its selected version
    pub fn build_list(&self) -> Vec<ModuleVersion> {
        let mut rest: Vec<ModuleVersion> = self
            .selected
            .iter()
            .filter(|(path, version)| **path != self.target.path && version.as_str() != NONE)
            .map(|(path, version)| ModuleVersion::new(path.clone(), version.clone()))
            .collect();
        sort_modules(&mut rest);

        let mut list = Vec::with_capacity(rest.len() + 1);
        list.push(self.target.clone());
        list.extend(rest);
        list
    }

    /// Shortest requirement chain from the target to `m`, target excluded
    pub fn path_to(&self, m: &ModuleVersion) -> Vec<ModuleVersion> {
        let (Some(&start), Some(&goal)) = (self.node_map.get(&self.target), self.node_map.get(m)) else {
            return vec![m.clone()];
        };

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);
        while let Some(index) = queue.pop_front() {
            if index == goal {
                break;
            }
            for next in self.graph.neighbors(index) {
                if seen.insert(next) {
                    parent.insert(next, index);
                    queue.push_back(next);
                }
            }
        }

        let mut chain = vec![self.graph[goal].clone()];
        let mut current = goal;
        while let Some(&p) = parent.get(&current) {
            if p == start {
                break;
            }
            chain.push(self.graph[p].clone());
            current = p;
        }
        chain.reverse();
        chain
    }

    /// Wrap a requirement read failure with the chain that reached `m`
    pub fn error_at(&self, m: &ModuleVersion, err: ModError) -> ModError {
        let context = self
            .path_to(m)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" requires\n\t");
        ModError::BuildList {
            module: m.clone(),
            context,
            source: Box::new(err),
        }
    }

    /// Number of module versions in the graph
    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of requirement edges in the graph
    pub fn requirement_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Requirement graph read at a pruning depth
#[derive(Debug)]
pub struct ModuleGraph {
    graph: RequirementGraph,
    depth: Depth,
}

impl ModuleGraph {
    /// Read the graph reachable from `roots`.
    ///
    /// A module's requirements are always recorded, but they are followed
    /// further only when the module was reached eagerly or its own summary is
    /// eager. Roots are reached at `depth`.
    pub fn read(
        target: &ModuleVersion,
        roots: &[ModuleVersion],
        depth: Depth,
        source: &dyn RequirementSource,
    ) -> ModResult<Self> {
        let mut graph = RequirementGraph::new(target);
        graph.require(target, roots);

        let mut summaries: HashMap<ModuleVersion, Summary> = HashMap::new();
        let mut seen_lazy: HashSet<ModuleVersion> = HashSet::new();
        let mut seen_eager: HashSet<ModuleVersion> = HashSet::new();
        let mut queue: VecDeque<(ModuleVersion, Depth)> = VecDeque::new();

        for root in roots {
            queue.push_back((root.clone(), depth));
        }

        while let Some((m, reached)) = queue.pop_front() {
            if m.is_none() || m == *target {
                continue;
            }
            let first = match reached {
                Depth::Eager => seen_eager.insert(m.clone()),
                Depth::Lazy => seen_lazy.insert(m.clone()),
            };
            if !first {
                continue;
            }

            if !summaries.contains_key(&m) {
                let summary = source
                    .requirements(&m)
                    .map_err(|err| graph.error_at(&m, err))?;
                graph.require(&m, &summary.require);
                summaries.insert(m.clone(), summary);
            }
            let summary = &summaries[&m];

            if reached == Depth::Eager || summary.is_eager() {
                let next = if reached == Depth::Eager {
                    Depth::Eager
                } else {
                    summary.depth
                };
                for r in &summary.require {
                    queue.push_back((r.clone(), next));
                }
            }
        }

        trace!(
            modules = graph.module_count(),
            requirements = graph.requirement_count(),
            %depth,
            "read module graph"
        );
        Ok(Self { graph, depth })
    }

    /// Selected version of `path`, or `none`
    pub fn selected(&self, path: &str) -> &str {
        self.graph.selected(path)
    }

    pub fn build_list(&self) -> Vec<ModuleVersion> {
        self.graph.build_list()
    }

    pub fn required_by(&self, m: &ModuleVersion) -> Option<Vec<ModuleVersion>> {
        self.graph.required_by(m)
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn requirement_graph(&self) -> &RequirementGraph {
        &self.graph
    }
}
