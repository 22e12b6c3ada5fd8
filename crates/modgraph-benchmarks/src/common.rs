//! Common utilities for benchmarks

use std::sync::Arc;

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

use modgraph_core::types::{Depth, ModuleVersion};
use modgraph_registry::MemoryRegistry;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Versions every synthetic module is published at
pub const VERSIONS: [&str; 2] = ["v1.0.0", "v1.1.0"];

/// A synthetic module graph: `layers` layers of `width` modules, each module
/// requiring two modules of the next layer and providing one package that
/// imports theirs
pub struct LayeredGraph {
    pub registry: Arc<MemoryRegistry>,
    pub target: ModuleVersion,
    /// Layer-0 modules at their lowest version
    pub roots: Vec<ModuleVersion>,
    pub layers: usize,
    pub width: usize,
}

impl LayeredGraph {
    pub fn new(layers: usize, width: usize) -> Self {
        let registry = MemoryRegistry::new();
        let target = ModuleVersion::target("example.com/app");

        for layer in 0..layers {
            for i in 0..width {
                let path = module_path(layer, i);
                for version in VERSIONS {
                    let m = ModuleVersion::new(path.clone(), version);
                    let next: Vec<String> = if layer + 1 < layers {
                        vec![module_path(layer + 1, i), module_path(layer + 1, (i + 1) % width)]
                    } else {
                        Vec::new()
                    };
                    let require = next.iter().map(|p| ModuleVersion::new(p.clone(), version)).collect();
                    let imports: Vec<&str> = next.iter().map(String::as_str).collect();

                    registry.add_module(m.clone(), require, Depth::Lazy);
                    registry.add_package(&m, &path, &imports, &[]);
                }
            }
        }

        let roots: Vec<ModuleVersion> = (0..width)
            .map(|i| ModuleVersion::new(module_path(0, i), VERSIONS[0]))
            .collect();
        let imports: Vec<String> = roots.iter().map(|m| m.path.clone()).collect();
        let imports: Vec<&str> = imports.iter().map(String::as_str).collect();
        registry.add_package(&target, "example.com/app", &imports, &[]);

        Self {
            registry: Arc::new(registry),
            target,
            roots,
            layers,
            width,
        }
    }

    /// Number of modules in the graph, per version
    pub fn module_count(&self) -> usize {
        self.layers * self.width
    }

    /// Layer-0 modules at their highest version
    pub fn upgrades(&self) -> Vec<ModuleVersion> {
        self.roots
            .iter()
            .map(|m| ModuleVersion::new(m.path.clone(), VERSIONS[1]))
            .collect()
    }

    /// A pin on the first module of the last layer at its lowest version
    pub fn deep_pin(&self) -> ModuleVersion {
        ModuleVersion::new(module_path(self.layers.saturating_sub(1), 0), VERSIONS[0])
    }
}

/// Path of module `i` in `layer`
pub fn module_path(layer: usize, i: usize) -> String {
    format!("example.com/l{}/m{}", layer, i)
}
