//! Declarative registry contents
//!
//! Tests and embedders describe module graphs as JSON documents:
//!
//! ```json
//! {
//!   "modules": [
//!     { "module": "example.com/a@v1.0.0", "require": ["example.com/c@v1.0.0"] }
//!   ],
//!   "packages": [
//!     { "module": "example.com/a@v1.0.0", "path": "example.com/a", "imports": ["example.com/c"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use modgraph_core::error::ModError;
use modgraph_core::types::{Depth, ModuleVersion};

use crate::{MemoryRegistry, RegistryResult};

/// One registered module version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFixture {
    /// "path@version"
    pub module: String,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub depth: Depth,
}

/// One package inside a module; an empty module version means the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFixture {
    pub module: String,
    pub path: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default, rename = "test-imports")]
    pub test_imports: Vec<String>,
}

/// Full registry description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFixture {
    #[serde(default)]
    pub modules: Vec<ModuleFixture>,
    #[serde(default)]
    pub packages: Vec<PackageFixture>,
}

impl RegistryFixture {
    /// Parse a fixture from JSON
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json).map_err(|e| ModError::source("Invalid registry fixture".to_string(), e))
    }

    /// Render the fixture as pretty-printed JSON
    pub fn to_json(&self) -> RegistryResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ModError::source("Failed to serialize registry fixture".to_string(), e))
    }

    /// Register everything the fixture describes
    pub fn apply(&self, registry: &MemoryRegistry) -> RegistryResult<()> {
        for module in &self.modules {
            let require: Vec<&str> = module.require.iter().map(String::as_str).collect();
            registry.add(&module.module, &require, module.depth)?;
        }
        for package in &self.packages {
            let module: ModuleVersion = package.module.parse()?;
            let imports: Vec<&str> = package.imports.iter().map(String::as_str).collect();
            let test_imports: Vec<&str> = package.test_imports.iter().map(String::as_str).collect();
            registry.add_package(&module, &package.path, &imports, &test_imports);
        }
        Ok(())
    }
}

impl MemoryRegistry {
    /// Build a registry from a JSON fixture
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        let registry = MemoryRegistry::new();
        RegistryFixture::from_json(json)?.apply(&registry)?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgraph_core::source::{ImportResolver, RequirementSource};

    const FIXTURE: &str = r#"{
        "modules": [
            { "module": "example.com/a@v1.0.0", "require": ["example.com/c@v1.0.0"], "depth": "eager" },
            { "module": "example.com/c@v1.0.0" }
        ],
        "packages": [
            { "module": "example.com/app", "path": "example.com/app", "imports": ["example.com/a"] },
            { "module": "example.com/a@v1.0.0", "path": "example.com/a", "test-imports": ["example.com/c"] }
        ]
    }"#;

    #[test]
    fn test_fixture_populates_registry() {
        let registry = MemoryRegistry::from_json(FIXTURE).unwrap();

        let summary = registry
            .requirements(&ModuleVersion::new("example.com/a", "v1.0.0"))
            .unwrap();
        assert_eq!(summary.depth, Depth::Eager);
        assert_eq!(summary.require, vec![ModuleVersion::new("example.com/c", "v1.0.0")]);

        let target = ModuleVersion::target("example.com/app");
        let resolved = registry.resolve_import("example.com/app", &[target]).unwrap();
        assert_eq!(resolved.dir.as_str(), "/work/example.com/app");
    }

    #[test]
    fn test_fixture_json_round_trip() {
        let fixture = RegistryFixture::from_json(FIXTURE).unwrap();
        let json = fixture.to_json().unwrap();
        assert_eq!(RegistryFixture::from_json(&json).unwrap(), fixture);
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(RegistryFixture::from_json("{ \"modules\": 3 }").is_err());

        let fixture = RegistryFixture {
            modules: vec![ModuleFixture {
                module: "broken@".to_string(),
                require: Vec::new(),
                depth: Depth::Lazy,
            }],
            packages: Vec::new(),
        };
        assert!(fixture.apply(&MemoryRegistry::new()).is_err());
    }
}
