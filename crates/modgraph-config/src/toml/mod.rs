//! modgraph.toml configuration parsing and serialization

use serde::{Deserialize, Serialize};

use modgraph_core::error::ModError;
use modgraph_core::types::{Depth, ModuleVersion, Tags};
use modgraph_core::utils::check_import_path;
use modgraph_loader::{AllLevel, LoaderConfig};

use crate::ConfigResult;

/// Complete modgraph.toml configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModgraphToml {
    /// Target module section; required in a project file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleSection>,

    /// Package loader settings
    #[serde(default)]
    pub loader: LoaderSection,
}

/// The module being built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    /// Module path (e.g., "example.com/app")
    pub path: String,

    /// Pruning depth of the module's own requirements
    #[serde(default)]
    pub depth: Depth,
}

/// Loader settings; unset fields fall back to lower layers, then defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoaderSection {
    /// Worker threads for package discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Load the tests of root packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_tests: Option<bool>,

    /// Extent of the "all" closure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<String>,

    /// Build tags; empty means any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ModgraphToml {
    /// The configured target module
    pub fn target(&self) -> ConfigResult<ModuleVersion> {
        let module = self.module.as_ref().ok_or_else(|| ModError::ConfigValidation {
            field: "module".to_string(),
            reason: "A [module] section with a path is required".to_string(),
        })?;
        Ok(ModuleVersion::target(module.path.clone()))
    }

    /// Pruning depth of the target, lazy when unset
    pub fn depth(&self) -> Depth {
        self.module.as_ref().map(|m| m.depth).unwrap_or_default()
    }

    /// Loader configuration with defaults filled in
    pub fn loader_config(&self) -> ConfigResult<LoaderConfig> {
        let defaults = LoaderConfig::default();
        let section = &self.loader;

        let all_level = match &section.all {
            Some(all) => all.parse::<AllLevel>()?,
            None => defaults.all_level,
        };
        let tags = match &section.tags {
            Some(tags) if !tags.is_empty() => Tags::only(tags.iter().cloned()),
            _ => Tags::Any,
        };

        Ok(LoaderConfig {
            jobs: section.jobs.unwrap_or(defaults.jobs),
            load_tests: section.load_tests.unwrap_or(defaults.load_tests),
            all_level,
            tags,
        })
    }
}

/// Parse TOML string to ModgraphToml configuration
pub fn parse_modgraph_toml(content: &str) -> ConfigResult<ModgraphToml> {
    // Syntax pass first; toml_edit reports locations
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ModError::TomlParse {
            message: format!("TOML syntax error: {}", e),
        })?;

    let config: ModgraphToml = toml::from_str(content).map_err(|e| ModError::TomlParse {
        message: format!("TOML parsing error: {}", e),
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize ModgraphToml to TOML string
pub fn serialize_modgraph_toml(config: &ModgraphToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| ModError::TomlParse {
        message: format!("TOML serialization error: {}", e),
    })
}

/// Validate configuration values
pub fn validate_config(config: &ModgraphToml) -> ConfigResult<()> {
    if let Some(module) = &config.module {
        if module.path.trim().is_empty() {
            return Err(ModError::ConfigValidation {
                field: "module.path".to_string(),
                reason: "Module path is required in [module] section".to_string(),
            });
        }
        check_import_path(&module.path).map_err(|e| ModError::ConfigValidation {
            field: "module.path".to_string(),
            reason: e.to_string(),
        })?;
    }

    if config.loader.jobs == Some(0) {
        return Err(ModError::ConfigValidation {
            field: "loader.jobs".to_string(),
            reason: "At least one worker is required".to_string(),
        });
    }

    if let Some(all) = &config.loader.all {
        all.parse::<AllLevel>()?;
    }

    if let Some(tags) = &config.loader.tags {
        if let Some(tag) = tags.iter().find(|t| t.trim().is_empty() || t.contains(',')) {
            return Err(ModError::ConfigValidation {
                field: "loader.tags".to_string(),
                reason: format!("Invalid build tag '{}'", tag),
            });
        }
    }

    Ok(())
}

/// Load and parse modgraph.toml from file path
pub async fn load_from_file(path: &camino::Utf8Path) -> ConfigResult<ModgraphToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModError::io(format!("Failed to read {}", path), e))?;

    parse_modgraph_toml(&content).map_err(|e| match e {
        ModError::TomlParse { message } => ModError::TomlParse {
            message: format!("In file {}: {}", path, message),
        },
        ModError::ConfigValidation { field, reason } => ModError::ConfigValidation {
            field,
            reason: format!("In file {}: {}", path, reason),
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[module]
path = "example.com/app"
"#;

        let config = parse_modgraph_toml(toml).unwrap();
        assert_eq!(config.target().unwrap(), ModuleVersion::target("example.com/app"));
        assert_eq!(config.depth(), Depth::Lazy);
        assert_eq!(config.loader, LoaderSection::default());

        let loader = config.loader_config().unwrap();
        assert_eq!(loader.all_level, AllLevel::RootsOnly);
        assert!(!loader.load_tests);
        assert!(loader.tags.is_any());
        assert!(loader.jobs >= 1);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[module]
path = "example.com/app"
depth = "eager"

[loader]
jobs = 8
load-tests = true
all = "target-test-transitive"
tags = ["linux", "amd64"]
"#;

        let config = parse_modgraph_toml(toml).unwrap();
        assert_eq!(config.depth(), Depth::Eager);

        let loader = config.loader_config().unwrap();
        assert_eq!(loader.jobs, 8);
        assert!(loader.load_tests);
        assert_eq!(loader.all_level, AllLevel::TargetTestTransitive);
        assert!(loader.tags.matches("linux"));
        assert!(!loader.tags.matches("windows"));
    }

    #[test]
    fn test_loader_only_file() {
        let config = parse_modgraph_toml("[loader]\njobs = 2\n").unwrap();
        assert!(config.module.is_none());
        assert!(matches!(
            config.target(),
            Err(ModError::ConfigValidation { ref field, .. }) if field == "module"
        ));
        assert_eq!(config.loader_config().unwrap().jobs, 2);
    }

    #[test]
    fn test_empty_tags_mean_any() {
        let config = parse_modgraph_toml("[loader]\ntags = []\n").unwrap();
        assert!(config.loader_config().unwrap().tags.is_any());
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("[module]\npath = \"\"\n", "module.path"),
            ("[module]\npath = \"./app\"\n", "module.path"),
            ("[loader]\njobs = 0\n", "loader.jobs"),
            ("[loader]\nall = \"everything\"\n", "all"),
            ("[loader]\ntags = [\"linux,amd64\"]\n", "loader.tags"),
        ];
        for (toml, expected) in cases {
            match parse_modgraph_toml(toml) {
                Err(ModError::ConfigValidation { field, .. }) => assert_eq!(field, expected, "{}", toml),
                other => panic!("expected validation error for {:?}, got {:?}", toml, other),
            }
        }
    }

    #[test]
    fn test_syntax_and_type_errors() {
        assert!(matches!(
            parse_modgraph_toml("[module\npath = 1"),
            Err(ModError::TomlParse { .. })
        ));
        assert!(matches!(
            parse_modgraph_toml("[module]\npath = \"example.com/app\"\ndepth = \"deep\"\n"),
            Err(ModError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_round_trip_serialization() {
        let toml = r#"
[module]
path = "example.com/app"
depth = "eager"

[loader]
all = "target-imported"
tags = ["linux"]
"#;

        let config = parse_modgraph_toml(toml).unwrap();
        let serialized = serialize_modgraph_toml(&config).unwrap();
        let reparsed = parse_modgraph_toml(&serialized).unwrap();

        assert_eq!(config, reparsed);
        assert!(!serialized.contains("jobs"));
    }
}
