//! Configuration layering, discovery, and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use modgraph_core::error::ModError;
use modgraph_core::types::Depth;
use modgraph_loader::AllLevel;

use crate::toml::{validate_config, ModgraphToml, ModuleSection};
use crate::ConfigResult;

/// Project configuration file name
pub const CONFIG_FILE: &str = "modgraph.toml";

/// Prefix of environment variables that override configuration
const ENV_PREFIX: &str = "MODGRAPH_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Directory holding the global config; the home directory when unset
    home: Option<Utf8PathBuf>,
}

/// Configuration layering and merging
pub struct ConfigLayering;

/// Where a configuration file was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project modgraph.toml file
    Project(Utf8PathBuf),
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd, home: None }
    }

    /// Look for the global config under `home` instead of the user's home
    pub fn with_home(mut self, home: Utf8PathBuf) -> Self {
        self.home = Some(home);
        self
    }

    /// Load the nearest project configuration
    pub async fn load_project_config(&self) -> ConfigResult<(ModgraphToml, ConfigSource)> {
        let path = self.resolve_config_path(CONFIG_FILE);
        if !path.exists() {
            return Err(ModError::ConfigValidation {
                field: "config".to_string(),
                reason: format!(
                    "No {} found in {} or parent directories",
                    CONFIG_FILE, self.cwd
                ),
            });
        }

        let config = crate::toml::load_from_file(&path).await?;
        if config.module.is_none() {
            return Err(ModError::ConfigValidation {
                field: "module".to_string(),
                reason: format!("In file {}: a [module] section with a path is required", path),
            });
        }
        debug!(path = %path, "loaded project configuration");
        Ok((config, ConfigSource::Project(path)))
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Utf8PathBuf {
        let mut current: Option<&Utf8Path> = Some(self.cwd.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(filename);
            if config_path.exists() {
                return config_path;
            }
            current = dir.parent();
        }

        // Path in the working directory even though it does not exist
        self.cwd.join(filename)
    }

    /// Path of the global configuration file
    pub fn global_config_path(&self) -> ConfigResult<Utf8PathBuf> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => {
                let home_dir = dirs::home_dir().ok_or_else(|| ModError::ConfigValidation {
                    field: "home_dir".to_string(),
                    reason: "Could not determine home directory".to_string(),
                })?;
                Utf8PathBuf::try_from(home_dir).map_err(|e| ModError::ConfigValidation {
                    field: "home_dir".to_string(),
                    reason: format!("Invalid home directory path: {}", e),
                })?
            },
        };
        Ok(home.join(".modgraph").join("config.toml"))
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(ModgraphToml, ConfigSource)>> {
        let path = self.global_config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let config = crate::toml::load_from_file(&path).await?;
        debug!(path = %path, "loaded global configuration");
        Ok(Some((config, ConfigSource::Global(path))))
    }

    /// Load and merge every layer: global, project, environment, `overrides`
    pub async fn load(&self, overrides: HashMap<String, String>) -> ConfigResult<ModgraphToml> {
        let global = self.load_global_config().await?.map(|(config, _)| config);
        let (project, _) = self.load_project_config().await?;
        ConfigLayering::merge_configs(global, project, ConfigLayering::collect_env_overrides(), overrides)
    }
}

impl ConfigLayering {
    /// Merge configuration layers, later layers winning
    pub fn merge_configs(
        global_config: Option<ModgraphToml>,
        project_config: ModgraphToml,
        env_overrides: HashMap<String, String>,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<ModgraphToml> {
        let mut merged = project_config;

        // Global fills loader fields the project leaves unset
        if let Some(global) = global_config {
            let loader = &mut merged.loader;
            loader.jobs = loader.jobs.or(global.loader.jobs);
            loader.load_tests = loader.load_tests.or(global.loader.load_tests);
            loader.all = loader.all.take().or(global.loader.all);
            loader.tags = loader.tags.take().or(global.loader.tags);
        }

        Self::apply_env_overrides(&mut merged, &env_overrides)?;

        // Explicit overrides have the highest priority
        Self::apply_overrides(&mut merged, &overrides)?;

        validate_config(&merged)?;
        Ok(merged)
    }

    fn apply_env_overrides(config: &mut ModgraphToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.strip_prefix(ENV_PREFIX) {
                Some("JOBS") => config.loader.jobs = Some(parse_jobs(key, value)?),
                Some("LOAD_TESTS") => config.loader.load_tests = Some(parse_bool(key, value)?),
                Some("TAGS") => config.loader.tags = Some(parse_tags(value)),
                Some("ALL") => config.loader.all = Some(parse_all(value)?),
                Some("DEPTH") => set_depth(config, key, value)?,
                _ => warn!(variable = %key, "ignoring unknown configuration variable"),
            }
        }

        Ok(())
    }

    fn apply_overrides(config: &mut ModgraphToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "path" => {
                    let depth = config.depth();
                    config.module = Some(ModuleSection {
                        path: value.clone(),
                        depth,
                    });
                },
                "depth" => set_depth(config, key, value)?,
                "jobs" => config.loader.jobs = Some(parse_jobs(key, value)?),
                "load-tests" => config.loader.load_tests = Some(parse_bool(key, value)?),
                "tags" => config.loader.tags = Some(parse_tags(value)),
                "all" => config.loader.all = Some(parse_all(value)?),
                _ => {
                    return Err(ModError::ConfigValidation {
                        field: key.clone(),
                        reason: "Unknown configuration override".to_string(),
                    })
                },
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

fn parse_jobs(field: &str, value: &str) -> ConfigResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ModError::ConfigValidation {
            field: field.to_string(),
            reason: format!("expected a positive worker count, found \"{}\"", value),
        }),
        Ok(jobs) => Ok(jobs),
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ModError::ConfigValidation {
            field: field.to_string(),
            reason: format!("expected a boolean, found \"{}\"", value),
        }),
    }
}

fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_all(value: &str) -> ConfigResult<String> {
    Ok(value.parse::<AllLevel>()?.to_string())
}

fn set_depth(config: &mut ModgraphToml, field: &str, value: &str) -> ConfigResult<()> {
    let depth: Depth = value.parse().map_err(|e: ModError| ModError::ConfigValidation {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    match config.module.as_mut() {
        Some(module) => {
            module.depth = depth;
            Ok(())
        },
        None => Err(ModError::ConfigValidation {
            field: field.to_string(),
            reason: "depth given without a module path".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toml::LoaderSection;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    fn project(path: &str) -> ModgraphToml {
        ModgraphToml {
            module: Some(ModuleSection {
                path: path.to_string(),
                depth: Depth::Lazy,
            }),
            loader: LoaderSection::default(),
        }
    }

    #[tokio::test]
    async fn test_resolve_config_path_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_path(&temp_dir);
        let nested = root.join("cmd").join("tool");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(root.join(CONFIG_FILE), "[module]\npath = \"example.com/app\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(nested);
        assert_eq!(loader.resolve_config_path(CONFIG_FILE), root.join(CONFIG_FILE));

        let (config, source) = loader.load_project_config().await.unwrap();
        assert_eq!(config.module.unwrap().path, "example.com/app");
        assert_eq!(source, ConfigSource::Project(root.join(CONFIG_FILE)));
    }

    #[tokio::test]
    async fn test_missing_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(temp_path(&temp_dir));
        assert!(matches!(
            loader.load_project_config().await,
            Err(ModError::ConfigValidation { ref field, .. }) if field == "config"
        ));
    }

    #[tokio::test]
    async fn test_project_config_requires_module() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_path(&temp_dir);
        tokio::fs::write(root.join(CONFIG_FILE), "[loader]\njobs = 2\n").await.unwrap();

        let loader = ConfigLoader::new(root);
        assert!(matches!(
            loader.load_project_config().await,
            Err(ModError::ConfigValidation { ref field, .. }) if field == "module"
        ));
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_path(&temp_dir);
        tokio::fs::write(root.join(CONFIG_FILE), "[module\n").await.unwrap();

        let loader = ConfigLoader::new(root.clone());
        match loader.load_project_config().await {
            Err(ModError::TomlParse { message }) => assert!(message.contains(root.as_str())),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_layers_global_beneath_project() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_path(&temp_dir);
        let home = root.join("home");
        let work = root.join("work");
        tokio::fs::create_dir_all(home.join(".modgraph")).await.unwrap();
        tokio::fs::create_dir_all(&work).await.unwrap();
        tokio::fs::write(
            home.join(".modgraph").join("config.toml"),
            "[loader]\njobs = 3\ntags = [\"linux\"]\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            work.join(CONFIG_FILE),
            "[module]\npath = \"example.com/app\"\n\n[loader]\njobs = 6\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(work).with_home(home.clone());
        let (global, source) = loader.load_global_config().await.unwrap().unwrap();
        assert_eq!(source, ConfigSource::Global(home.join(".modgraph").join("config.toml")));

        let (project, _) = loader.load_project_config().await.unwrap();
        let merged = ConfigLayering::merge_configs(Some(global), project, HashMap::new(), HashMap::new()).unwrap();
        assert_eq!(merged.loader.jobs, Some(6));
        assert_eq!(merged.loader.tags, Some(vec!["linux".to_string()]));
    }

    #[tokio::test]
    async fn test_no_global_config() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_path(&temp_dir);
        let loader = ConfigLoader::new(root.clone()).with_home(root);
        assert!(loader.load_global_config().await.unwrap().is_none());
    }

    #[test]
    fn test_merge_precedence() {
        let mut global = ModgraphToml::default();
        global.loader.jobs = Some(2);
        global.loader.load_tests = Some(true);
        global.loader.all = Some("target-imported".to_string());

        let mut project = project("example.com/app");
        project.loader.all = Some("none".to_string());

        let env = HashMap::from([
            ("MODGRAPH_JOBS".to_string(), "4".to_string()),
            ("MODGRAPH_TAGS".to_string(), "linux, amd64".to_string()),
            ("MODGRAPH_DEPTH".to_string(), "eager".to_string()),
        ]);
        let overrides = HashMap::from([("jobs".to_string(), "16".to_string())]);

        let merged = ConfigLayering::merge_configs(Some(global), project, env, overrides).unwrap();

        // Project wins over global, global fills the gaps
        assert_eq!(merged.loader.all.as_deref(), Some("none"));
        assert_eq!(merged.loader.load_tests, Some(true));
        // Environment over files, explicit overrides over everything
        assert_eq!(merged.loader.tags, Some(vec!["linux".to_string(), "amd64".to_string()]));
        assert_eq!(merged.depth(), Depth::Eager);
        assert_eq!(merged.loader.jobs, Some(16));

        let loader = merged.loader_config().unwrap();
        assert_eq!(loader.jobs, 16);
        assert_eq!(loader.all_level, AllLevel::RootsOnly);
    }

    #[test]
    fn test_invalid_overrides() {
        let cases = [
            ("MODGRAPH_JOBS", "0"),
            ("MODGRAPH_JOBS", "many"),
            ("MODGRAPH_LOAD_TESTS", "maybe"),
            ("MODGRAPH_ALL", "everything"),
            ("MODGRAPH_DEPTH", "deep"),
        ];
        for (key, value) in cases {
            let env = HashMap::from([(key.to_string(), value.to_string())]);
            let result = ConfigLayering::merge_configs(None, project("example.com/app"), env, HashMap::new());
            assert!(
                matches!(result, Err(ModError::ConfigValidation { .. })),
                "{}={} should be rejected",
                key,
                value
            );
        }

        let unknown = HashMap::from([("color".to_string(), "auto".to_string())]);
        assert!(ConfigLayering::merge_configs(None, project("example.com/app"), HashMap::new(), unknown).is_err());

        let empty_path = HashMap::from([("path".to_string(), String::new())]);
        assert!(ConfigLayering::merge_configs(None, project("example.com/app"), HashMap::new(), empty_path).is_err());
    }

    #[test]
    fn test_override_module_path() {
        let overrides = HashMap::from([
            ("path".to_string(), "example.com/other".to_string()),
            ("load-tests".to_string(), "yes".to_string()),
        ]);
        let merged =
            ConfigLayering::merge_configs(None, ModgraphToml::default(), HashMap::new(), overrides).unwrap();
        assert_eq!(merged.module.as_ref().map(|m| m.path.as_str()), Some("example.com/other"));
        assert_eq!(merged.loader.load_tests, Some(true));
    }

    #[test]
    fn test_unknown_env_variables_are_ignored() {
        let env = HashMap::from([("MODGRAPH_COLOR".to_string(), "auto".to_string())]);
        let merged = ConfigLayering::merge_configs(None, project("example.com/app"), env, HashMap::new()).unwrap();
        assert_eq!(merged, project("example.com/app"));
    }

    #[test]
    fn test_collect_env_overrides() {
        std::env::set_var("MODGRAPH_TEST_COLLECT", "1");
        std::env::set_var("NOT_MODGRAPH_TEST_COLLECT", "1");

        let overrides = ConfigLayering::collect_env_overrides();

        assert!(overrides.contains_key("MODGRAPH_TEST_COLLECT"));
        assert!(!overrides.contains_key("NOT_MODGRAPH_TEST_COLLECT"));

        std::env::remove_var("MODGRAPH_TEST_COLLECT");
        std::env::remove_var("NOT_MODGRAPH_TEST_COLLECT");
    }

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn positive_job_counts_are_accepted(jobs in 1usize..4096) {
                let env = HashMap::from([("MODGRAPH_JOBS".to_string(), jobs.to_string())]);
                let merged = ConfigLayering::merge_configs(None, project("example.com/app"), env, HashMap::new()).unwrap();
                prop_assert_eq!(merged.loader_config().unwrap().jobs, jobs);
            }

            #[test]
            fn tag_lists_ignore_blank_entries(tags in proptest::collection::vec("[a-z0-9]{1,8}", 0..6)) {
                let value = tags.join(" , ,");
                prop_assert_eq!(parse_tags(&value), tags);
            }
        }
    }
}
