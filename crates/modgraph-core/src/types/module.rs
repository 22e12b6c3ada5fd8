//! Module identities, pruning depth and requirement summaries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::version::{compare_versions, NONE};
use crate::error::ModError;

/// A (path, version) identity in the requirement graph.
///
/// The target module carries an empty version; `none` marks a module that
/// does not participate in the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleVersion {
    /// Module path (e.g., "example.com/lib")
    pub path: String,
    /// Version string (e.g., "v1.2.3", "none", or "" for the target)
    pub version: String,
}

impl ModuleVersion {
    /// Create a new module version
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// The module being built, which has no version of its own
    pub fn target(path: impl Into<String>) -> Self {
        Self::new(path, "")
    }

    /// A module version that removes `path` from the build
    pub fn none(path: impl Into<String>) -> Self {
        Self::new(path, NONE)
    }

    /// Check if this is the `none` sentinel
    pub fn is_none(&self) -> bool {
        self.version == NONE
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}@{}", self.path, self.version)
        }
    }
}

impl FromStr for ModuleVersion {
    type Err = ModError;

    /// Parse "path@version"; a bare path is a target reference
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let (path, version) = match input.rsplit_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    return Err(ModError::InvalidModule {
                        input: input.to_string(),
                        reason: "empty version after '@'".to_string(),
                    });
                }
                (path, version)
            },
            None => (input, ""),
        };

        if path.is_empty() {
            return Err(ModError::InvalidModule {
                input: input.to_string(),
                reason: "empty module path".to_string(),
            });
        }

        Ok(ModuleVersion::new(path, version))
    }
}

/// Order module versions by path, then by version precedence
pub fn compare_modules(a: &ModuleVersion, b: &ModuleVersion) -> Ordering {
    a.path
        .cmp(&b.path)
        .then_with(|| compare_versions(&a.version, &b.version))
}

/// Sort a list of module versions deterministically
pub fn sort_modules(list: &mut [ModuleVersion]) {
    list.sort_by(compare_modules);
}

/// Whether a module's requirements are followed transitively.
///
/// A lazy module only exposes its direct requirements; an eager module makes
/// its whole requirement graph relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    #[default]
    Lazy,
    Eager,
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Lazy => write!(f, "lazy"),
            Depth::Eager => write!(f, "eager"),
        }
    }
}

impl FromStr for Depth {
    type Err = ModError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lazy" => Ok(Depth::Lazy),
            "eager" => Ok(Depth::Eager),
            other => Err(ModError::ConfigValidation {
                field: "depth".to_string(),
                reason: format!("expected \"lazy\" or \"eager\", found \"{}\"", other),
            }),
        }
    }
}

/// Direct requirements of one module version and its pruning depth
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub require: Vec<ModuleVersion>,
    pub depth: Depth,
}

impl Summary {
    pub fn new(require: Vec<ModuleVersion>, depth: Depth) -> Self {
        Self { require, depth }
    }

    pub fn is_eager(&self) -> bool {
        self.depth == Depth::Eager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_display() {
        assert_eq!(ModuleVersion::new("example.com/a", "v1.0.0").to_string(), "example.com/a@v1.0.0");
        assert_eq!(ModuleVersion::target("example.com/app").to_string(), "example.com/app");
        assert_eq!(ModuleVersion::none("example.com/b").to_string(), "example.com/b@none");
    }

    #[test]
    fn test_module_parse() {
        let m: ModuleVersion = "example.com/a@v1.2.0".parse().unwrap();
        assert_eq!(m, ModuleVersion::new("example.com/a", "v1.2.0"));

        let target: ModuleVersion = "example.com/app".parse().unwrap();
        assert_eq!(target.version, "");

        assert!("example.com/a@".parse::<ModuleVersion>().is_err());
        assert!("@v1.0.0".parse::<ModuleVersion>().is_err());
    }

    #[test]
    fn test_none_sentinel() {
        assert!(ModuleVersion::none("x").is_none());
        assert!(!ModuleVersion::new("x", "v1.0.0").is_none());
    }

    #[test]
    fn test_sort_modules() {
        let mut list = vec![
            ModuleVersion::new("b", "v1.0.0"),
            ModuleVersion::new("a", "v1.10.0"),
            ModuleVersion::new("a", "v1.9.0"),
        ];
        sort_modules(&mut list);
        assert_eq!(
            list,
            vec![
                ModuleVersion::new("a", "v1.9.0"),
                ModuleVersion::new("a", "v1.10.0"),
                ModuleVersion::new("b", "v1.0.0"),
            ]
        );
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("lazy".parse::<Depth>().unwrap(), Depth::Lazy);
        assert_eq!("eager".parse::<Depth>().unwrap(), Depth::Eager);
        assert!("full".parse::<Depth>().is_err());
        assert_eq!(Depth::default(), Depth::Lazy);
    }
}
