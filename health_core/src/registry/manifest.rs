//! Module manifest: the fixed table of modules seeded at startup

use super::graph::{self, Edges};
use crate::error::{ConfigurationError, Result};
use crate::health::ModuleStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ModuleStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModuleDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ModuleStatus::Active,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<S: Into<String>>(mut self, dependencies: impl IntoIterator<Item = S>) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: ModuleStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleManifest {
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
}

impl ModuleManifest {
    pub fn new(modules: Vec<ModuleDefinition>) -> Self {
        Self { modules }
    }

    /// The application's own module table.
    pub fn builtin() -> Self {
        Self::new(vec![
            ModuleDefinition::new("core", "Core Platform"),
            ModuleDefinition::new("inventory", "Inventory").with_dependencies(["core"]),
            ModuleDefinition::new("sales", "Sales").with_dependencies(["core", "inventory"]),
            ModuleDefinition::new("banking", "Banking").with_dependencies(["core"]),
            ModuleDefinition::new("marketing", "Marketing").with_dependencies(["core", "sales"]),
            ModuleDefinition::new("ai", "AI Assistant").with_dependencies(["core"]),
            ModuleDefinition::new("reporting", "Reporting")
                .with_dependencies(["sales", "banking", "inventory"]),
        ])
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Invalid module manifest: {}", e).into())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let manifest = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded module manifest from {} ({} modules)",
            path.as_ref().display(),
            manifest.modules.len()
        );
        Ok(manifest)
    }

    /// Rejects empty and duplicate ids, self-dependency, dangling
    /// dependencies and cycles.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.id.trim().is_empty() {
                return Err(ConfigurationError::EmptyId);
            }
            if !seen.insert(module.id.as_str()) {
                return Err(ConfigurationError::DuplicateId(module.id.clone()));
            }
        }

        for module in &self.modules {
            for dependency in &module.dependencies {
                if dependency == &module.id {
                    return Err(ConfigurationError::SelfDependency(module.id.clone()));
                }
                if !seen.contains(dependency.as_str()) {
                    return Err(ConfigurationError::UnknownDependency {
                        module: module.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let edges: Edges = self
            .modules
            .iter()
            .map(|module| (module.id.as_str(), module.dependencies.as_slice()))
            .collect();

        match graph::find_cycle(&edges) {
            Some(cycle) => Err(ConfigurationError::DependencyCycle(cycle)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_manifest_is_valid() {
        let manifest = ModuleManifest::builtin();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.modules.len(), 7);
    }

    #[test]
    fn test_parse_toml() {
        let manifest = ModuleManifest::from_toml_str(
            r#"
            [[modules]]
            id = "core"
            name = "Core"

            [[modules]]
            id = "sales"
            name = "Sales"
            status = "inactive"
            dependencies = ["core"]
            "#,
        )
        .unwrap();

        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[0].status, ModuleStatus::Active);
        assert_eq!(manifest.modules[1].status, ModuleStatus::Inactive);
        assert_eq!(manifest.modules[1].dependencies, vec!["core"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[modules]]\nid = \"core\"\nname = \"Core\"").unwrap();

        let manifest = ModuleManifest::load(file.path()).unwrap();
        assert_eq!(manifest.modules[0].id, "core");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ModuleManifest::from_toml_str("modules = 3").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = ModuleManifest::new(vec![
            ModuleDefinition::new("a", "A"),
            ModuleDefinition::new("a", "A again"),
        ]);
        assert_eq!(duplicate.validate(), Err(ConfigurationError::DuplicateId("a".to_string())));

        let self_dep = ModuleManifest::new(vec![ModuleDefinition::new("a", "A").with_dependencies(["a"])]);
        assert_eq!(self_dep.validate(), Err(ConfigurationError::SelfDependency("a".to_string())));

        let dangling = ModuleManifest::new(vec![ModuleDefinition::new("a", "A").with_dependencies(["b"])]);
        assert_eq!(
            dangling.validate(),
            Err(ConfigurationError::UnknownDependency {
                module: "a".to_string(),
                dependency: "b".to_string(),
            })
        );

        let cyclic = ModuleManifest::new(vec![
            ModuleDefinition::new("a", "A").with_dependencies(["b"]),
            ModuleDefinition::new("b", "B").with_dependencies(["a"]),
        ]);
        assert!(matches!(cyclic.validate(), Err(ConfigurationError::DependencyCycle(_))));

        let empty = ModuleManifest::new(vec![ModuleDefinition::new(" ", "Blank")]);
        assert_eq!(empty.validate(), Err(ConfigurationError::EmptyId));
    }
}
