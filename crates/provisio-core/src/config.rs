use crate::engine::ProvisioningContext;
use crate::phase_set::PhaseSet;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Engine settings, read from TOML.
///
/// ```toml
/// [registry]
/// root = "/var/lib/provisio"
/// keep_snapshots = 5
///
/// [phases]
/// install = 60
///
/// [context]
/// installFolder = "/opt/sdk"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub phases: PhaseWeights,
    /// Provisioning context properties, passed to every phase.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySection {
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Snapshots kept per profile after each commit; all when unset.
    #[serde(default)]
    pub keep_snapshots: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaseWeights {
    pub collect: i32,
    pub unconfigure: i32,
    pub uninstall: i32,
    pub property: i32,
    pub check_trust: i32,
    pub install: i32,
    pub configure: i32,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            collect: 10,
            unconfigure: 10,
            uninstall: 50,
            property: 1,
            check_trust: 1,
            install: 50,
            configure: 10,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    #[must_use]
    pub fn with_registry_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.registry.root = Some(root.into());
        self
    }

    pub fn registry_root(&self) -> Result<&Path, CoreError> {
        self.registry
            .root
            .as_deref()
            .ok_or_else(|| CoreError::InvalidArgument("registry root is not configured".to_owned()))
    }

    /// The standard phases with the configured weights.
    pub fn phase_set(&self) -> Result<PhaseSet, CoreError> {
        PhaseSet::with_weights(&self.phases)
    }

    pub fn provisioning_context(&self) -> ProvisioningContext {
        ProvisioningContext::from(self.context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("provisio.toml");

        let mut config = EngineConfig::default().with_registry_root("/var/lib/provisio");
        config.registry.keep_snapshots = Some(3);
        config.phases.install = 70;
        config
            .context
            .insert("installFolder".to_owned(), "/opt/sdk".to_owned());
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [registry]
            root = "/tmp/reg"

            [phases]
            checkTrust = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.registry_root().unwrap(), Path::new("/tmp/reg"));
        assert_eq!(config.registry.keep_snapshots, None);
        assert_eq!(config.phases.check_trust, 4);
        assert_eq!(config.phases.install, 50);
        assert!(config.context.is_empty());
    }

    #[test]
    fn empty_config_has_no_root() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert!(matches!(
            config.registry_root(),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(config.phase_set().unwrap().len(), 7);
    }

    #[test]
    fn malformed_config_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("[phases]\ninstall = \"lots\""),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn context_properties_flow_into_provisioning_context() {
        let config = EngineConfig::from_toml_str("[context]\ninstallFolder = \"/opt\"").unwrap();
        let context = config.provisioning_context();
        assert_eq!(context.property("installFolder"), Some("/opt"));
    }
}
