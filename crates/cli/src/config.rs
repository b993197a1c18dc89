//! Configuration management for the CLI

use crate::cluster::CapacitySource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory manifests are written to when nothing else is configured
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default output directory for generated files
    pub output_dir: Option<PathBuf>,
    /// Default namespace
    pub default_namespace: Option<String>,
    /// Default policy configuration file
    pub policy_file: Option<PathBuf>,
    /// Default capacity source
    pub capacity_source: Option<CapacitySource>,
}

impl Config {
    /// Load configuration from the user config file, if present
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("perf-portal").join("config.json"))
    }
}

/// Resolve the kubeconfig to use.
///
/// Returns `None` when neither an explicit path nor `~/.kube/config` exists,
/// leaving the client to infer in-cluster configuration.
pub fn kubeconfig_path(override_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(PathBuf::from(path));
    }

    let default = dirs_next::home_dir()?.join(".kube").join("config");
    default.exists().then_some(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.output_dir.is_none());
        assert!(config.capacity_source.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"output_dir": "/tmp/manifests", "default_namespace": "payments", "capacity_source": "kubectl"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/manifests")));
        assert_eq!(config.default_namespace.as_deref(), Some("payments"));
        assert_eq!(config.capacity_source, Some(CapacitySource::Kubectl));
        assert!(config.policy_file.is_none());
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_kubeconfig_override() {
        assert_eq!(
            kubeconfig_path(Some("/etc/kube/admin.conf")),
            Some(PathBuf::from("/etc/kube/admin.conf"))
        );
    }
}
