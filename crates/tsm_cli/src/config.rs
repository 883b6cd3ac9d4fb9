use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tsm_core::item_string::Dialect;
use tsm_core::merge::default_operation_modules;

const CONFIG_DIR: &str = "tsm-merge";
const CONFIG_FILE: &str = "config.json";

/// Defaults for every run. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub profile: Option<String>,
    pub database: Option<String>,
    /// Dialect for new item keys. Unset means follow the file.
    pub dialect: Option<Dialect>,
    /// Operation modules given to groups the tool creates.
    pub operation_modules: Vec<String>,
    pub backup: bool,
    pub backup_dir: Option<PathBuf>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            profile: None,
            database: None,
            dialect: None,
            operation_modules: default_operation_modules(),
            backup: true,
            backup_dir: None,
        }
    }
}

impl MergeConfig {
    /// Read `explicit` if given, else the per-user config file if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: MergeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.config_dir().join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: MergeConfig =
            serde_json::from_str(r#"{"dialect": "compact", "backup": false}"#).expect("parses");
        assert_eq!(config.dialect, Some(Dialect::Compact));
        assert!(!config.backup);
        assert_eq!(config.operation_modules, default_operation_modules());
        assert_eq!(config.profile, None);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let err = MergeConfig::load(Some(Path::new("/nonexistent/tsm-merge.json")))
            .expect_err("missing explicit config");
        assert!(err.to_string().contains("read config"));
    }
}
