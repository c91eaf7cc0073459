//! # chainseal-config
//!
//! Configuration for chainseal.
//!
//! The package root comes from the command line (or `CHAINSEAL_ROOT`).
//! Everything else is layered, later layers winning:
//! 1. Built-in defaults (the reference activation package layout)
//! 2. `~/.chainseal/config.toml` (global)
//! 3. `<root>/chainseal.toml` (package-local)
//! 4. An explicit `--config` file
//! 5. Environment variables (highest priority)
//!
//! There is no process-wide config instance: a [`ChainConfig`] is built once
//! and handed to each component.

pub mod logging;
pub mod path;
pub mod testing;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name of the package-local config.
pub const PROJECT_CONFIG_FILE: &str = "chainseal.toml";

/// Module directory shared by the payload and installer in the reference layout.
pub const DEFAULT_MODULE_DIR: &str = "activator_device.script.module_20251204-1914/0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("TOML parse error: {0}")]
    Merged(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub package: PackageConfig,
    pub backup: BackupConfig,
}

impl ChainConfig {
    /// Defaults rooted at `root`, without reading any file.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.package.root = root.into();
        config
    }

    /// Load config from standard locations for the package at `root`.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config = Self::load_layers(root, global.as_deref(), explicit)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Layer the given files (those that exist) over the defaults.
    ///
    /// Tables are merged key by key, so a package file that only sets
    /// `backup.policy` keeps the global `backup.dir`.
    pub fn load_layers(
        root: &Path,
        global: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let project = Self::project_config_path(root);
        let mut merged = toml::Table::new();

        for path in [global, Some(project.as_path()), explicit].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)?;
            let layer: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
            merge_tables(&mut merged, layer);
        }

        let mut config: ChainConfig = toml::Value::Table(merged).try_into()?;
        config.package.root = root.to_path_buf();
        Ok(config)
    }

    /// Global config path: ~/.chainseal/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".chainseal/config.toml"))
    }

    /// Package-local config path: `<root>/chainseal.toml`
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_CONFIG_FILE)
    }

    /// Apply `CHAINSEAL_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("CHAINSEAL_BACKUP_DIR") {
            self.backup.dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("CHAINSEAL_BACKUP_POLICY") {
            self.backup.policy = policy.parse()?;
        }
        Ok(())
    }

    /// Absolute path of the payload script.
    pub fn payload_path(&self) -> PathBuf {
        path::resolve_under(&self.package.root, &self.package.payload)
    }

    /// Absolute path of the first manifest (`installer.txt`).
    pub fn installer_path(&self) -> PathBuf {
        path::resolve_under(&self.package.root, &self.package.installer)
    }

    /// Absolute path of the second manifest (`*.mnf`).
    pub fn module_manifest_path(&self) -> PathBuf {
        path::resolve_under(&self.package.root, &self.package.module_manifest)
    }

    pub fn backup_dir(&self) -> PathBuf {
        path::resolve_under(&self.package.root, &self.backup.dir)
    }

    /// Effective config as TOML (the root is not part of it).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Where the three chain files live, relative to the package root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package root; supplied by the caller, never read from a file
    #[serde(skip)]
    pub root: PathBuf,
    /// Payload script
    pub payload: PathBuf,
    /// First manifest, records the payload hash
    pub installer: PathBuf,
    /// Second manifest, records the installer hash
    pub module_manifest: PathBuf,
    /// Value written to `InstallerFile` in the second manifest
    pub installer_ref: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            payload: Path::new("Data").join(DEFAULT_MODULE_DIR).join("activation.sh"),
            installer: Path::new("Data").join(DEFAULT_MODULE_DIR).join("installer.txt"),
            module_manifest: PathBuf::from(
                "Meta/Normal_release_2/activator_device/script.module/1.0.0.mnf",
            ),
            installer_ref: format!("{}/installer.txt", DEFAULT_MODULE_DIR),
        }
    }
}

/// Backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup directory, relative to the package root unless absolute
    pub dir: PathBuf,
    /// What to do when a snapshot cannot be written
    pub policy: BackupPolicy,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".backups"),
            policy: BackupPolicy::Warn,
        }
    }
}

/// Backup behaviour before an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupPolicy {
    /// Take no snapshots.
    Off,
    /// Take snapshots; a failure is reported as a warning.
    #[default]
    Warn,
    /// Take snapshots; a failure aborts the update.
    Require,
}

impl BackupPolicy {
    pub fn enabled(self) -> bool {
        self != Self::Off
    }
}

impl FromStr for BackupPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "require" | "required" => Ok(Self::Require),
            _ => Err(ConfigError::InvalidValue {
                key: "backup.policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BackupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Require => "require",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let config = ChainConfig::for_root("/pkg");
        assert_eq!(
            config.payload_path(),
            PathBuf::from(
                "/pkg/Data/activator_device.script.module_20251204-1914/0/activation.sh"
            )
        );
        assert_eq!(
            config.package.installer_ref,
            "activator_device.script.module_20251204-1914/0/installer.txt"
        );
        assert_eq!(config.backup_dir(), PathBuf::from("/pkg/.backups"));
        assert_eq!(config.backup.policy, BackupPolicy::Warn);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = ChainConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("[package]"));
        assert!(toml_str.contains("[backup]"));
        assert!(toml_str.contains("policy = \"warn\""));
        assert!(!toml_str.contains("root"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ChainConfig::default();
        config.backup.policy = BackupPolicy::Require;
        let parsed: ChainConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.backup.policy, BackupPolicy::Require);
        assert_eq!(parsed.package.payload, config.package.payload);
    }

    #[test]
    fn test_layers_merge_per_key() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        std::fs::write(&global, "[backup]\ndir = \"/var/backups/pkg\"\npolicy = \"off\"\n").unwrap();
        std::fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "[backup]\npolicy = \"require\"\n",
        )
        .unwrap();

        let config = ChainConfig::load_layers(temp.path(), Some(&global), None).unwrap();
        assert_eq!(config.backup.dir, PathBuf::from("/var/backups/pkg"));
        assert_eq!(config.backup.policy, BackupPolicy::Require);
        assert_eq!(config.package.root, temp.path());
    }

    #[test]
    fn test_explicit_file_wins_over_project() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "[package]\npayload = \"a.sh\"\n",
        )
        .unwrap();
        let explicit = temp.path().join("override.toml");
        std::fs::write(&explicit, "[package]\npayload = \"b.sh\"\n").unwrap();

        let config = ChainConfig::load_layers(temp.path(), None, Some(&explicit)).unwrap();
        assert_eq!(config.package.payload, PathBuf::from("b.sh"));
    }

    #[test]
    fn test_bad_toml_names_the_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PROJECT_CONFIG_FILE), "[package\n").unwrap();

        let err = ChainConfig::load_layers(temp.path(), None, None).unwrap_err();
        assert!(err.to_string().contains(PROJECT_CONFIG_FILE));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ChainConfig::default();
        config
            .apply_overrides(|key| match key {
                "CHAINSEAL_BACKUP_DIR" => Some("/tmp/bk".to_string()),
                "CHAINSEAL_BACKUP_POLICY" => Some("Require".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.backup.dir, PathBuf::from("/tmp/bk"));
        assert_eq!(config.backup.policy, BackupPolicy::Require);
    }

    #[test]
    fn test_invalid_policy() {
        assert!("sometimes".parse::<BackupPolicy>().is_err());
        assert_eq!("off".parse::<BackupPolicy>().unwrap(), BackupPolicy::Off);
        assert!(!BackupPolicy::Off.enabled());
        assert!(BackupPolicy::Warn.enabled());
    }
}
