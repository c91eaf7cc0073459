//! Integration tests for chainseal-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use std::path::PathBuf;

use chainseal_config::{BackupPolicy, ChainConfig, PROJECT_CONFIG_FILE};
use tempfile::tempdir;

/// Test config loading from a package-local file
#[test]
fn test_load_project_config_from_file() {
    let temp = tempdir().unwrap();
    let config_content = r#"
[package]
payload = "Data/pkg/0/run.sh"
installer = "Data/pkg/0/installer.txt"
module_manifest = "Meta/pkg.mnf"
installer_ref = "pkg/0/installer.txt"

[backup]
dir = "snapshots"
policy = "require"
"#;
    std::fs::write(temp.path().join(PROJECT_CONFIG_FILE), config_content).unwrap();

    let config = ChainConfig::load_layers(temp.path(), None, None).unwrap();

    assert_eq!(config.payload_path(), temp.path().join("Data/pkg/0/run.sh"));
    assert_eq!(config.module_manifest_path(), temp.path().join("Meta/pkg.mnf"));
    assert_eq!(config.package.installer_ref, "pkg/0/installer.txt");
    assert_eq!(config.backup_dir(), temp.path().join("snapshots"));
    assert_eq!(config.backup.policy, BackupPolicy::Require);
}

/// Test config hierarchy: project config overrides global
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();

    let global_dir = temp.path().join("home/.chainseal");
    std::fs::create_dir_all(&global_dir).unwrap();
    let global = global_dir.join("config.toml");
    std::fs::write(
        &global,
        r#"
[package]
installer_ref = "global/installer.txt"

[backup]
dir = "/srv/backups"
"#,
    )
    .unwrap();

    let root = temp.path().join("pkg");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join(PROJECT_CONFIG_FILE),
        r#"
[package]
installer_ref = "local/installer.txt"
"#,
    )
    .unwrap();

    let config = ChainConfig::load_layers(&root, Some(&global), None).unwrap();

    assert_eq!(config.package.installer_ref, "local/installer.txt");
    assert_eq!(config.backup.dir, PathBuf::from("/srv/backups"));
    // Absolute backup dirs are not re-rooted.
    assert_eq!(config.backup_dir(), PathBuf::from("/srv/backups"));
}

/// Missing files are skipped rather than treated as errors
#[test]
fn test_missing_layers_yield_defaults() {
    let temp = tempdir().unwrap();
    let config = ChainConfig::load_layers(
        temp.path(),
        Some(&temp.path().join("nope.toml")),
        Some(&temp.path().join("also-nope.toml")),
    )
    .unwrap();

    let defaults = ChainConfig::for_root(temp.path());
    assert_eq!(config.payload_path(), defaults.payload_path());
    assert_eq!(config.backup.policy, BackupPolicy::Warn);
}

/// Unknown policy strings are rejected at load time
#[test]
fn test_invalid_policy_in_file() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join(PROJECT_CONFIG_FILE),
        "[backup]\npolicy = \"maybe\"\n",
    )
    .unwrap();

    assert!(ChainConfig::load_layers(temp.path(), None, None).is_err());
}
