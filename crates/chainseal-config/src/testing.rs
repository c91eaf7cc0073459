//! Synthetic activation packages for tests.
//!
//! `ChainFixture` lays out the three chain files in a temporary package
//! root using the default layout, with stale hashes and an `ExtraFiles`
//! entry, so an update has real work to do.
//!
//! # Usage
//!
//! ```ignore
//! use chainseal_config::testing::ChainFixture;
//!
//! let fx = ChainFixture::new()?;
//! let verifier = ChainVerifier::new(&fx.config);
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempDir;

use crate::ChainConfig;

/// Size of the default fixture payload.
pub const DEFAULT_PAYLOAD_LEN: usize = 1024;

/// Hash recorded in fixture manifests before any update.
pub const STALE_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Installer manifest with a stale `Scripts[0]` and an `ExtraFiles` entry.
pub const SAMPLE_INSTALLER: &str = r#"{
    "Name": "activator_device",
    "Version": "1.0.0",
    "Scripts": [
        {
            "Name": "activation.sh",
            "Length": 1,
            "CheckSum": [
                "0000000000000000000000000000000000000000000000000000000000000000"
            ],
            "CheckSumSize": 4096,
            "ExtraFiles": [
                {
                    "Name": "activation.sh.sig",
                    "CheckSum": [
                        "1111111111111111111111111111111111111111111111111111111111111111"
                    ]
                }
            ],
            "Description": "Активатор"
        }
    ]
}"#;

/// Module manifest pointing at an old installer path with a stale hash.
pub const SAMPLE_MODULE: &str = r#"{
    "Name": "script.module",
    "Version": "1.0.0",
    "HWIndex": [
        {
            "HW": "MEN3",
            "InstallerFile": "old/installer.txt",
            "CheckSum": [
                "0000000000000000000000000000000000000000000000000000000000000000"
            ],
            "CheckSumSize": 524288
        }
    ]
}"#;

/// Isolated package root with payload, installer and module manifest.
pub struct ChainFixture {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Package root
    pub root: PathBuf,
    /// Config rooted at `root` with default layout and policy
    pub config: ChainConfig,
}

impl ChainFixture {
    /// Package with a [`DEFAULT_PAYLOAD_LEN`]-byte payload.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_payload(&default_payload())
    }

    pub fn with_payload(payload: &[u8]) -> anyhow::Result<Self> {
        Self::with_documents(payload, SAMPLE_INSTALLER, SAMPLE_MODULE)
    }

    /// Package with caller-supplied manifest text.
    pub fn with_documents(payload: &[u8], installer: &str, module: &str) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let config = ChainConfig::for_root(&root);

        let fixture = Self {
            _temp_dir: temp_dir,
            root,
            config,
        };
        fixture.write(&fixture.config.payload_path(), payload)?;
        fixture.write(&fixture.config.installer_path(), installer.as_bytes())?;
        fixture.write(&fixture.config.module_manifest_path(), module.as_bytes())?;
        Ok(fixture)
    }

    fn write(&self, path: &Path, content: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
    }

    /// Create a file relative to the package root
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.root.join(relative_path);
        self.write(&path, content)?;
        Ok(path)
    }

    pub fn write_payload(&self, content: &[u8]) -> anyhow::Result<()> {
        self.write(&self.config.payload_path(), content)
    }

    pub fn write_installer(&self, content: &str) -> anyhow::Result<()> {
        self.write(&self.config.installer_path(), content.as_bytes())
    }

    pub fn write_module(&self, content: &str) -> anyhow::Result<()> {
        self.write(&self.config.module_manifest_path(), content.as_bytes())
    }

    pub fn installer_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let path = self.config.installer_path();
        std::fs::read(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn module_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let path = self.config.module_manifest_path();
        std::fs::read(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn installer_json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.installer_bytes()?)?)
    }

    pub fn module_json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.module_bytes()?)?)
    }

    /// Files in the backup directory, sorted by name.
    pub fn backup_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.config.backup_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = std::fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        files.sort();
        Ok(files)
    }
}

/// Deterministic, non-repeating-looking payload content.
pub fn default_payload() -> Vec<u8> {
    let mut payload = b"#!/bin/sh\n".to_vec();
    payload.extend((0..DEFAULT_PAYLOAD_LEN - payload.len()).map(|i| b'a' + (i % 26) as u8));
    payload
}
