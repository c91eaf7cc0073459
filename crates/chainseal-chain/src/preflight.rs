//! Presence check for the three chain files.

use std::fmt;
use std::path::PathBuf;

use chainseal_config::ChainConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Payload,
    Installer,
    ModuleManifest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Payload => "payload",
            Role::Installer => "installer manifest",
            Role::ModuleManifest => "module manifest",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleStatus {
    pub role: Role,
    pub path: PathBuf,
    /// Exists and is a regular file
    pub present: bool,
}

/// One entry per role, in chain order.
pub fn preflight(config: &ChainConfig) -> Vec<RoleStatus> {
    [
        (Role::Payload, config.payload_path()),
        (Role::Installer, config.installer_path()),
        (Role::ModuleManifest, config.module_manifest_path()),
    ]
    .into_iter()
    .map(|(role, path)| RoleStatus {
        role,
        present: path.is_file(),
        path,
    })
    .collect()
}

/// Roles whose file is missing.
pub fn missing(statuses: &[RoleStatus]) -> impl Iterator<Item = &RoleStatus> {
    statuses.iter().filter(|s| !s.present)
}
