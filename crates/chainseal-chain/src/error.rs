//! Failure taxonomy shared by the updater, verifier and pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chainseal_digest::DigestError;
use chainseal_manifest::ManifestError;
use thiserror::Error;

use crate::backup::BackupEntry;
use crate::report::Finding;

/// A snapshot could not be written.
#[derive(Error, Debug)]
#[error("cannot back up {}: {source}", path.display())]
pub struct BackupFailure {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A fatal condition in a chain operation.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Backup(#[from] BackupFailure),
}

impl ChainError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ChainError::Digest(DigestError::FileAccess { .. }) => FailureKind::FileAccess,
            ChainError::Manifest(ManifestError::FileAccess { .. }) => FailureKind::FileAccess,
            ChainError::Manifest(_) => FailureKind::Schema,
            ChainError::Backup(_) => FailureKind::Backup,
        }
    }
}

/// Coarse class of a fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required file is missing or unreadable.
    FileAccess,
    /// A manifest parses but lacks the expected structure.
    Schema,
    /// A snapshot could not be written.
    Backup,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::FileAccess => "file access",
            FailureKind::Schema => "schema",
            FailureKind::Backup => "backup",
        })
    }
}

/// Steps of an update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Backup,
    HashPayload,
    RewriteInstaller,
    RewriteModule,
    PersistInstaller,
    HashInstaller,
    PersistModule,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateStep::Backup => "backup",
            UpdateStep::HashPayload => "hash payload",
            UpdateStep::RewriteInstaller => "rewrite installer manifest",
            UpdateStep::RewriteModule => "rewrite module manifest",
            UpdateStep::PersistInstaller => "persist installer manifest",
            UpdateStep::HashInstaller => "hash installer manifest",
            UpdateStep::PersistModule => "persist module manifest",
        })
    }
}

/// An update stopped at `step`. Later steps were not attempted.
///
/// Snapshots and warnings collected before the failure are carried along so
/// they can still be reported.
#[derive(Error, Debug)]
#[error("update failed at step '{step}': {source}")]
pub struct UpdateFailure {
    pub step: UpdateStep,
    #[source]
    pub source: ChainError,
    pub backups: Vec<BackupEntry>,
    pub warnings: Vec<Finding>,
}

impl UpdateFailure {
    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }

    /// True if one of the two manifests may already have been rewritten.
    pub fn is_partial(&self) -> bool {
        matches!(self.step, UpdateStep::HashInstaller | UpdateStep::PersistModule)
    }
}
