//! # chainseal-chain
//!
//! Keeps a three-file checksum chain consistent:
//!
//! ```text
//! payload ──sha256──▶ installer manifest Scripts[0].CheckSum
//! installer manifest ──sha256──▶ module manifest HWIndex[0].CheckSum
//! ```
//!
//! [`ChainUpdater`] rewrites both links (and drops `ExtraFiles` so the
//! consumer skips its signature check), [`ChainVerifier`] recomputes them
//! without touching anything, and [`Pipeline`] runs the two together and
//! produces a [`RunReport`].

pub mod backup;
pub mod error;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod update;
pub mod verify;

pub use backup::{BackupEntry, BackupGuard};
pub use error::{BackupFailure, ChainError, FailureKind, UpdateFailure, UpdateStep};
pub use pipeline::{Pipeline, PipelineOptions};
pub use preflight::{preflight, Role, RoleStatus};
pub use report::{Finding, FindingKind, Mode, RunReport, Severity};
pub use update::{ChainState, ChainUpdater};
pub use verify::{
    BypassState, ChainVerifier, Link, LinkReport, LinkStatus, SizeCheck, VerificationReport,
};

pub use chainseal_manifest::BypassOutcome;
