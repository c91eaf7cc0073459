//! Plain report data. Rendering belongs to the caller.

use std::fmt;

use chrono::{DateTime, Local};

use crate::backup::BackupEntry;
use crate::error::{FailureKind, UpdateStep};
use crate::preflight::RoleStatus;
use crate::update::ChainState;
use crate::verify::VerificationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    FileAccess,
    Schema,
    BackupFailed,
    ChainMismatch,
    SizeMismatch,
    BypassInactive,
    InstallerRefMismatch,
    ConcurrentEdit,
}

impl From<FailureKind> for FindingKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::FileAccess => FindingKind::FileAccess,
            FailureKind::Schema => FindingKind::Schema,
            FailureKind::Backup => FindingKind::BackupFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub message: String,
}

impl Finding {
    pub fn error(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }

    pub fn warning(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Which operations a pipeline run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Preflight, update, then verify.
    Full,
    UpdateOnly,
    VerifyOnly,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Full => "full",
            Mode::UpdateOnly => "update",
            Mode::VerifyOnly => "verify",
        })
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: Mode,
    pub started_at: DateTime<Local>,
    pub preflight: Vec<RoleStatus>,
    pub update: Option<ChainState>,
    /// Step at which the update stopped, if it failed.
    pub failed_step: Option<UpdateStep>,
    pub verification: Option<VerificationReport>,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub backups: Vec<BackupEntry>,
}

impl RunReport {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            started_at: Local::now(),
            preflight: Vec::new(),
            update: None,
            failed_step: None,
            verification: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            backups: Vec::new(),
        }
    }

    /// File a finding under errors or warnings by severity.
    pub fn push(&mut self, finding: Finding) {
        if finding.is_error() {
            self.errors.push(finding);
        } else {
            self.warnings.push(finding);
        }
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
            && self.failed_step.is_none()
            && self.verification.as_ref().map_or(true, |v| v.is_ok())
    }

    /// Process exit status: 0 on full success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_sorts_by_severity() {
        let mut report = RunReport::new(Mode::VerifyOnly);
        report.push(Finding::warning(FindingKind::SizeMismatch, "size"));
        report.push(Finding::error(FindingKind::ChainMismatch, "hash"));

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_warnings_alone_are_success() {
        let mut report = RunReport::new(Mode::Full);
        report.extend([
            Finding::warning(FindingKind::BypassInactive, "ExtraFiles present"),
            Finding::warning(FindingKind::BackupFailed, "read-only"),
        ]);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_failure_kind_maps_to_finding_kind() {
        assert_eq!(FindingKind::from(FailureKind::Schema), FindingKind::Schema);
        assert_eq!(FindingKind::from(FailureKind::Backup), FindingKind::BackupFailed);
    }
}
