//! Chain Verifier: recomputes both links and compares them with what the
//! manifests record. Read-only.

use std::fmt;
use std::path::Path;

use chainseal_config::{log_verify_debug, log_verify_info, ChainConfig};
use chainseal_digest::{hash_file, is_hex_digest, ContentDigest};
use chainseal_manifest::{InstallerManifest, ManifestError, ModuleManifest};

use crate::error::{ChainError, FailureKind};
use crate::report::{Finding, FindingKind};

/// The two hash relationships of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// payload → `Scripts[0].CheckSum`
    PayloadToInstaller,
    /// installer manifest → `HWIndex[0].CheckSum`
    InstallerToModule,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Link::PayloadToInstaller => "payload -> installer manifest",
            Link::InstallerToModule => "installer manifest -> module manifest",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Match,
    Mismatch { expected: String, actual: String },
    /// The link could not be checked at all.
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone)]
pub struct LinkReport {
    pub link: Link,
    /// Freshly computed digest of the hashed file, when it could be read
    pub actual: Option<ContentDigest>,
    /// `CheckSum[0]` from the recording manifest, when it could be read
    pub recorded: Option<String>,
    pub status: LinkStatus,
}

impl LinkReport {
    fn new(link: Link) -> Self {
        Self {
            link,
            actual: None,
            recorded: None,
            status: LinkStatus::Failed {
                kind: FailureKind::FileAccess,
                message: String::new(),
            },
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == LinkStatus::Match
    }
}

/// Payload size on disk versus `Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCheck {
    pub actual: u64,
    pub recorded: Option<u64>,
}

impl SizeCheck {
    pub fn matches(&self) -> bool {
        self.recorded == Some(self.actual)
    }
}

/// Whether `ExtraFiles` is gone from `Scripts[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassState {
    /// `ExtraFiles` absent
    Active,
    /// `ExtraFiles` present; the consumer will demand a signature
    Inactive,
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub payload_link: LinkReport,
    pub installer_link: LinkReport,
    /// `None` when link 1 could not be checked
    pub size: Option<SizeCheck>,
    /// `None` when link 1 could not be checked
    pub bypass: Option<BypassState>,
    pub findings: Vec<Finding>,
}

impl VerificationReport {
    /// Both hash comparisons matched. Advisory findings do not count.
    pub fn is_ok(&self) -> bool {
        self.payload_link.is_match() && self.installer_link.is_match()
    }

    pub fn links(&self) -> [&LinkReport; 2] {
        [&self.payload_link, &self.installer_link]
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }
}

pub struct ChainVerifier<'a> {
    config: &'a ChainConfig,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self { config }
    }

    pub fn verify(&self) -> VerificationReport {
        let mut findings = Vec::new();

        let mut payload_link = LinkReport::new(Link::PayloadToInstaller);
        let (size, bypass) = match self.check_payload_link(&mut payload_link, &mut findings) {
            Ok(advisory) => advisory,
            Err(e) => {
                fail_link(&mut payload_link, &e, &mut findings);
                (None, None)
            }
        };

        let mut installer_link = LinkReport::new(Link::InstallerToModule);
        if let Err(e) = self.check_installer_link(&mut installer_link, &mut findings) {
            fail_link(&mut installer_link, &e, &mut findings);
        }

        let report = VerificationReport {
            payload_link,
            installer_link,
            size,
            bypass,
            findings,
        };
        log_verify_info!("verification finished", ok = report.is_ok());
        report
    }

    fn check_payload_link(
        &self,
        link: &mut LinkReport,
        findings: &mut Vec<Finding>,
    ) -> Result<(Option<SizeCheck>, Option<BypassState>), ChainError> {
        let payload_path = self.config.payload_path();
        let actual = hash_file(&payload_path)?;
        link.actual = Some(actual.clone());

        let installer = InstallerManifest::load(&self.config.installer_path())?;
        let record = installer.payload_record()?;
        let recorded = record
            .recorded_hash()
            .ok_or_else(|| missing_checksum(installer.document().path(), "Scripts"))?;

        compare(link, &actual, recorded, findings);

        let size = SizeCheck {
            actual: actual.len(),
            recorded: record.length,
        };
        if !size.matches() {
            let recorded = size
                .recorded
                .map_or_else(|| "none".to_string(), |n| n.to_string());
            findings.push(Finding::warning(
                FindingKind::SizeMismatch,
                format!(
                    "payload size {} bytes does not match recorded Length {}",
                    size.actual, recorded
                ),
            ));
        }

        let bypass = if record.extra_files {
            findings.push(Finding::warning(
                FindingKind::BypassInactive,
                "ExtraFiles present in installer manifest (signature check will run)",
            ));
            BypassState::Inactive
        } else {
            BypassState::Active
        };

        Ok((Some(size), Some(bypass)))
    }

    fn check_installer_link(
        &self,
        link: &mut LinkReport,
        findings: &mut Vec<Finding>,
    ) -> Result<(), ChainError> {
        let actual = hash_file(&self.config.installer_path())?;
        link.actual = Some(actual.clone());

        let module = ModuleManifest::load(&self.config.module_manifest_path())?;
        let record = module.manifest_record()?;
        let recorded = record
            .recorded_hash()
            .ok_or_else(|| missing_checksum(module.document().path(), "HWIndex"))?;

        compare(link, &actual, recorded, findings);

        let expected_ref = self.config.package.installer_ref.as_str();
        if record.installer_file.as_deref() != Some(expected_ref) {
            findings.push(Finding::warning(
                FindingKind::InstallerRefMismatch,
                format!(
                    "InstallerFile is {:?}, expected {:?}",
                    record.installer_file.as_deref().unwrap_or(""),
                    expected_ref
                ),
            ));
        }
        Ok(())
    }
}

fn missing_checksum(path: &Path, key: &str) -> ChainError {
    ChainError::Manifest(ManifestError::Schema {
        path: path.to_path_buf(),
        detail: format!("{}[0].CheckSum is empty or missing", key),
    })
}

/// Exact, case-sensitive comparison of one link.
fn compare(
    link: &mut LinkReport,
    actual: &ContentDigest,
    recorded: &str,
    findings: &mut Vec<Finding>,
) {
    link.recorded = Some(recorded.to_string());
    log_verify_debug!(
        "comparing link",
        link = tracing::field::display(link.link),
        actual = actual.hex(),
        recorded = recorded
    );

    if actual.matches(recorded) {
        link.status = LinkStatus::Match;
        return;
    }

    let mut message = format!(
        "{} hash mismatch: recorded {}, actual {}",
        link.link,
        recorded,
        actual.hex()
    );
    if !is_hex_digest(recorded) {
        message.push_str(" (recorded value is not a lowercase SHA-256 hex digest)");
    }
    findings.push(Finding::error(FindingKind::ChainMismatch, message));
    link.status = LinkStatus::Mismatch {
        expected: recorded.to_string(),
        actual: actual.hex().to_string(),
    };
}

fn fail_link(link: &mut LinkReport, error: &ChainError, findings: &mut Vec<Finding>) {
    let kind = error.kind();
    let message = format!("{}: {}", link.link, error);
    findings.push(Finding::error(kind.into(), message.clone()));
    link.status = LinkStatus::Failed { kind, message };
}
