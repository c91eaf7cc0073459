//! Drives preflight, update and verification and collects a [`RunReport`].

use chainseal_config::{log_pipeline_info, BackupPolicy, ChainConfig};

use crate::preflight::{missing, preflight};
use crate::report::{Finding, FindingKind, Mode, RunReport};
use crate::update::ChainUpdater;
use crate::verify::ChainVerifier;

/// Per-run knobs that are not part of the persisted configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Replaces `backup.policy` from the configuration for this run.
    pub backup_policy: Option<BackupPolicy>,
}

impl PipelineOptions {
    /// Shorthand for `--no-backup`.
    pub fn without_backups() -> Self {
        Self {
            backup_policy: Some(BackupPolicy::Off),
        }
    }
}

pub struct Pipeline {
    config: ChainConfig,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(config: ChainConfig, options: PipelineOptions) -> Self {
        Self { config, options }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn backup_policy(&self) -> BackupPolicy {
        self.options
            .backup_policy
            .unwrap_or(self.config.backup.policy)
    }

    pub fn run(&self, mode: Mode) -> RunReport {
        let mut report = RunReport::new(mode);
        log_pipeline_info!(
            "run started",
            mode = tracing::field::display(mode),
            root = tracing::field::display(self.config.package.root.display())
        );

        // Every mode records presence; only the full run stops on it. The
        // single-operation modes leave the finding to the operation itself.
        report.preflight = preflight(&self.config);
        if mode == Mode::Full {
            let absent: Vec<_> = missing(&report.preflight).cloned().collect();
            if !absent.is_empty() {
                for status in &absent {
                    report.push(Finding::error(
                        FindingKind::FileAccess,
                        format!("{} not found: {}", status.role, status.path.display()),
                    ));
                }
                log_pipeline_info!("preflight failed, nothing changed", missing = absent.len());
                return report;
            }
        }

        if matches!(mode, Mode::Full | Mode::UpdateOnly) {
            let updater = ChainUpdater::new(&self.config).with_backup_policy(self.backup_policy());
            match updater.update() {
                Ok(state) => {
                    report.backups.extend(state.backups.iter().cloned());
                    report.extend(state.warnings.iter().cloned());
                    report.update = Some(state);
                }
                Err(failure) => {
                    report.failed_step = Some(failure.step);
                    report.backups.extend(failure.backups.iter().cloned());
                    report.extend(failure.warnings.iter().cloned());
                    report.push(Finding::error(failure.kind().into(), failure.to_string()));
                    log_pipeline_info!("run finished", success = false);
                    return report;
                }
            }
        }

        if matches!(mode, Mode::Full | Mode::VerifyOnly) {
            let verification = ChainVerifier::new(&self.config).verify();
            report.extend(verification.findings.iter().cloned());
            report.verification = Some(verification);
        }

        log_pipeline_info!("run finished", success = report.is_success());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdateStep;
    use crate::verify::BypassState;
    use chainseal_config::testing::ChainFixture;

    #[test]
    fn test_full_run_succeeds_on_fresh_chain() {
        let fx = ChainFixture::new().unwrap();
        let report = Pipeline::new(fx.config.clone(), PipelineOptions::default()).run(Mode::Full);

        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.exit_code(), 0);
        assert!(report.update.is_some());
        let verification = report.verification.unwrap();
        assert!(verification.is_ok());
        assert_eq!(verification.bypass, Some(BypassState::Active));
        assert_eq!(report.backups.len(), 2);
    }

    #[test]
    fn test_full_run_aborts_on_missing_file() {
        let fx = ChainFixture::new().unwrap();
        std::fs::remove_file(fx.config.module_manifest_path()).unwrap();
        let before = fx.installer_bytes().unwrap();

        let report = Pipeline::new(fx.config.clone(), PipelineOptions::default()).run(Mode::Full);
        assert_eq!(report.exit_code(), 1);
        assert!(report.update.is_none());
        assert!(report.verification.is_none());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(fx.installer_bytes().unwrap(), before);
        assert!(fx.backup_files().unwrap().is_empty());
    }

    #[test]
    fn test_verify_only_on_stale_chain_fails() {
        let fx = ChainFixture::new().unwrap();
        let report =
            Pipeline::new(fx.config.clone(), PipelineOptions::default()).run(Mode::VerifyOnly);

        assert!(report.update.is_none());
        assert!(!report.is_success());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == FindingKind::BypassInactive));
    }

    #[test]
    fn test_verify_only_reports_missing_file_once() {
        let fx = ChainFixture::new().unwrap();
        std::fs::remove_file(fx.config.payload_path()).unwrap();

        let report =
            Pipeline::new(fx.config.clone(), PipelineOptions::default()).run(Mode::VerifyOnly);

        assert!(!report.preflight[0].present);
        let file_access = |f: &&Finding| f.kind == FindingKind::FileAccess;
        assert_eq!(report.errors.iter().filter(file_access).count(), 1);
        assert_eq!(report.warnings.iter().filter(file_access).count(), 0);
    }

    #[test]
    fn test_update_only_reports_missing_file_once() {
        let fx = ChainFixture::new().unwrap();
        std::fs::remove_file(fx.config.payload_path()).unwrap();

        let report = Pipeline::new(fx.config.clone(), PipelineOptions::without_backups())
            .run(Mode::UpdateOnly);

        assert_eq!(report.failed_step, Some(UpdateStep::HashPayload));
        assert_eq!(report.errors.len(), 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_update_only_skips_verification() {
        let fx = ChainFixture::new().unwrap();
        let report = Pipeline::new(fx.config.clone(), PipelineOptions::without_backups())
            .run(Mode::UpdateOnly);

        assert!(report.is_success());
        assert!(report.verification.is_none());
        assert!(report.backups.is_empty());
        assert!(fx.backup_files().unwrap().is_empty());
    }

    #[test]
    fn test_update_failure_is_recorded() {
        let fx = ChainFixture::new().unwrap();
        fx.write_installer(r#"{"Scripts": "nope"}"#).unwrap();

        let report = Pipeline::new(fx.config.clone(), PipelineOptions::default()).run(Mode::Full);
        assert_eq!(report.failed_step, Some(UpdateStep::RewriteInstaller));
        assert_eq!(report.errors[0].kind, FindingKind::Schema);
        assert!(report.verification.is_none());
        // Snapshots taken before the failure are still reported.
        assert_eq!(report.backups.len(), 2);
    }
}
