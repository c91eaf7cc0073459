//! Chain Updater: brings the three files back into a consistent chain.
//!
//! Steps run in order and stop at the first failure:
//!
//! 1. snapshot both manifests (policy permitting)
//! 2. hash the payload
//! 3. rewrite `Scripts[0]` and drop `ExtraFiles`
//! 4. persist the installer manifest
//! 5. hash the installer manifest as written
//! 6. rewrite and persist `HWIndex[0]`
//!
//! Both manifests are loaded and checked before the first write, so a
//! malformed module manifest never leaves a half-updated chain behind.
//! Steps 4 and 6 are separate atomic writes; an interruption between them
//! leaves link 2 stale until the next update.

use chainseal_config::{
    log_backup_warn, log_update_debug, log_update_error, log_update_info, BackupPolicy,
    ChainConfig,
};
use chainseal_digest::{hash_bytes, hash_file, ContentDigest};
use chainseal_manifest::{write_atomic, BypassOutcome, InstallerManifest, ModuleManifest};

use crate::backup::{BackupEntry, BackupGuard};
use crate::error::{ChainError, UpdateFailure, UpdateStep};
use crate::report::{Finding, FindingKind};

/// Chain after a successful update.
#[derive(Debug, Clone)]
pub struct ChainState {
    /// Digest now recorded for the payload
    pub payload: ContentDigest,
    /// Digest now recorded for the installer manifest
    pub installer: ContentDigest,
    pub bypass: BypassOutcome,
    pub backups: Vec<BackupEntry>,
    /// Non-fatal problems met along the way
    pub warnings: Vec<Finding>,
}

#[derive(Default)]
struct Progress {
    backups: Vec<BackupEntry>,
    warnings: Vec<Finding>,
}

type StepResult<T> = Result<T, (UpdateStep, ChainError)>;

fn at<E: Into<ChainError>>(step: UpdateStep) -> impl FnOnce(E) -> (UpdateStep, ChainError) {
    move |e| (step, e.into())
}

pub struct ChainUpdater<'a> {
    config: &'a ChainConfig,
    policy: BackupPolicy,
}

impl<'a> ChainUpdater<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self {
            config,
            policy: config.backup.policy,
        }
    }

    /// Override the configured backup policy for this updater.
    pub fn with_backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn update(&self) -> Result<ChainState, UpdateFailure> {
        let mut progress = Progress::default();
        match self.run(&mut progress) {
            Ok((payload, installer, bypass)) => Ok(ChainState {
                payload,
                installer,
                bypass,
                backups: progress.backups,
                warnings: progress.warnings,
            }),
            Err((step, source)) => {
                log_update_error!("update aborted", step = tracing::field::display(step), error = tracing::field::display(&source));
                Err(UpdateFailure {
                    step,
                    source,
                    backups: progress.backups,
                    warnings: progress.warnings,
                })
            }
        }
    }

    fn run(
        &self,
        progress: &mut Progress,
    ) -> StepResult<(ContentDigest, ContentDigest, BypassOutcome)> {
        let installer_path = self.config.installer_path();
        let module_path = self.config.module_manifest_path();

        // 1. Backups
        if self.policy.enabled() {
            self.backup(progress)?;
        }

        // 2. Payload digest
        let payload = hash_file(&self.config.payload_path()).map_err(at(UpdateStep::HashPayload))?;
        log_update_info!("payload hashed", len = payload.len(), hash = payload.short());

        // 3. Installer manifest in memory
        let mut installer =
            InstallerManifest::load(&installer_path).map_err(at(UpdateStep::RewriteInstaller))?;
        installer
            .apply_payload_digest(&payload)
            .map_err(at(UpdateStep::RewriteInstaller))?;
        let bypass = installer
            .remove_extra_files()
            .map_err(at(UpdateStep::RewriteInstaller))?;
        log_update_debug!("bypass applied", outcome = tracing::field::display(format!("{:?}", bypass)));

        let mut module =
            ModuleManifest::load(&module_path).map_err(at(UpdateStep::RewriteModule))?;

        // 4. Persist installer
        let installer_bytes = installer
            .to_bytes()
            .map_err(at(UpdateStep::PersistInstaller))?;
        write_atomic(&installer_path, &installer_bytes).map_err(at(UpdateStep::PersistInstaller))?;

        // 5. Hash what is on disk now
        let installer_digest = hash_file(&installer_path).map_err(at(UpdateStep::HashInstaller))?;
        if installer_digest != hash_bytes(&installer_bytes) {
            progress.warnings.push(Finding::warning(
                FindingKind::ConcurrentEdit,
                format!(
                    "{} changed on disk while it was being updated",
                    installer_path.display()
                ),
            ));
        }
        log_update_info!(
            "installer manifest hashed",
            len = installer_digest.len(),
            hash = installer_digest.short()
        );

        // 6. Module manifest
        module
            .apply_installer_digest(&self.config.package.installer_ref, &installer_digest)
            .map_err(at(UpdateStep::RewriteModule))?;
        module.save().map_err(at(UpdateStep::PersistModule))?;
        log_update_info!("module manifest updated");

        Ok((payload, installer_digest, bypass))
    }

    fn backup(&self, progress: &mut Progress) -> StepResult<()> {
        let guard = BackupGuard::new(self.config.backup_dir());
        for path in [self.config.installer_path(), self.config.module_manifest_path()] {
            match guard.snapshot(&path) {
                Ok(entry) => progress.backups.push(entry),
                Err(e) if self.policy == BackupPolicy::Require => {
                    return Err((UpdateStep::Backup, e.into()));
                }
                Err(e) => {
                    log_backup_warn!("snapshot failed, continuing", error = tracing::field::display(&e));
                    progress
                        .warnings
                        .push(Finding::warning(FindingKind::BackupFailed, e.to_string()));
                }
            }
        }
        Ok(())
    }
}
