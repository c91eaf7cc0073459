//! Timestamped, append-only snapshots of manifests taken before an update.
//!
//! ```text
//! .backups/
//! ├── installer.txt.20251204_191402.bak
//! ├── 1.0.0.mnf.20251204_191402.bak
//! └── 1.0.0.mnf.20251204_191402.1.bak   # second snapshot in the same second
//! ```
//!
//! Nothing here ever deletes or rotates a backup.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chainseal_config::{log_backup_info, log_backup_warn};
use chrono::{DateTime, Local};
use filetime::FileTime;

use crate::error::BackupFailure;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Upper bound on same-second generations for one file.
const MAX_GENERATIONS: u32 = 1000;

/// One snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// File that was copied
    pub source: PathBuf,
    /// Where the copy lives
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

impl BackupEntry {
    /// File name of the copy, for reports.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Writes snapshots into a single backup directory.
#[derive(Debug, Clone)]
pub struct BackupGuard {
    dir: PathBuf,
}

impl BackupGuard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `path` into the backup directory under a timestamped name.
    pub fn snapshot(&self, path: &Path) -> Result<BackupEntry, BackupFailure> {
        self.snapshot_at(path, Local::now())
    }

    /// Same as [`snapshot`](Self::snapshot) with an explicit timestamp.
    pub fn snapshot_at(
        &self,
        path: &Path,
        now: DateTime<Local>,
    ) -> Result<BackupEntry, BackupFailure> {
        let fail = |source| BackupFailure {
            path: path.to_path_buf(),
            source,
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| fail(io::Error::new(ErrorKind::InvalidInput, "no file name")))?
            .to_string_lossy()
            .into_owned();

        // Open the source first so a missing file leaves nothing behind.
        let mut src = File::open(path).map_err(fail)?;
        let meta = src.metadata().map_err(fail)?;

        fs::create_dir_all(&self.dir).map_err(fail)?;
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let (dest_path, mut dest) = self.create_unique(&file_name, &stamp).map_err(fail)?;

        let copied = io::copy(&mut src, &mut dest).and_then(|_| dest.sync_all());
        if let Err(e) = copied {
            drop(dest);
            let _ = fs::remove_file(&dest_path);
            return Err(fail(e));
        }
        drop(dest);

        preserve_metadata(&dest_path, &meta);
        log_backup_info!("snapshot created", path = tracing::field::display(dest_path.display()));

        Ok(BackupEntry {
            source: path.to_path_buf(),
            path: dest_path,
            created_at: now,
        })
    }

    /// Create a backup file that did not exist before this call.
    fn create_unique(&self, file_name: &str, stamp: &str) -> io::Result<(PathBuf, File)> {
        for generation in 0..MAX_GENERATIONS {
            let name = if generation == 0 {
                format!("{}.{}.bak", file_name, stamp)
            } else {
                format!("{}.{}.{}.bak", file_name, stamp, generation)
            };
            let candidate = self.dir.join(name);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("too many backups of {} at {}", file_name, stamp),
        ))
    }
}

/// Copy permissions and timestamps where the platform allows it.
fn preserve_metadata(dest: &Path, meta: &fs::Metadata) {
    if let Err(e) = fs::set_permissions(dest, meta.permissions()) {
        log_backup_warn!("cannot copy permissions", error = tracing::field::display(e));
    }
    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        log_backup_warn!("cannot copy timestamps", error = tracing::field::display(e));
    }
}
