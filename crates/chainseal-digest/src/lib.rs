//! # chainseal-digest
//!
//! Content digests for the files of an activation package.
//!
//! Every link of the integrity chain is a SHA-256 hash rendered as 64
//! lowercase hex characters. Files are hashed in fixed-size chunks so a
//! payload never has to fit in memory.
//!
//! ```text
//! activation.sh ──sha256──▶ installer.txt[Scripts][0][CheckSum]
//! installer.txt ──sha256──▶ 1.0.0.mnf[HWIndex][0][CheckSum]
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

/// Read buffer size for streaming hashes.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded SHA-256 digest.
pub const HEX_DIGEST_LEN: usize = 64;

/// Errors that can occur while hashing
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DigestError>;

/// SHA-256 of some content plus the number of bytes that were hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    hex: String,
    len: u64,
}

impl ContentDigest {
    /// Lowercase hex form, as recorded in manifests.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Byte length of the hashed content.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact, case-sensitive comparison against a recorded hash string.
    pub fn matches(&self, recorded: &str) -> bool {
        self.hex == recorded
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.hex[..12]
    }

    fn from_hasher(hasher: Sha256, len: u64) -> Self {
        Self {
            hex: hex::encode(hasher.finalize()),
            len,
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Hash a file without loading it into memory.
///
/// Any open or read error is returned; a partial read never yields a digest.
#[instrument(level = "debug")]
pub fn hash_file(path: &Path) -> Result<ContentDigest> {
    let access = |source| DigestError::FileAccess {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(access)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    let mut len = 0u64;

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(access(e)),
        };
        hasher.update(&buf[..n]);
        len += n as u64;
    }

    let digest = ContentDigest::from_hasher(hasher, len);
    tracing::debug!(component = "DIGEST", len, hash = digest.short(), "hashed file");
    Ok(digest)
}

/// Hash an in-memory buffer.
#[inline]
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentDigest::from_hasher(hasher, data.len() as u64)
}

/// Whether `s` has the shape of a digest this crate produces.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == HEX_DIGEST_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
