//! # chainseal-manifest
//!
//! The two JSON manifests of an activation package.
//!
//! - `InstallerManifest` (`installer.txt`): `Scripts[0]` holds the payload
//!   length and hash.
//! - `ModuleManifest` (`1.0.0.mnf`): `HWIndex[0]` holds the hash of the
//!   installer manifest.
//!
//! Documents are kept as untyped JSON so fields we do not manage survive an
//! update in their original order. Serialization is deterministic: the same
//! logical content always produces the same bytes, because those bytes are
//! what the next link of the chain hashes.

mod installer;
mod module;

pub use installer::{BypassOutcome, InstallerManifest, PayloadRecord};
pub use module::{ManifestRecord, ModuleManifest};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use thiserror::Error;

/// Chunking constant recorded for the consumer in every `CheckSumSize` field.
pub const CHECKSUM_SIZE: u64 = 524_288;

/// Array in the installer manifest whose first entry describes the payload.
pub const SCRIPTS_KEY: &str = "Scripts";

/// Array in the module manifest whose first entry describes the installer.
pub const HW_INDEX_KEY: &str = "HWIndex";

const INDENT: &[u8] = b"    ";

/// Errors that can occur during manifest operations
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {detail}", path.display())]
    Schema { path: PathBuf, detail: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ManifestError {
    /// True for errors caused by the document's shape rather than I/O.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. } | Self::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, ManifestError>;

/// A JSON document bound to the file it was read from.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
    root: Value,
}

impl JsonDocument {
    /// Read and parse a document. The top level must be an object.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| ManifestError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(path, &bytes)
    }

    /// Parse a document from bytes, remembering `path` for saves and errors.
    pub fn from_slice(path: &Path, bytes: &[u8]) -> Result<Self> {
        let root: Value =
            serde_json::from_slice(bytes).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if !root.is_object() {
            return Err(ManifestError::Schema {
                path: path.to_path_buf(),
                detail: "top-level value is not an object".to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// `root[key][0]` as an object.
    pub fn first_entry(&self, key: &str) -> Result<&Map<String, Value>> {
        self.root
            .get(key)
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .and_then(Value::as_object)
            .ok_or_else(|| self.missing_entry(key))
    }

    /// Mutable `root[key][0]` as an object.
    pub fn first_entry_mut(&mut self, key: &str) -> Result<&mut Map<String, Value>> {
        let missing = self.missing_entry(key);
        self.root
            .get_mut(key)
            .and_then(Value::as_array_mut)
            .and_then(|entries| entries.first_mut())
            .and_then(Value::as_object_mut)
            .ok_or(missing)
    }

    fn missing_entry(&self, key: &str) -> ManifestError {
        ManifestError::Schema {
            path: self.path.clone(),
            detail: format!("missing object at {}[0]", key),
        }
    }

    /// Canonical bytes: four-space indentation, original key order,
    /// non-ASCII kept verbatim, no trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
        self.root.serialize(&mut ser)?;
        Ok(out)
    }

    /// Write the document back to the path it was loaded from.
    pub fn save(&self) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomic(&self.path, &bytes)
    }
}

/// Replace `path` with `data` using a temp file and rename.
///
/// A reader sees either the old or the new content, never a torn write.
/// An existing file keeps its permissions, and a symlink keeps pointing at
/// the file it named: the rename lands on the link target.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let access = |source| ManifestError::FileAccess {
        path: path.to_path_buf(),
        source,
    };

    let target = match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path).map_err(access)?,
        _ => path.to_path_buf(),
    };
    let existing = match fs::metadata(&target) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(access(e)),
    };

    let file_name = target
        .file_name()
        .ok_or_else(|| access(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;
    let temp_path = target.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        if let Some(permissions) = existing {
            file.set_permissions(permissions)?;
        }
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &target)
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(access(e));
    }
    tracing::debug!(component = "MANIFEST", path = %target.display(), bytes = data.len(), "saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_to_bytes_uses_four_space_indent_and_keeps_order() {
        let raw = r#"{"b": 1, "a": {"z": [], "y": "é"}}"#;
        let doc = JsonDocument::from_slice(Path::new("x.json"), raw.as_bytes()).unwrap();
        let text = String::from_utf8(doc.to_bytes().unwrap()).unwrap();

        assert_eq!(
            text,
            "{\n    \"b\": 1,\n    \"a\": {\n        \"z\": [],\n        \"y\": \"é\"\n    }\n}"
        );
    }

    #[test]
    fn test_to_bytes_is_stable_across_reparse() {
        let raw = br#"{"Scripts":[{"Name":"a","Length":3}],"Version":"1.0"}"#;
        let doc = JsonDocument::from_slice(Path::new("x.json"), raw).unwrap();
        let first = doc.to_bytes().unwrap();
        let again = JsonDocument::from_slice(Path::new("x.json"), &first)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_non_object_root_is_schema_error() {
        let err = JsonDocument::from_slice(Path::new("x.json"), b"[1, 2]").unwrap_err();
        assert!(matches!(err, ManifestError::Schema { .. }));
        assert!(err.is_schema());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = JsonDocument::from_slice(Path::new("x.json"), b"{ nope").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = JsonDocument::load(&temp.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, ManifestError::FileAccess { .. }));
        assert!(!err.is_schema());
    }

    #[test]
    fn test_first_entry_requires_array_of_objects() {
        let doc = JsonDocument::from_slice(Path::new("x.json"), br#"{"Scripts": []}"#).unwrap();
        assert!(doc.first_entry(SCRIPTS_KEY).is_err());

        let doc = JsonDocument::from_slice(Path::new("x.json"), br#"{"Scripts": [1]}"#).unwrap();
        assert!(doc.first_entry(SCRIPTS_KEY).is_err());

        let doc = JsonDocument::from_slice(Path::new("x.json"), br#"{"Scripts": [{}]}"#).unwrap();
        assert!(doc.first_entry(SCRIPTS_KEY).unwrap().is_empty());
    }

    #[test]
    fn test_write_atomic_replaces_content_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.0.0.mnf");
        fs::write(&path, b"old").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_numbers_keep_their_source_text() {
        let raw = r#"{"Serial": 123456789012345678901234567890, "Ratio": 1e-07, "Gain": 0.10}"#;
        let doc = JsonDocument::from_slice(Path::new("x.json"), raw.as_bytes()).unwrap();
        let text = String::from_utf8(doc.to_bytes().unwrap()).unwrap();

        assert!(text.contains("\"Serial\": 123456789012345678901234567890,"), "{}", text);
        assert!(text.contains("\"Ratio\": 1e-07,"), "{}", text);
        assert!(text.contains("\"Gain\": 0.10\n"), "{}", text);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("installer.txt");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        write_atomic(&path, b"new").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_follows_symlink() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real.mnf");
        let link = temp.path().join("1.0.0.mnf");
        fs::write(&real, b"old").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_atomic(&link, b"new").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&real).unwrap(), b"new");
    }

    #[test]
    fn test_write_atomic_creates_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fresh.json");

        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_save_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("installer.txt");
        fs::write(&path, br#"{"Scripts": [{"Length": 1}]}"#).unwrap();

        let doc = JsonDocument::load(&path).unwrap();
        doc.save().unwrap();

        assert_eq!(fs::read(&path).unwrap(), doc.to_bytes().unwrap());
    }
}
