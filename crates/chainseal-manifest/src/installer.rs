//! Installer manifest (`installer.txt`).

use std::path::Path;

use chainseal_digest::ContentDigest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{JsonDocument, ManifestError, Result, CHECKSUM_SIZE, SCRIPTS_KEY};

/// Field whose presence asks the consumer for an extra signature check.
pub const EXTRA_FILES_KEY: &str = "ExtraFiles";

/// Typed view of `Scripts[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PayloadRecord {
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(rename = "CheckSum", default)]
    pub checksum: Vec<String>,
    #[serde(rename = "CheckSumSize", default)]
    pub checksum_size: Option<u64>,
    #[serde(default, deserialize_with = "present")]
    pub extra_files: bool,
}

impl PayloadRecord {
    /// The hash consumers compare against, `CheckSum[0]`.
    pub fn recorded_hash(&self) -> Option<&str> {
        self.checksum.first().map(String::as_str)
    }
}

/// Result of removing `ExtraFiles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassOutcome {
    /// The field was present and has been removed.
    Removed,
    /// The field was already absent; nothing changed.
    AlreadyAbsent,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|_| true)
}

/// The first manifest in the chain.
#[derive(Debug, Clone)]
pub struct InstallerManifest {
    doc: JsonDocument,
}

impl InstallerManifest {
    /// Load and check that `Scripts[0]` exists.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_document(JsonDocument::load(path)?)
    }

    pub fn from_document(doc: JsonDocument) -> Result<Self> {
        doc.first_entry(SCRIPTS_KEY)?;
        Ok(Self { doc })
    }

    pub fn document(&self) -> &JsonDocument {
        &self.doc
    }

    pub fn payload_record(&self) -> Result<PayloadRecord> {
        let entry = self.doc.first_entry(SCRIPTS_KEY)?;
        serde_json::from_value(Value::Object(entry.clone())).map_err(|e| ManifestError::Schema {
            path: self.doc.path().to_path_buf(),
            detail: format!("{}[0]: {}", SCRIPTS_KEY, e),
        })
    }

    pub fn has_extra_files(&self) -> Result<bool> {
        Ok(self
            .doc
            .first_entry(SCRIPTS_KEY)?
            .contains_key(EXTRA_FILES_KEY))
    }

    /// Record `digest` as the payload's length and hash.
    ///
    /// `CheckSumSize` is reset to [`CHECKSUM_SIZE`] whatever it held before.
    pub fn apply_payload_digest(&mut self, digest: &ContentDigest) -> Result<()> {
        let entry = self.doc.first_entry_mut(SCRIPTS_KEY)?;
        entry.insert("Length".to_string(), json!(digest.len()));
        entry.insert("CheckSum".to_string(), json!([digest.hex()]));
        entry.insert("CheckSumSize".to_string(), json!(CHECKSUM_SIZE));
        Ok(())
    }

    /// Drop `ExtraFiles` from `Scripts[0]`. Idempotent.
    pub fn remove_extra_files(&mut self) -> Result<BypassOutcome> {
        let entry = self.doc.first_entry_mut(SCRIPTS_KEY)?;
        Ok(match entry.shift_remove(EXTRA_FILES_KEY) {
            Some(_) => BypassOutcome::Removed,
            None => BypassOutcome::AlreadyAbsent,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.doc.to_bytes()
    }

    pub fn save(&self) -> Result<()> {
        self.doc.save()
    }
}
