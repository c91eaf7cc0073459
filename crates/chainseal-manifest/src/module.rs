//! Module manifest (`*.mnf`).

use std::path::Path;

use chainseal_digest::ContentDigest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{JsonDocument, ManifestError, Result, CHECKSUM_SIZE, HW_INDEX_KEY};

/// Typed view of `HWIndex[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestRecord {
    #[serde(rename = "InstallerFile", default)]
    pub installer_file: Option<String>,
    #[serde(rename = "CheckSum", default)]
    pub checksum: Vec<String>,
    #[serde(rename = "CheckSumSize", default)]
    pub checksum_size: Option<u64>,
}

impl ManifestRecord {
    pub fn recorded_hash(&self) -> Option<&str> {
        self.checksum.first().map(String::as_str)
    }
}

/// The second manifest in the chain.
#[derive(Debug, Clone)]
pub struct ModuleManifest {
    doc: JsonDocument,
}

impl ModuleManifest {
    /// Load and check that `HWIndex[0]` exists.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_document(JsonDocument::load(path)?)
    }

    pub fn from_document(doc: JsonDocument) -> Result<Self> {
        doc.first_entry(HW_INDEX_KEY)?;
        Ok(Self { doc })
    }

    pub fn document(&self) -> &JsonDocument {
        &self.doc
    }

    pub fn manifest_record(&self) -> Result<ManifestRecord> {
        let entry = self.doc.first_entry(HW_INDEX_KEY)?;
        serde_json::from_value(Value::Object(entry.clone())).map_err(|e| ManifestError::Schema {
            path: self.doc.path().to_path_buf(),
            detail: format!("{}[0]: {}", HW_INDEX_KEY, e),
        })
    }

    /// Point `HWIndex[0]` at the installer manifest and record its hash.
    pub fn apply_installer_digest(
        &mut self,
        installer_file: &str,
        digest: &ContentDigest,
    ) -> Result<()> {
        let entry = self.doc.first_entry_mut(HW_INDEX_KEY)?;
        entry.insert("InstallerFile".to_string(), json!(installer_file));
        entry.insert("CheckSum".to_string(), json!([digest.hex()]));
        entry.insert("CheckSumSize".to_string(), json!(CHECKSUM_SIZE));
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.doc.to_bytes()
    }

    pub fn save(&self) -> Result<()> {
        self.doc.save()
    }
}
