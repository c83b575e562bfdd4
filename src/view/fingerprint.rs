//! Change detection for the rebuild gate
//!
//! A SHA-256 over the source table row counts, the store's load generation
//! (bumped on every source-table replacement) and the modification times of
//! the source files. Equal fingerprints mean "nothing worth rebuilding".

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::config::SourcesConfig;
use crate::error::Result;
use crate::store::{Store, CRM_TABLE, EQUIPMENT_TABLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFingerprint(String);

impl DataFingerprint {
    /// Hash the given `(label, count)` pairs and `(file name, mtime millis)` pairs
    pub fn compute(tables: &[(&str, i64)], files: &[(String, i64)]) -> Self {
        let mut parts: Vec<String> = tables
            .iter()
            .map(|(table, rows)| format!("{}:{}", table, rows))
            .collect();
        let mut files = files.to_vec();
        files.sort();
        parts.extend(files.iter().map(|(name, mtime)| format!("{}:{}", name, mtime)));

        let digest = Sha256::digest(parts.join("|").as_bytes());
        Self(hex::encode(digest))
    }

    /// Fingerprint of what is loaded right now
    pub async fn current(store: &Store, sources: &SourcesConfig) -> Result<Self> {
        let crm = store.row_count(CRM_TABLE).await?;
        let equipment = store.row_count(EQUIPMENT_TABLE).await?;
        let generation = store.load_generation().await?;
        let files = match &sources.data_dir {
            Some(dir) => source_file_mtimes(dir, &sources.fingerprint_extensions),
            None => Vec::new(),
        };
        Ok(Self::compute(
            &[
                (CRM_TABLE, crm),
                (EQUIPMENT_TABLE, equipment),
                ("load_generation", generation),
            ],
            &files,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DataFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modification times of the files in `dir` with one of `extensions`.
///
/// Unreadable entries are skipped; a missing directory yields nothing.
pub fn source_file_mtimes(dir: &Path, extensions: &[String]) -> Vec<(String, i64)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Source directory not readable");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        if let Some(mtime) = mtime {
            files.push((entry.file_name().to_string_lossy().into_owned(), mtime));
        }
    }
    files.sort();
    files
}
