//! Reconciliation configuration
//!
//! Loaded from YAML. Every section and field has a default so a partial (or
//! empty) document is valid. LLM credentials are not part of this file; they
//! come from the environment (see [`crate::llm::LlmBackend::from_env`]).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub database: DatabaseConfig,
    pub sources: SourcesConfig,
    pub matching: MatchingConfig,
    pub cache: CacheConfig,
    pub ingest: IngestConfig,
    pub enrichment: EnrichmentConfig,
}

/// Analytical store location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path; `:memory:` opens a private in-memory store
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/unified.db".to_string(),
        }
    }
}

/// Where the source extracts live (used only for fingerprinting mtimes)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Directory scanned for source file modification times
    pub data_dir: Option<PathBuf>,
    /// File extensions whose mtimes feed the fingerprint
    pub fingerprint_extensions: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            fingerprint_extensions: vec!["xlsx".to_string(), "csv".to_string()],
        }
    }
}

/// Entity resolution thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fuzzy score accepted without asking the verifier
    pub auto_accept_score: f64,
    /// Minimum fuzzy score accepted when the verifier has no opinion
    pub fuzzy_threshold: f64,
    /// Number of fuzzy candidates handed to the verifier
    pub verification_candidates: usize,
    /// Upper bound on a single verification call
    pub verification_timeout_secs: u64,
    /// Confidence assumed when the verifier asserts a match without one
    pub default_verified_confidence: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_accept_score: 98.0,
            fuzzy_threshold: 85.0,
            verification_candidates: 10,
            verification_timeout_secs: 30,
            default_verified_confidence: 90.0,
        }
    }
}

impl MatchingConfig {
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_secs(self.verification_timeout_secs)
    }
}

/// Query cache behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Ingestion-time shaping of the source rows
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Canonical regions to keep (e.g. `["Europe", "Oceania"]`); empty keeps all rows
    pub region_scope: Vec<String>,
}

/// External lookup batching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Company names sent per lookup request
    pub batch_size: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

impl ReconcileConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ReconcileConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
database:
  path: "/tmp/unified.db"

sources:
  data_dir: "data"
  fingerprint_extensions: ["xlsx"]

matching:
  fuzzy_threshold: 80
  verification_timeout_secs: 5

cache:
  ttl_secs: 60

ingest:
  region_scope: ["Europe", "Oceania"]
"#;

        let config = ReconcileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.database.path, "/tmp/unified.db");
        assert_eq!(config.sources.data_dir, Some(PathBuf::from("data")));
        assert_eq!(config.matching.fuzzy_threshold, 80.0);
        // untouched fields keep their defaults
        assert_eq!(config.matching.auto_accept_score, 98.0);
        assert_eq!(config.matching.verification_candidates, 10);
        assert_eq!(config.matching.verification_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.ingest.region_scope, vec!["Europe", "Oceania"]);
        assert_eq!(config.enrichment.batch_size, 10);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ReconcileConfig::from_yaml("").unwrap();
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.ingest.region_scope.is_empty());
        assert!(config.sources.data_dir.is_none());
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ReconcileConfig::from_yaml("cache: [oops").unwrap_err();
        assert!(matches!(err, crate::error::ReconcileError::Config { .. }));
    }
}
