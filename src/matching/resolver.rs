//! Entity resolution between equipment identities and CRM names
//!
//! Resolution order for one candidate:
//! 1. previously persisted mapping (preloaded in bulk)
//! 2. exact match on the normalized, lowercased name → 100
//! 3. best fuzzy score ≥ `auto_accept_score` → accepted as is
//! 4. top fuzzy candidates handed to the verifier, bounded by a timeout
//! 5. best fuzzy score ≥ `fuzzy_threshold` → accepted, else no match

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::config::MatchingConfig;
use crate::matching::fuzzy::FuzzyPool;
use crate::matching::normalize::comparison_key;
use crate::matching::verifier::MatchVerifier;
use crate::model::CompanyMapping;
use crate::oplog::OperationalLog;

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Existing,
    Exact,
    Fuzzy,
    Verified,
}

/// A matched target name with its confidence (0..=100)
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub matched_name: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// The names a candidate can resolve to
#[derive(Debug, Clone)]
pub struct TargetPool {
    exact: HashMap<String, String>,
    fuzzy: FuzzyPool,
}

impl TargetPool {
    /// Build the pool; names are deduplicated and sorted so ranking is reproducible
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        let mut exact = HashMap::new();
        for name in &sorted {
            exact
                .entry(comparison_key(name))
                .or_insert_with(|| name.clone());
        }

        Self {
            exact,
            fuzzy: FuzzyPool::new(sorted),
        }
    }

    pub fn len(&self) -> usize {
        self.fuzzy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fuzzy.is_empty()
    }

    fn exact_match(&self, candidate: &str) -> Option<&str> {
        let key = comparison_key(candidate);
        if key.is_empty() {
            return None;
        }
        self.exact.get(&key).map(String::as_str)
    }
}

/// Resolves equipment-side names against a CRM target pool
pub struct EntityResolver {
    known: HashMap<String, Resolution>,
    verifier: Option<Arc<dyn MatchVerifier>>,
    config: MatchingConfig,
    log: OperationalLog,
}

impl EntityResolver {
    pub fn new(config: MatchingConfig, log: OperationalLog) -> Self {
        Self {
            known: HashMap::new(),
            verifier: None,
            config,
            log,
        }
    }

    pub fn with_verifier(mut self, verifier: Option<Arc<dyn MatchVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Preload persisted mappings (keyed by equipment name). The first mapping
    /// seen for a name wins.
    pub fn with_known_mappings(mut self, mappings: &[CompanyMapping]) -> Self {
        for mapping in mappings {
            self.known
                .entry(mapping.equipment_name.clone())
                .or_insert_with(|| Resolution {
                    matched_name: mapping.crm_name.clone(),
                    confidence: mapping.confidence.unwrap_or(0.0),
                    method: MatchMethod::Existing,
                });
        }
        self
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains_key(name)
    }

    /// Resolve a single candidate name
    pub async fn resolve(&self, candidate: &str, pool: &TargetPool) -> Option<Resolution> {
        if let Some(existing) = self.known.get(candidate) {
            return Some(existing.clone());
        }

        if let Some(target) = pool.exact_match(candidate) {
            return Some(Resolution {
                matched_name: target.to_string(),
                confidence: 100.0,
                method: MatchMethod::Exact,
            });
        }

        let best = pool.fuzzy.best(candidate)?;
        if best.score >= self.config.auto_accept_score {
            return Some(Resolution {
                matched_name: best.name,
                confidence: best.score,
                method: MatchMethod::Fuzzy,
            });
        }

        if let Some(verified) = self.verify(candidate, pool).await {
            return Some(verified);
        }

        if best.score >= self.config.fuzzy_threshold {
            return Some(Resolution {
                matched_name: best.name,
                confidence: best.score,
                method: MatchMethod::Fuzzy,
            });
        }

        None
    }

    /// Resolve every candidate that has no persisted mapping yet.
    ///
    /// Candidates are processed in order, once each; blank names are skipped.
    pub async fn resolve_new(&self, candidates: &[String], pool: &TargetPool) -> Vec<CompanyMapping> {
        let mut seen = HashSet::new();
        let mut mappings = Vec::new();

        for candidate in candidates {
            if candidate.trim().is_empty() || self.is_known(candidate) || !seen.insert(candidate) {
                continue;
            }
            if let Some(resolution) = self.resolve(candidate, pool).await {
                if resolution.method != MatchMethod::Exact {
                    self.log.info(format!(
                        "Mapped: '{}' -> '{}' (score: {}, {:?})",
                        candidate, resolution.matched_name, resolution.confidence, resolution.method
                    ));
                }
                mappings.push(CompanyMapping {
                    crm_name: resolution.matched_name,
                    equipment_name: candidate.clone(),
                    confidence: Some(resolution.confidence),
                });
            }
        }

        mappings
    }

    /// Ask the verifier; every failure mode collapses to `None`
    async fn verify(&self, candidate: &str, pool: &TargetPool) -> Option<Resolution> {
        let verifier = self.verifier.as_ref()?;
        let names: Vec<String> = pool
            .fuzzy
            .top_k(candidate, self.config.verification_candidates)
            .into_iter()
            .map(|c| c.name)
            .collect();
        if names.is_empty() {
            return None;
        }

        let timeout = self.config.verification_timeout();
        let decision = match tokio::time::timeout(timeout, verifier.verify(candidate, &names)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                self.log
                    .warn(format!("Verification failed for '{}': {:#}", candidate, e));
                return None;
            }
            Err(_) => {
                self.log.warn(format!(
                    "Verification timed out for '{}' after {}s",
                    candidate,
                    timeout.as_secs()
                ));
                return None;
            }
        };

        if !decision.match_found {
            return None;
        }
        let matched = decision.matched_name?;
        if !names.contains(&matched) {
            self.log.warn(format!(
                "Verifier picked '{}' for '{}', which is not among the candidates; ignored",
                matched, candidate
            ));
            return None;
        }

        let confidence = decision
            .confidence
            .unwrap_or(self.config.default_verified_confidence)
            .clamp(0.0, 100.0);
        Some(Resolution {
            matched_name: matched,
            confidence,
            method: MatchMethod::Verified,
        })
    }
}
