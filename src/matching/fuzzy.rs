//! Token-order-insensitive fuzzy similarity
//!
//! Both strings are lowercased, non-alphanumerics become spaces, tokens are
//! sorted and re-joined, and the results are compared with the Indel ratio
//! (`2 * LCS / (len_a + len_b)`), the metric the 98/85 thresholds are
//! calibrated on. Scores are on a 0..=100 scale, rounded to whole points.

use std::cmp::Ordering;

/// A scored candidate from the target pool
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyCandidate {
    pub name: String,
    pub score: f64,
}

/// Preprocess a name into its sorted-token form
pub fn token_sort_key(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity between two names, 0..=100
pub fn similarity(a: &str, b: &str) -> f64 {
    score_keys(&token_sort_key(a), &token_sort_key(b))
}

fn score_keys(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0).round()
}

/// Pool of target names with their sort keys precomputed
#[derive(Debug, Clone)]
pub struct FuzzyPool {
    entries: Vec<(String, String)>,
}

impl FuzzyPool {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let key = token_sort_key(&name);
                (name, key)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` best candidates, highest score first.
    ///
    /// Ties keep pool order so the ranking is reproducible.
    pub fn top_k(&self, name: &str, k: usize) -> Vec<FuzzyCandidate> {
        let key = token_sort_key(name);
        let mut scored: Vec<FuzzyCandidate> = self
            .entries
            .iter()
            .map(|(target, target_key)| FuzzyCandidate {
                name: target.clone(),
                score: score_keys(&key, target_key),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Single best candidate
    pub fn best(&self, name: &str) -> Option<FuzzyCandidate> {
        self.top_k(name, 1).into_iter().next()
    }
}

/// Rank `pool` against `name` without keeping a [`FuzzyPool`] around
pub fn top_k(name: &str, pool: &[String], k: usize) -> Vec<FuzzyCandidate> {
    FuzzyPool::new(pool.iter().cloned()).top_k(name, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_order_insensitive() {
        assert_eq!(similarity("Steel Dillinger", "dillinger steel"), 100.0);
    }

    #[test]
    fn test_punctuation_ignored() {
        assert_eq!(similarity("Thyssen-Krupp", "thyssen krupp"), 100.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(similarity("", "Acme"), 0.0);
        assert_eq!(similarity("---", "Acme"), 0.0);
    }

    #[test]
    fn test_partial_similarity_in_range() {
        let score = similarity("Salzgitter Flachstahl", "Salzgitter");
        assert!(score > 0.0 && score < 100.0);
    }

    #[test]
    fn test_indel_calibration() {
        // one dropped letter out of 35 characters
        assert_eq!(similarity("Voestalpine Stahll", "Voestalpine Stahl"), 97.0);
        // 2 * 6 / (14 + 10)
        assert_eq!(similarity("SMS group GmbH", "SMS Siemag"), 50.0);
    }

    #[test]
    fn test_top_k_ordering_and_limit() {
        let pool = vec![
            "Voestalpine".to_string(),
            "Outokumpu".to_string(),
            "Outokumpu Stainless".to_string(),
            "Aperam".to_string(),
        ];
        let ranked = top_k("Outokumpu", &pool, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Outokumpu");
        assert_eq!(ranked[0].score, 100.0);
        assert_eq!(ranked[1].name, "Outokumpu Stainless");
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let pool = FuzzyPool::new(["abcx", "abcy"]);
        let ranked = pool.top_k("abcz", 2);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].name, "abcx");
    }

    #[test]
    fn test_best_on_empty_pool() {
        let pool = FuzzyPool::new(Vec::<String>::new());
        assert!(pool.best("anything").is_none());
    }
}
