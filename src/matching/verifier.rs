//! Match verification capability
//!
//! Given a target name and a short list of fuzzy candidates, a verifier
//! decides which candidate (if any) denotes the same company. Verifiers are
//! treated as slow and unreliable: the resolver bounds every call with a
//! timeout and treats any error as "no opinion".

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::llm::{strip_json_fence, LlmClient};

/// Structured verdict returned by a verifier
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VerificationDecision {
    pub match_found: bool,
    pub matched_name: Option<String>,
    pub confidence: Option<f64>,
}

impl VerificationDecision {
    pub fn no_match() -> Self {
        Self::default()
    }

    pub fn matched(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            match_found: true,
            matched_name: Some(name.into()),
            confidence: Some(confidence),
        }
    }
}

/// Picks the best semantic match for a name among candidates
#[async_trait]
pub trait MatchVerifier: Send + Sync {
    async fn verify(&self, target: &str, candidates: &[String]) -> Result<VerificationDecision>;
}

const SYSTEM_PROMPT: &str =
    "You are an expert in industrial company entity resolution and master data management.";

/// Verifier backed by an LLM completion service
pub struct LlmMatchVerifier {
    client: Arc<dyn LlmClient>,
}

impl LlmMatchVerifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(target: &str, candidates: &[String]) -> Result<String> {
        let listed = serde_json::to_string(candidates)?;
        Ok(format!(
            r#"Task: Company Entity Resolution
Target Name: '{target}'
Candidates: {listed}

Rules:
1. Determine if '{target}' is the same company as any in the candidates list.
2. Consider abbreviations (e.g., 'SMS' for 'SMS group'), legal suffixes ('GmbH', 'Ltd', 'AG'), and common misspellings.
3. If a match is found, return the exact name from the candidates list.
4. Set confidence to 100 if you are certain, or lower if there's ambiguity.

Respond ONLY with JSON: {{"match_found": true/false, "matched_name": "exact candidate name", "confidence": 0-100}}"#
        ))
    }
}

#[async_trait]
impl MatchVerifier for LlmMatchVerifier {
    async fn verify(&self, target: &str, candidates: &[String]) -> Result<VerificationDecision> {
        let prompt = Self::build_prompt(target, candidates)?;
        let raw = self.client.chat_json(SYSTEM_PROMPT, &prompt).await?;
        let decision: VerificationDecision = serde_json::from_str(strip_json_fence(&raw))
            .with_context(|| format!("Unparseable verification response: {}", raw))?;
        tracing::debug!(
            target_name = %target,
            model = self.client.model_name(),
            match_found = decision.match_found,
            "Verification response"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct CannedClient(String);

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn chat_json(&self, _system: &str, user: &str) -> Result<String> {
            assert!(user.contains("Target Name: 'SMS'"));
            Ok(self.0.clone())
        }
        fn model_name(&self) -> &str {
            "canned"
        }
        fn provider_name(&self) -> &str {
            "test"
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn chat_json(&self, _system: &str, _user: &str) -> Result<String> {
            Err(anyhow!("service unavailable"))
        }
        fn model_name(&self) -> &str {
            "failing"
        }
        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn candidates() -> Vec<String> {
        vec!["SMS group".to_string(), "SMS Siemag".to_string()]
    }

    #[tokio::test]
    async fn test_parses_decision() {
        let client = CannedClient(
            r#"{"match_found": true, "matched_name": "SMS group", "confidence": 95}"#.to_string(),
        );
        let verifier = LlmMatchVerifier::new(Arc::new(client));
        let decision = verifier.verify("SMS", &candidates()).await.unwrap();
        assert_eq!(decision, VerificationDecision::matched("SMS group", 95.0));
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let client = CannedClient(r#"{"match_found": false}"#.to_string());
        let verifier = LlmMatchVerifier::new(Arc::new(client));
        let decision = verifier.verify("SMS", &candidates()).await.unwrap();
        assert_eq!(decision, VerificationDecision::no_match());
    }

    #[tokio::test]
    async fn test_garbage_is_error() {
        let client = CannedClient("I think it is SMS group".to_string());
        let verifier = LlmMatchVerifier::new(Arc::new(client));
        assert!(verifier.verify("SMS", &candidates()).await.is_err());
    }

    #[tokio::test]
    async fn test_client_error_propagates() {
        let verifier = LlmMatchVerifier::new(Arc::new(FailingClient));
        assert!(verifier.verify("SMS", &candidates()).await.is_err());
    }
}
