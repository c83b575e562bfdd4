//! LLM clients
//!
//! The verification and enrichment capabilities are natural-language
//! completion services. They all go through [`LlmClient`], with one
//! implementation per provider.

mod backend;
mod openai_client;

pub use backend::{LlmBackend, ParseBackendError};
pub use openai_client::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Unified LLM client interface
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Call the LLM expecting a JSON object as the whole response
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}

/// Build the client selected by the environment.
///
/// Returns `Ok(None)` when no provider credentials are present, which leaves
/// verification and enrichment disabled rather than failing.
pub fn client_from_env() -> Result<Option<Arc<dyn LlmClient>>> {
    let Some(backend) = LlmBackend::from_env()? else {
        return Ok(None);
    };
    let client: Arc<dyn LlmClient> = match backend {
        LlmBackend::AzureOpenAi => Arc::new(OpenAiClient::azure_from_env()?),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::from_env()?),
    };
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "LLM client configured"
    );
    Ok(Some(client))
}

/// Strip a markdown code fence some models wrap around JSON output
pub(crate) fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
