//! OpenAI Client
//!
//! Chat-completions client for both api.openai.com and Azure OpenAI
//! deployments. Both speak the same request/response format; only the URL
//! and the auth header differ.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::LlmClient;

/// Default OpenAI model
const DEFAULT_MODEL: &str = "gpt-4o";

/// Default Azure API version
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
enum Endpoint {
    Public,
    Azure {
        endpoint: String,
        api_version: String,
    },
}

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    endpoint: Endpoint,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given API key
    pub fn new(api_key: String) -> Result<Self> {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::build(api_key, model, Endpoint::Public)
    }

    /// Create a client for an Azure deployment; `deployment` doubles as the model name
    pub fn azure(
        api_key: String,
        endpoint: &str,
        deployment: &str,
        api_version: &str,
    ) -> Result<Self> {
        Self::build(
            api_key,
            deployment.to_string(),
            Endpoint::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_version: api_version.to_string(),
            },
        )
    }

    /// Create from `OPENAI_API_KEY` (and optional `OPENAI_MODEL`)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::new(api_key)
    }

    /// Create from the `AZURE_OPENAI_*` variables
    pub fn azure_from_env() -> Result<Self> {
        let api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| anyhow!("AZURE_OPENAI_API_KEY environment variable not set"))?;
        let endpoint = std::env::var("AZURE_OPENAI_ENDPOINT")
            .map_err(|_| anyhow!("AZURE_OPENAI_ENDPOINT environment variable not set"))?;
        let deployment =
            std::env::var("AZURE_OPENAI_DEPLOYMENT").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());
        Self::azure(api_key, &endpoint, &deployment, &api_version)
    }

    fn build(api_key: String, model: String, endpoint: Endpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            api_key,
            client,
            model,
            endpoint,
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::Public => "https://api.openai.com/v1/chat/completions".to_string(),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, self.model, api_version
            ),
        }
    }

    /// Internal API call implementation
    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.0,
            "response_format": {"type": "json_object"}
        });

        let request = self.client.post(self.url()).json(&body);
        let request = match self.endpoint {
            Endpoint::Public => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => request.header("api-key", &self.api_key),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} API error {}: {}", self.provider_name(), status, body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("{} returned no choices", self.provider_name()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.call_api(system_prompt, user_prompt).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        match self.endpoint {
            Endpoint::Public => "OpenAI",
            Endpoint::Azure { .. } => "Azure OpenAI",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        let client = OpenAiClient::build(
            "test-key".to_string(),
            "gpt-4o".to_string(),
            Endpoint::Public,
        )
        .unwrap();
        assert_eq!(client.url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(client.provider_name(), "OpenAI");
    }

    #[test]
    fn test_azure_url() {
        let client = OpenAiClient::azure(
            "test-key".to_string(),
            "https://example.openai.azure.com/",
            "gpt-4o-prod",
            "2024-02-15-preview",
        )
        .unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o-prod/chat/completions?api-version=2024-02-15-preview"
        );
        assert_eq!(client.model_name(), "gpt-4o-prod");
        assert_eq!(client.provider_name(), "Azure OpenAI");
    }
}
