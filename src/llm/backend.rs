//! Backend Selection
//!
//! Enum for selecting between LLM providers (Azure OpenAI, OpenAI).

use anyhow::{anyhow, Result};
use std::str::FromStr;

/// LLM backend provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    /// Azure-hosted OpenAI deployment
    AzureOpenAi,
    /// OpenAI GPT
    OpenAi,
}

impl LlmBackend {
    /// Resolve the backend from the environment.
    ///
    /// `LLM_BACKEND` wins when set. Otherwise the first provider with
    /// credentials present is used, Azure before OpenAI.
    /// Returns `None` if nothing is configured.
    pub fn from_env() -> Result<Option<Self>> {
        if let Ok(value) = std::env::var("LLM_BACKEND") {
            return value
                .parse()
                .map(Some)
                .map_err(|e: ParseBackendError| anyhow!("{}", e));
        }
        Ok(Self::detect(|key| {
            std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false)
        }))
    }

    fn detect(has: impl Fn(&str) -> bool) -> Option<Self> {
        if has("AZURE_OPENAI_API_KEY") && has("AZURE_OPENAI_ENDPOINT") {
            Some(LlmBackend::AzureOpenAi)
        } else if has("OPENAI_API_KEY") {
            Some(LlmBackend::OpenAi)
        } else {
            None
        }
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            LlmBackend::AzureOpenAi => "Azure OpenAI",
            LlmBackend::OpenAi => "OpenAI",
        }
    }
}

/// Error type for parsing LlmBackend
#[derive(Debug)]
pub struct ParseBackendError(String);

impl std::fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for LlmBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "azure-openai" | "azure_openai" => Ok(LlmBackend::AzureOpenAi),
            "openai" | "gpt" => Ok(LlmBackend::OpenAi),
            other => Err(ParseBackendError(format!(
                "Unknown LLM_BACKEND '{}'. Valid values: azure, openai, gpt",
                other
            ))),
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
