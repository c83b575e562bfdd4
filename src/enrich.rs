//! External lookups that fill gaps in the unified view
//!
//! Two capabilities: headquarters location (coordinates plus country) and
//! company profile (CEO plus headcount). Both take one batch of company names
//! and return whatever they found, keyed by the name as given. The service
//! does the batching and absorbs failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::{strip_json_fence, LlmClient};

/// Location found for one company
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationInfo {
    #[serde(deserialize_with = "lenient_number")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub longitude: Option<f64>,
    pub country: Option<String>,
}

impl LocationInfo {
    /// Both coordinates present, finite and in range
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some((lat, lon))
    }
}

/// Profile found for one company
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileInfo {
    pub ceo: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub fte: Option<f64>,
}

impl ProfileInfo {
    /// CEO with blank and placeholder values removed
    pub fn ceo(&self) -> Option<&str> {
        self.ceo
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("n/a") && !c.eq_ignore_ascii_case("unknown"))
    }

    /// Headcount when positive
    pub fn fte(&self) -> Option<f64> {
        self.fte.filter(|f| f.is_finite() && *f > 0.0)
    }
}

#[async_trait]
pub trait LocationLookup: Send + Sync {
    async fn locate(&self, companies: &[String]) -> Result<HashMap<String, LocationInfo>>;
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn profiles(&self, companies: &[String]) -> Result<HashMap<String, ProfileInfo>>;
}

/// Numbers sometimes come back as strings ("164,000") or as null
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

const LOCATION_SYSTEM_PROMPT: &str = "You are a professional business researcher specializing in corporate intelligence and global industrial locations.";

const PROFILE_SYSTEM_PROMPT: &str =
    "You are a professional business researcher specializing in corporate intelligence.";

/// Location lookup backed by an LLM
pub struct LlmLocationLookup {
    client: Arc<dyn LlmClient>,
}

impl LlmLocationLookup {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(companies: &[String]) -> String {
        format!(
            r#"For the following companies, find their headquarters or primary plant location:
- Latitude and Longitude (decimal degrees)
- Official Country Name

Companies:
{}

Return ONLY a JSON object where keys are the company names exactly as provided, and values are objects with "latitude", "longitude", and "country" keys.
Example:
{{
    "SMS group GmbH": {{"latitude": 51.196, "longitude": 6.786, "country": "Germany"}},
    "ThyssenKrupp AG": {{"latitude": 51.455, "longitude": 7.011, "country": "Germany"}}
}}"#,
            companies.join(", ")
        )
    }
}

#[async_trait]
impl LocationLookup for LlmLocationLookup {
    async fn locate(&self, companies: &[String]) -> Result<HashMap<String, LocationInfo>> {
        if companies.is_empty() {
            return Ok(HashMap::new());
        }
        let raw = self
            .client
            .chat_json(LOCATION_SYSTEM_PROMPT, &Self::build_prompt(companies))
            .await?;
        serde_json::from_str(strip_json_fence(&raw))
            .with_context(|| format!("Unparseable location response: {}", raw))
    }
}

/// Profile lookup backed by an LLM
pub struct LlmProfileLookup {
    client: Arc<dyn LlmClient>,
}

impl LlmProfileLookup {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(companies: &[String]) -> String {
        format!(
            r#"For the following companies, find the current CEO name and the approximate total number of full-time employees (FTE).

Companies:
{}

Return ONLY a JSON object where keys are the company names exactly as provided, and values are objects with "ceo" and "fte" keys.
Example:
{{
    "Apple Inc": {{"ceo": "Tim Cook", "fte": 164000}},
    "Microsoft": {{"ceo": "Satya Nadella", "fte": 221000}}
}}

If you are not sure, provide your best estimate based on latest knowledge or use null."#,
            companies.join(", ")
        )
    }
}

#[async_trait]
impl ProfileLookup for LlmProfileLookup {
    async fn profiles(&self, companies: &[String]) -> Result<HashMap<String, ProfileInfo>> {
        if companies.is_empty() {
            return Ok(HashMap::new());
        }
        let raw = self
            .client
            .chat_json(PROFILE_SYSTEM_PROMPT, &Self::build_prompt(companies))
            .await?;
        serde_json::from_str(strip_json_fence(&raw))
            .with_context(|| format!("Unparseable profile response: {}", raw))
    }
}
