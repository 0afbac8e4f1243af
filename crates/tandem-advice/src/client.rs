//! HTTP client for the external advice-generation (LLM) provider.

use crate::error::AdviceError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for one generation request. The provider is slow on long
/// contexts but anything beyond this is a lost trigger, not a retry.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a `generateContent`-style LLM endpoint.
#[derive(Debug, Clone)]
pub struct AdviceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl AdviceClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Sends one prompt to the provider and returns the generated text.
    ///
    /// # Errors
    ///
    /// `AdviceError::Http` on transport failure, `AdviceError::Provider`
    /// on a non-success status, `AdviceError::EmptyResponse` when the
    /// provider answers with no usable text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AdviceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(GENERATE_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdviceError::Provider(format!(
                "status {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AdviceError::EmptyResponse);
        }
        Ok(text)
    }
}
