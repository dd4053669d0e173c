//! Text-completion providers.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::observability::TracedRequestExt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty completion")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        api_key: &Secret<String>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Azure OpenAI legacy completions endpoint.
pub struct AzureOpenAiProvider {
    client: Client,
    endpoint: String,
    deployment: String,
    api_version: String,
}

#[derive(Serialize)]
struct CompletionsRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    text: String,
}

impl AzureOpenAiProvider {
    pub fn new(endpoint: &str, deployment: &str, api_version: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.to_string(),
            api_version: api_version.to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/completions",
            self.endpoint, self.deployment
        )
    }
}

#[async_trait]
impl CompletionProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        api_key: &Secret<String>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        tracing::debug!(
            deployment = %self.deployment,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.api_url())
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", api_key.expose_secret())
            .json(&CompletionsRequest { prompt, max_tokens })
            .with_trace_context()
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "Completion API error {}: {}",
                status, error_text
            )));
        }

        let body: CompletionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(ProviderError::EmptyCompletion)
    }
}

/// Echoing provider used when no completion endpoint is configured.
#[derive(Default)]
pub struct MockCompletionProvider;

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(
        &self,
        _api_key: &Secret<String>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        Ok(format!("Mock completion ({} tokens) for: {}", max_tokens, prompt))
    }
}
