//! Anthropic Messages API adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use sage_config::ProviderConfig;

use super::ProviderClient;
use crate::error::CallFailure;
use crate::types::{Prompt, RawCompletion};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter
pub struct AnthropicClient {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl AnthropicClient {
    /// Create from provider configuration
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never
    /// happen).
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Self {
            name,
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
        }
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        prompt: &Prompt,
        model: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<RawCompletion, CallFailure> {
        let request = MessagesRequest {
            model: model.to_owned(),
            max_tokens,
            messages: vec![WireMessage {
                role: "user".to_owned(),
                content: prompt.question.clone(),
            }],
            system: prompt.system_instruction(),
        };

        let mut builder = self
            .client
            .post(self.messages_url())
            .timeout(deadline)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(provider = %self.name, error = %e, "upstream request failed");
            super::transport_failure(deadline, &e)
        })?;

        if !response.status().is_success() {
            return Err(super::status_failure(response).await);
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| super::decode_failure(deadline, &e))?;

        let content = body
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| CallFailure::EmptyOrMalformed("no text block in response".to_owned()))?;

        Ok(RawCompletion {
            content,
            model: body.model.unwrap_or_else(|| model.to_owned()),
        })
    }
}
