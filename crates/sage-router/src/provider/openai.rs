//! OpenAI-compatible chat completions adapter
//!
//! Also serves Qwen (`DashScope` compatible-mode) and volcano-engine
//! `DeepSeek` (Ark), which speak the same wire protocol behind different
//! base URLs.

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

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider adapter
pub struct OpenAiClient {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl OpenAiClient {
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

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ProviderClient for OpenAiClient {
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
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = prompt.system_instruction() {
            messages.push(ChatMessage {
                role: "system".to_owned(),
                content: instruction,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_owned(),
            content: prompt.question.clone(),
        });

        let request = ChatRequest {
            model: model.to_owned(),
            messages,
            max_tokens,
        };

        let mut builder = self
            .client
            .post(self.completions_url())
            .timeout(deadline)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(provider = %self.name, error = %e, "upstream request failed");
            super::transport_failure(deadline, &e)
        })?;

        if !response.status().is_success() {
            return Err(super::status_failure(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| super::decode_failure(deadline, &e))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CallFailure::EmptyOrMalformed("no choices in response".to_owned()))?;

        Ok(RawCompletion {
            content,
            model: body.model.unwrap_or_else(|| model.to_owned()),
        })
    }
}
